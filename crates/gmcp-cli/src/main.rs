//! gmcp CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use gmcp_cli::cli::{AuthAction, Cli, Command, PolicyAction};
use gmcp_cli::commands;
use gmcp_cli::error::CliResult;
use gmcp_core::{TracingConfig, init_tracing};
use gmcp_policy::PolicySet;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    init_tracing(tracing)?;

    match &cli.command {
        Command::Auth { action } => match action {
            AuthAction::Login { no_browser } => {
                commands::auth::login(&cli.settings()?, !no_browser).await
            }
            AuthAction::Status => commands::auth::status(&cli.tokens_path()),
        },
        Command::Policy { action } => {
            let policies = PolicySet::load(cli.policy_path().as_deref());
            match action {
                PolicyAction::Show => commands::policy::show(&policies),
                PolicyAction::Check { target } => commands::policy::check(&policies, target),
            }
        }
    }
}
