//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gmcp_core::settings::{CREDENTIALS_VAR, POLICY_VAR, TOKENS_VAR};
use gmcp_core::{Service, Settings, SettingsError, resolve_path};
use gmcp_policy::OperationKind;

/// gmcp - Google credentials and access policy for MCP brokers
#[derive(Debug, Parser)]
#[command(name = "gmcp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Resource domain to act for (calendar, docs, sheets, gmail)
    #[arg(long, short, env = "GMCP_SERVICE", default_value = "calendar")]
    pub service: Service,

    /// Path to the OAuth client credentials JSON file
    #[arg(long, env = CREDENTIALS_VAR)]
    pub credentials: Option<String>,

    /// Path to the token file (defaults to ~/.config/<service>-mcp/tokens.json)
    #[arg(long, env = TOKENS_VAR)]
    pub tokens: Option<String>,

    /// Path to the policy file
    #[arg(long, env = POLICY_VAR)]
    pub policy: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Assembles runtime settings from the parsed flags. Flags already
    /// carry their environment fallbacks, so nothing else is consulted.
    pub fn settings(&self) -> Result<Settings, SettingsError> {
        Settings::from_lookup(self.service, |name| match name {
            CREDENTIALS_VAR => self.credentials.clone(),
            TOKENS_VAR => self.tokens.clone(),
            POLICY_VAR => self.policy.clone(),
            _ => None,
        })
    }

    /// The token file, without requiring the credentials file.
    pub fn tokens_path(&self) -> PathBuf {
        non_empty(&self.tokens)
            .map(resolve_path)
            .unwrap_or_else(|| self.service.default_tokens_path())
    }

    /// The policy file, if configured.
    pub fn policy_path(&self) -> Option<PathBuf> {
        non_empty(&self.policy).map(resolve_path)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorization commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Policy commands
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

/// Authorization actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Reuse, refresh or obtain a session for the selected service
    Login {
        /// Print the consent URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Show the stored session without contacting Google
    Status,
}

/// Policy actions.
#[derive(Debug, Subcommand)]
pub enum PolicyAction {
    /// Print the effective policy for every domain as JSON
    Show,

    /// Evaluate one decision offline
    Check {
        #[command(subcommand)]
        target: CheckTarget,
    },
}

/// What to check.
#[derive(Debug, Clone, Subcommand)]
pub enum CheckTarget {
    /// A calendar operation
    Calendar {
        /// Operation kind (read, create, update, delete)
        #[arg(long, short)]
        operation: OperationKind,

        /// Address of the acting principal
        #[arg(long = "self")]
        self_id: String,

        /// Party the operation involves (can be repeated)
        #[arg(long = "party", action = clap::ArgAction::Append)]
        parties: Vec<String>,

        /// Party already on the event, for updates (can be repeated)
        #[arg(long = "existing", action = clap::ArgAction::Append)]
        existing: Vec<String>,
    },

    /// A document or folder
    Docs {
        /// Document id
        #[arg(long, conflicts_with = "folder", required_unless_present = "folder")]
        document: Option<String>,

        /// Folder id
        #[arg(long)]
        folder: Option<String>,

        /// Direct parent folder of the document (can be repeated)
        #[arg(long = "parent", action = clap::ArgAction::Append)]
        parents: Vec<String>,
    },

    /// A spreadsheet
    Sheets {
        /// Spreadsheet id
        #[arg(long)]
        spreadsheet: String,

        /// The operation modifies the spreadsheet
        #[arg(long)]
        write: bool,
    },
}
