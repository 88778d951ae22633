//! The `gmcp` command-line interface.
//!
//! Runs the credential lifecycle outside a broker process (`auth login`,
//! `auth status`) and evaluates access policy offline (`policy show`,
//! `policy check`).

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::Cli;
pub use error::{CliError, CliResult};
