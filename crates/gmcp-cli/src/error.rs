//! CLI error types.

use thiserror::Error;

use gmcp_auth::AuthError;
use gmcp_core::{SettingsError, TracingError};

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Settings(#[from] SettingsError),
    /// Authorization or token handling failed.
    #[error("authorization error: {0}")]
    Auth(#[from] AuthError),
    /// Logging could not be set up.
    #[error(transparent)]
    Tracing(#[from] TracingError),
    /// Output could not be rendered.
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

impl CliError {
    /// What the user should fix, if anything specific.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Settings(_) => Some(
                "pass --credentials/--tokens or set GOOGLE_OAUTH_CREDENTIALS/GOOGLE_OAUTH_TOKENS",
            ),
            Self::Auth(e) => e.hint(),
            _ => None,
        }
    }
}
