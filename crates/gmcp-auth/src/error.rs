//! Error types for the credential lifecycle.

use std::fmt;
use thiserror::Error;

/// The category of an authentication error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    /// The application credentials file is missing or malformed.
    CredentialsUnreadable,
    /// The browser callback carried no authorization code.
    AuthorizationDenied,
    /// Exchanging the authorization code for tokens failed.
    TokenExchangeFailed,
    /// The provider refused a refresh (expired or revoked session).
    TokenRejected,
    /// Network error talking to the provider.
    NetworkError,
    /// The provider answered with something we could not parse.
    InvalidResponse,
    /// Reading or writing the token file failed.
    StorageError,
    /// The local callback listener could not run (port taken, accept failed).
    ListenerError,
    /// Unexpected internal state.
    InternalError,
}

impl AuthErrorCode {
    /// Returns a machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialsUnreadable => "credentials_unreadable",
            Self::AuthorizationDenied => "authorization_denied",
            Self::TokenExchangeFailed => "token_exchange_failed",
            Self::TokenRejected => "token_rejected",
            Self::NetworkError => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::StorageError => "storage_error",
            Self::ListenerError => "listener_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while obtaining, refreshing or persisting credentials.
#[derive(Debug, Error)]
pub struct AuthError {
    code: AuthErrorCode,
    message: String,
    /// HTTP status reported by the provider, when there was one.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    /// Creates a new error with the given code and message.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates a credentials-unreadable error.
    pub fn credentials_unreadable(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::CredentialsUnreadable, message)
    }

    /// Creates an authorization-denied error.
    pub fn authorization_denied(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::AuthorizationDenied, message)
    }

    /// Creates a token-exchange error.
    pub fn token_exchange_failed(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::TokenExchangeFailed, message)
    }

    /// Creates a token-rejected error.
    pub fn token_rejected(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::TokenRejected, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::NetworkError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::InvalidResponse, message)
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::StorageError, message)
    }

    /// Creates a listener error.
    pub fn listener(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::ListenerError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::InternalError, message)
    }

    /// Attaches the provider's HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> AuthErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider HTTP status, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// True when the stored session can no longer be used and the user has
    /// to authorize again.
    ///
    /// That is a refresh refused with 400 or 401, or a refresh that could
    /// not be attempted because no refresh token is stored.
    pub fn is_session_invalid(&self) -> bool {
        self.code == AuthErrorCode::TokenRejected
            && matches!(self.status, None | Some(400) | Some(401))
    }

    /// Returns a remediation hint for the user, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self.code {
            AuthErrorCode::CredentialsUnreadable => Some(
                "check that GOOGLE_OAUTH_CREDENTIALS points at the OAuth client JSON \
                 downloaded from the Google Cloud Console",
            ),
            AuthErrorCode::AuthorizationDenied | AuthErrorCode::TokenExchangeFailed => {
                Some("run the authorization again and complete the consent screen in the browser")
            }
            AuthErrorCode::ListenerError => {
                Some("make sure nothing else is listening on localhost:3000, then retry")
            }
            _ => None,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {status})")?;
        }
        Ok(())
    }
}

/// A specialized Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_invalid_only_for_rejected_400_401() {
        assert!(AuthError::token_rejected("expired").with_status(400).is_session_invalid());
        assert!(AuthError::token_rejected("revoked").with_status(401).is_session_invalid());
        assert!(AuthError::token_rejected("no refresh token").is_session_invalid());
        assert!(!AuthError::token_rejected("boom").with_status(500).is_session_invalid());
        assert!(!AuthError::token_rejected("forbidden").with_status(403).is_session_invalid());
        assert!(!AuthError::network("dns").is_session_invalid());
        assert!(!AuthError::token_exchange_failed("bad").with_status(400).is_session_invalid());
    }

    #[test]
    fn display_includes_code_and_status() {
        let err = AuthError::token_rejected("invalid_grant").with_status(400);
        assert_eq!(err.to_string(), "token_rejected: invalid_grant (HTTP 400)");

        let err = AuthError::storage("disk full");
        assert_eq!(err.to_string(), "storage_error: disk full");
    }

    #[test]
    fn hints_point_at_remediation() {
        let hint = AuthError::credentials_unreadable("missing").hint().unwrap();
        assert!(hint.contains("GOOGLE_OAUTH_CREDENTIALS"));
        assert!(AuthError::network("x").hint().is_none());
    }

    #[test]
    fn source_is_preserved() {
        use std::error::Error;
        let io_err = std::io::Error::other("permission denied");
        let err = AuthError::storage("write failed").with_source(io_err);
        assert!(err.source().is_some());
        assert_eq!(err.code(), AuthErrorCode::StorageError);
        assert_eq!(err.message(), "write failed");
    }
}
