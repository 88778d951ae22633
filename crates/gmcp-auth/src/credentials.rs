//! Application identity loaded from the OAuth client credentials file.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// OAuth client identity of this application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Redirect URIs registered for the client. Informational only.
    pub redirect_uris: Vec<String>,
}

/// Shape of the credentials JSON downloaded from the Google Cloud Console.
///
/// Accepts the `installed` section, the `web` section, or a flat document
/// with `client_id`/`client_secret` at the root.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl AppIdentity {
    /// Creates an identity from its parts.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uris: Vec::new(),
        }
    }

    /// Loads the identity from a credentials file.
    ///
    /// A missing or malformed file is a [`CredentialsUnreadable`] error,
    /// which callers treat as fatal.
    ///
    /// [`CredentialsUnreadable`]: crate::AuthErrorCode::CredentialsUnreadable
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::credentials_unreadable(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        let identity = Self::from_json(&content)?;
        debug!("loaded OAuth client identity from {:?}", path);
        Ok(identity)
    }

    /// Parses the identity from credentials JSON.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            AuthError::credentials_unreadable(format!("failed to parse credentials JSON: {}", e))
        })?;

        if let Some(section) = file.installed.or(file.web) {
            return Ok(Self {
                client_id: section.client_id,
                client_secret: section.client_secret,
                redirect_uris: section.redirect_uris,
            });
        }

        match (file.client_id, file.client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Self::new(client_id, client_secret)),
            _ => Err(AuthError::credentials_unreadable(
                "credentials file must contain an 'installed' or 'web' section, \
                 or 'client_id'/'client_secret' at the root",
            )),
        }
    }
}
