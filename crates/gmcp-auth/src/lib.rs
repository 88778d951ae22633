//! Google OAuth credential lifecycle for a single local principal.
//!
//! - [`AppIdentity`] - The installed-app client id/secret read from disk
//! - [`PkceAuthenticator`] - Browser consent flow with a one-shot loopback listener
//! - [`TokenStore`] - Atomic, owner-only persistence of the [`CredentialRecord`]
//! - [`CredentialManager`] - Reuse, refresh or reauthorize at startup
//! - [`LazyClient`] - Construct-once access to the [`AuthenticatedClient`]
//!
//! # Example
//!
//! ```ignore
//! use gmcp_auth::{CredentialManager, LazyClient};
//!
//! let manager = CredentialManager::new(credentials, tokens, scopes);
//! let client = LazyClient::new(manager);
//! let request = client.get().await?.authorize_request(http.get(url)).await?;
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod callback;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod oauth;
pub mod tokens;

pub use callback::{CallbackRequest, InteractiveAuthorizer, PkceAuthenticator};
pub use credentials::AppIdentity;
pub use error::{AuthError, AuthErrorCode, AuthResult};
pub use lifecycle::{AuthenticatedClient, CredentialManager, LazyClient};
pub use oauth::{GoogleTokenEndpoint, PkceChallenge, TokenEndpoint, redirect_uri};
pub use tokens::{CredentialRecord, TokenGrant, TokenPersistence, TokenStore};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
