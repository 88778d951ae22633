//! Credential lifecycle: reuse, silently refresh, or reauthorize.
//!
//! [`CredentialManager::obtain_client`] is the entry point. It loads the
//! application identity (fatal if unreadable), tries the persisted session,
//! and falls back to the interactive PKCE flow when there is no session or
//! the provider rejects it. The returned [`AuthenticatedClient`] refreshes
//! its access token on demand and writes every merged record back to disk.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::BoxFuture;
use crate::callback::{InteractiveAuthorizer, PkceAuthenticator};
use crate::credentials::AppIdentity;
use crate::error::{AuthError, AuthResult};
use crate::oauth::{GoogleTokenEndpoint, TokenEndpoint, redirect_uri};
use crate::tokens::{CredentialRecord, TokenPersistence, TokenStore, now_millis};

/// An authorized session for the single principal of this process.
///
/// Access tokens are refreshed lazily. Refreshes are serialized, and each
/// one merges the provider response onto the full record and persists the
/// snapshot before the triggering call returns. A failed write is logged and
/// the in-memory session carries on.
pub struct AuthenticatedClient {
    endpoint: Arc<dyn TokenEndpoint>,
    persistence: Arc<dyn TokenPersistence>,
    record: Mutex<CredentialRecord>,
}

impl AuthenticatedClient {
    /// Wraps a record with the endpoint used to refresh it and the sink
    /// refreshed records are written to.
    pub fn new(
        record: CredentialRecord,
        endpoint: Arc<dyn TokenEndpoint>,
        persistence: Arc<dyn TokenPersistence>,
    ) -> Self {
        Self {
            endpoint,
            persistence,
            record: Mutex::new(record),
        }
    }

    /// Returns a usable access token, refreshing it first if it is stale.
    pub async fn access_token(&self) -> AuthResult<String> {
        let mut record = self.record.lock().await;
        if record.is_stale(now_millis()) {
            self.refresh_locked(&mut record).await?;
        }
        Ok(record.access_token.clone())
    }

    /// Refreshes the access token regardless of its expiry.
    pub async fn force_refresh(&self) -> AuthResult<()> {
        let mut record = self.record.lock().await;
        self.refresh_locked(&mut record).await
    }

    /// Attaches a bearer token to an outgoing API request.
    pub async fn authorize_request(
        &self,
        request: reqwest::RequestBuilder,
    ) -> AuthResult<reqwest::RequestBuilder> {
        let token = self.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    /// A copy of the current record.
    pub async fn snapshot(&self) -> CredentialRecord {
        self.record.lock().await.clone()
    }

    async fn refresh_locked(&self, record: &mut CredentialRecord) -> AuthResult<()> {
        let refresh_token = record
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::token_rejected("no refresh token stored"))?;

        debug!("refreshing access token");
        let grant = self.endpoint.refresh(&refresh_token).await?;
        record.merge(grant, now_millis());
        info!("access token refreshed");

        if let Err(e) = self.persistence.persist(record) {
            warn!("failed to persist refreshed tokens, continuing with in-memory session: {}", e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient").finish_non_exhaustive()
    }
}

/// Builds authenticated clients from the credentials and token files.
#[derive(Debug, Clone)]
pub struct CredentialManager {
    credentials_path: PathBuf,
    store: TokenStore,
    scopes: Vec<String>,
    open_browser: bool,
}

impl CredentialManager {
    /// Creates a manager for one principal.
    pub fn new(
        credentials_path: impl Into<PathBuf>,
        tokens_path: impl Into<PathBuf>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            store: TokenStore::new(tokens_path),
            scopes,
            open_browser: true,
        }
    }

    /// Builder: whether the interactive flow opens the system browser.
    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// The token store backing this manager.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Obtains an authenticated client against Google's OAuth server,
    /// running the browser flow if needed.
    ///
    /// Callers memoize the result (see [`LazyClient`]).
    pub async fn obtain_client(&self) -> AuthResult<AuthenticatedClient> {
        let identity = AppIdentity::from_file(&self.credentials_path)?;
        let endpoint: Arc<dyn TokenEndpoint> =
            Arc::new(GoogleTokenEndpoint::new(identity.clone(), redirect_uri())?);
        let authorizer =
            PkceAuthenticator::new(identity, Arc::clone(&endpoint)).with_browser(self.open_browser);

        self.establish(endpoint, &authorizer).await
    }

    /// Establishes a session with explicit collaborators.
    ///
    /// Provider status 400/401 on the startup refresh (or a stored record
    /// without refresh token) falls through to `authorizer`; any other
    /// refresh failure is returned.
    pub async fn establish(
        &self,
        endpoint: Arc<dyn TokenEndpoint>,
        authorizer: &dyn InteractiveAuthorizer,
    ) -> AuthResult<AuthenticatedClient> {
        let persistence: Arc<dyn TokenPersistence> = Arc::new(self.store.clone());

        if let Some(record) = self.store.load() {
            let client =
                AuthenticatedClient::new(record, Arc::clone(&endpoint), Arc::clone(&persistence));
            match client.access_token().await {
                Ok(_) => {
                    info!("reusing stored session");
                    return Ok(client);
                }
                Err(e) if e.is_session_invalid() => {
                    warn!("stored session is no longer valid ({}), reauthorizing", e);
                }
                Err(e) => return Err(e),
            }
        } else {
            info!("no stored session, starting authorization");
        }

        let record = authorizer.authorize(&self.scopes).await?;
        self.store.save(&record)?;
        info!("authorization complete, tokens saved to {:?}", self.store.path());

        Ok(AuthenticatedClient::new(record, endpoint, persistence))
    }
}

type ClientInit = dyn Fn() -> BoxFuture<'static, AuthResult<AuthenticatedClient>> + Send + Sync;

/// Construct-once handle to the process's authenticated client.
///
/// The first caller runs the initializer; concurrent first callers wait for
/// it, and everyone afterwards shares the same client. A failed
/// initialization is not cached, so the next call tries again.
pub struct LazyClient {
    init: Box<ClientInit>,
    cell: OnceCell<Arc<AuthenticatedClient>>,
}

impl LazyClient {
    /// Lazily obtains the client through `manager`.
    pub fn new(manager: CredentialManager) -> Self {
        let manager = Arc::new(manager);
        Self::with_init(move || {
            let manager = Arc::clone(&manager);
            Box::pin(async move { manager.obtain_client().await })
        })
    }

    /// Lazily obtains the client through an arbitrary initializer.
    pub fn with_init<F>(init: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, AuthResult<AuthenticatedClient>> + Send + Sync + 'static,
    {
        Self {
            init: Box::new(init),
            cell: OnceCell::new(),
        }
    }

    /// Returns the shared client, initializing it on first use.
    pub async fn get(&self) -> AuthResult<Arc<AuthenticatedClient>> {
        self.cell
            .get_or_try_init(|| async { (self.init)().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    /// Returns true once the client has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
