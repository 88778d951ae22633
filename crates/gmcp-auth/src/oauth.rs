//! OAuth 2.0 building blocks: PKCE pair, consent URL, token endpoint.
//!
//! The interactive half of the flow (local listener, browser) lives in
//! [`crate::callback`]; the session bookkeeping in [`crate::lifecycle`].

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::BoxFuture;
use crate::credentials::AppIdentity;
use crate::error::{AuthError, AuthResult};
use crate::tokens::TokenGrant;

/// Google OAuth endpoints.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Fixed loopback port; must match the redirect URI registered for the client.
pub const CALLBACK_PORT: u16 = 3000;

/// Path the provider redirects the browser to.
pub const CALLBACK_PATH: &str = "/callback";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Timeout for token endpoint requests.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The redirect URI registered for the loopback listener.
pub fn redirect_uri() -> String {
    format!("http://localhost:{CALLBACK_PORT}{CALLBACK_PATH}")
}

/// A PKCE verifier and its S256 challenge (RFC 7636).
///
/// Generated fresh for every authorization attempt and never reused.
#[derive(Debug)]
pub struct PkceChallenge {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// base64url(SHA-256(verifier)).
    pub challenge: String,
}

impl PkceChallenge {
    /// Creates a new pair from a random 32-byte verifier.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let bytes: [u8; CODE_VERIFIER_LENGTH] = rng.random();
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Computes the S256 challenge for a verifier.
    pub fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the provider consent URL for this challenge.
    ///
    /// Requests offline access so the grant includes a refresh token.
    pub fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?access_type=offline&scope={}&code_challenge={}&code_challenge_method=S256&\
            response_type=code&client_id={}&redirect_uri={}",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
        )
    }
}

/// The provider's token endpoint, as seen by the credential lifecycle.
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges an authorization code plus PKCE verifier for tokens.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, AuthResult<TokenGrant>>;

    /// Obtains a new access token from a stored refresh token.
    ///
    /// A refusal by the provider is a `TokenRejected` error carrying the
    /// HTTP status.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, AuthResult<TokenGrant>>;
}

/// Token endpoint client for Google's OAuth server.
#[derive(Debug)]
pub struct GoogleTokenEndpoint {
    identity: AppIdentity,
    redirect_uri: String,
    token_url: String,
    http_client: reqwest::Client,
}

impl GoogleTokenEndpoint {
    /// Creates a client for the given application identity.
    pub fn new(identity: AppIdentity, redirect_uri: impl Into<String>) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AuthError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;

        Ok(Self {
            identity,
            redirect_uri: redirect_uri.into(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            http_client,
        })
    }

    /// Overrides the token URL.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Returns the redirect URI sent with code exchanges.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// POSTs a form to the token endpoint, returning status and body.
    async fn post_form(
        &self,
        params: &[(&str, &str)],
    ) -> AuthResult<(reqwest::StatusCode, String)> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                AuthError::network(format!("token request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AuthError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        Ok((status, body))
    }

    async fn exchange(&self, code: &str, verifier: &str) -> AuthResult<TokenGrant> {
        let params = [
            ("client_id", self.identity.client_id.as_str()),
            ("client_secret", self.identity.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let (status, body) = self.post_form(&params).await?;
        if !status.is_success() {
            return Err(AuthError::token_exchange_failed(format!(
                "token exchange failed: {}",
                describe_error_body(&body)
            ))
            .with_status(status.as_u16()));
        }

        let grant = parse_grant(&body)?;
        info!("successfully obtained tokens");
        Ok(grant)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> AuthResult<TokenGrant> {
        let params = [
            ("client_id", self.identity.client_id.as_str()),
            ("client_secret", self.identity.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let (status, body) = self.post_form(&params).await?;
        if !status.is_success() {
            return Err(AuthError::token_rejected(format!(
                "token refresh failed: {}",
                describe_error_body(&body)
            ))
            .with_status(status.as_u16()));
        }

        let grant = parse_grant(&body)?;
        debug!("refreshed access token");
        Ok(grant)
    }
}

impl TokenEndpoint for GoogleTokenEndpoint {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, AuthResult<TokenGrant>> {
        Box::pin(self.exchange(code, verifier))
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, AuthResult<TokenGrant>> {
        Box::pin(self.refresh_grant(refresh_token))
    }
}

/// OAuth error body (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn parse_grant(body: &str) -> AuthResult<TokenGrant> {
    serde_json::from_str(body)
        .map_err(|e| AuthError::invalid_response(format!("invalid token response: {}", e)))
}

/// Renders an error response without echoing arbitrary payloads.
fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(OAuthErrorBody {
            error,
            error_description: Some(description),
        }) => format!("{error} ({description})"),
        Ok(OAuthErrorBody { error, .. }) => error,
        Err(_) => "unexpected response from token endpoint".to_string(),
    }
}
