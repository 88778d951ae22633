//! Interactive PKCE authorization with a one-shot loopback listener.
//!
//! # Flow
//!
//! 1. Generate a fresh verifier/challenge pair
//! 2. Bind the callback listener on the fixed port
//! 3. Open the consent URL in the system browser (and print it)
//! 4. Wait for the provider to redirect the browser to `/callback`
//! 5. Exchange the code with the verifier, answer the browser, close the
//!    listener
//!
//! Only the first `/callback` request is honored. Other paths (favicon
//! probes) get a 404 and do not consume the listener. Connections are read
//! concurrently, so an idle preconnect socket cannot hold up the callback.
//! There is no timeout on the wait for the user.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::BoxFuture;
use crate::credentials::AppIdentity;
use crate::error::{AuthError, AuthErrorCode, AuthResult};
use crate::oauth::{CALLBACK_PATH, CALLBACK_PORT, PkceChallenge, TokenEndpoint, redirect_uri};
use crate::tokens::{CredentialRecord, TokenGrant, now_millis};

/// Upper bound on request header lines read from the browser.
const MAX_HEADER_LINES: usize = 100;

/// How long a connection may take to send its request headers.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization successful</h1>\
    <p>You can close this tab and return to the terminal.</p></body></html>";
const DENIED_PAGE: &str = "<html><body><h1>Authorization failed</h1>\
    <p>No authorization code was received. \
    Close this tab and start the authorization again.</p></body></html>";
const EXCHANGE_FAILED_PAGE: &str = "<html><body><h1>Authorization failed</h1>\
    <p>The authorization code could not be exchanged for tokens. \
    Close this tab and start the authorization again.</p></body></html>";
const NOT_FOUND_PAGE: &str = "<html><body><h1>Not found</h1></body></html>";

/// Anything that can run an interactive authorization and hand back a
/// complete credential record.
pub trait InteractiveAuthorizer: Send + Sync {
    /// Runs one authorization attempt for the given scopes.
    fn authorize<'a>(
        &'a self,
        scopes: &'a [String],
    ) -> BoxFuture<'a, AuthResult<CredentialRecord>>;
}

/// Query parameters of a request that hit the callback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    /// The authorization code, if the user consented.
    pub code: Option<String>,
    /// The provider error (e.g. `access_denied`), if any.
    pub error: Option<String>,
}

impl CallbackRequest {
    /// Parses an HTTP request line. Returns `None` unless it is a `GET` on
    /// the callback path.
    pub fn parse(request_line: &str) -> Option<Self> {
        let mut parts = request_line.split_whitespace();
        let method = parts.next()?;
        let target = parts.next()?;
        if method != "GET" {
            return None;
        }

        let url = Url::parse("http://localhost/").ok()?.join(target).ok()?;
        if url.path() != CALLBACK_PATH {
            return None;
        }

        let mut code = None;
        let mut error = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if !value.is_empty() => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        Some(Self { code, error })
    }
}

/// Drives the authorization-code-with-PKCE flow against the system browser.
pub struct PkceAuthenticator {
    identity: AppIdentity,
    endpoint: Arc<dyn TokenEndpoint>,
    bind_addr: SocketAddr,
    redirect_uri: String,
    open_browser: bool,
}

impl PkceAuthenticator {
    /// Creates an authenticator listening on `127.0.0.1:3000`.
    pub fn new(identity: AppIdentity, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            identity,
            endpoint,
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, CALLBACK_PORT)),
            redirect_uri: redirect_uri(),
            open_browser: true,
        }
    }

    /// Builder: whether to launch the system browser.
    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Runs the flow on the fixed callback port.
    ///
    /// Fails immediately if the port cannot be bound.
    pub async fn run(&self, scopes: &[String]) -> AuthResult<CredentialRecord> {
        let listener = TcpListener::bind(self.bind_addr).await.map_err(|e| {
            AuthError::listener(format!(
                "failed to bind callback listener on {}: {}",
                self.bind_addr, e
            ))
            .with_source(e)
        })?;
        debug!("callback listener bound on {}", self.bind_addr);

        self.run_on(listener, scopes).await
    }

    /// Runs the flow on an already bound listener. The listener is closed
    /// when this returns, whatever the outcome.
    pub async fn run_on(
        &self,
        listener: TcpListener,
        scopes: &[String],
    ) -> AuthResult<CredentialRecord> {
        let pkce = PkceChallenge::generate();
        let auth_url =
            pkce.authorization_url(&self.identity.client_id, &self.redirect_uri, scopes);

        info!("authorization required, waiting for browser consent");
        eprintln!("\nAuthorization required. If the browser does not open, visit:\n\n{auth_url}\n");
        if self.open_browser {
            launch_browser(auth_url);
        }

        let result = self.serve_callback(&listener, &pkce).await;
        drop(listener);
        debug!("callback listener closed");

        result.map(|grant| CredentialRecord::from_grant(grant, now_millis()))
    }

    /// Accepts connections until the first callback request is handled.
    ///
    /// Each connection's request is read in its own task. Pending reads are
    /// aborted when this returns.
    async fn serve_callback(
        &self,
        listener: &TcpListener,
        pkce: &PkceChallenge,
    ) -> AuthResult<TokenGrant> {
        let mut pending = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(|e| {
                        AuthError::listener(format!("callback listener failed: {}", e))
                            .with_source(e)
                    })?;
                    pending.spawn(read_connection(stream, peer));
                }
                Some(joined) = pending.join_next(), if !pending.is_empty() => {
                    let (mut stream, peer, request) = match joined {
                        Ok(read) => read,
                        Err(e) => {
                            debug!("connection reader failed: {}", e);
                            continue;
                        }
                    };

                    let request_line = match request {
                        Ok(line) => line,
                        Err(e) => {
                            debug!("dropping unreadable request from {}: {}", peer, e);
                            continue;
                        }
                    };

                    let Some(callback) = CallbackRequest::parse(&request_line) else {
                        debug!("ignoring non-callback request from {}", peer);
                        respond(&mut stream, "404 Not Found", NOT_FOUND_PAGE).await;
                        continue;
                    };

                    return self.complete(&mut stream, callback, pkce).await;
                }
            }
        }
    }

    /// Handles the one callback request and answers the browser.
    async fn complete(
        &self,
        stream: &mut TcpStream,
        callback: CallbackRequest,
        pkce: &PkceChallenge,
    ) -> AuthResult<TokenGrant> {
        let code = match (callback.code, callback.error) {
            (Some(code), None) => code,
            (_, error) => {
                respond(stream, "400 Bad Request", DENIED_PAGE).await;
                let reason = error.unwrap_or_else(|| "no authorization code received".to_string());
                return Err(AuthError::authorization_denied(format!(
                    "authorization denied: {reason}"
                )));
            }
        };

        info!("received authorization code, exchanging for tokens");
        match self.endpoint.exchange_code(&code, &pkce.verifier).await {
            Ok(grant) => {
                respond(stream, "200 OK", SUCCESS_PAGE).await;
                Ok(grant)
            }
            Err(e) => {
                respond(stream, "500 Internal Server Error", EXCHANGE_FAILED_PAGE).await;
                if e.code() == AuthErrorCode::TokenExchangeFailed {
                    Err(e)
                } else {
                    Err(AuthError::token_exchange_failed(format!("token exchange failed: {e}"))
                        .with_source(e))
                }
            }
        }
    }
}

impl InteractiveAuthorizer for PkceAuthenticator {
    fn authorize<'a>(
        &'a self,
        scopes: &'a [String],
    ) -> BoxFuture<'a, AuthResult<CredentialRecord>> {
        Box::pin(self.run(scopes))
    }
}

/// Opens the URL in the default browser without blocking the listener.
fn launch_browser(url: String) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = open::that(&url) {
            warn!("failed to open browser: {}", e);
            eprintln!("Could not open a browser automatically; open the URL above manually.");
        }
    });
}

/// Reads one connection's request, giving up after [`REQUEST_READ_TIMEOUT`].
async fn read_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
) -> (TcpStream, SocketAddr, io::Result<String>) {
    let read = tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request(&mut stream));
    let request = match read.await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "no request received")),
    };
    (stream, peer, request)
}

/// Reads the request line and drains the headers.
async fn read_request(stream: &mut TcpStream) -> io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut header = String::new();
    for _ in 0..MAX_HEADER_LINES {
        header.clear();
        let read = reader.read_line(&mut header).await?;
        if read == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    Ok(request_line)
}

/// Writes a small HTML response. Failures only affect the browser tab.
async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
        Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("failed to answer browser: {}", e);
        return;
    }
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
}
