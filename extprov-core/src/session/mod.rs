//! Authenticated sessions against a platform environment.
//!
//! This module provides:
//! - [`HttpVerbs`] - The verb surface every session exposes
//! - [`OAuthSession`] - Bearer-token session from a client-credentials grant
//! - [`CookieSession`] - Cookie jar + CSRF header session from a form login
//! - [`connect`] - Pick and log in the variant matching the credentials
//!
//! Any non-2xx response surfaces as [`SessionError::Http`]. Nothing is
//! retried and tokens are never refreshed: an expired session simply starts
//! failing.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), extprov_core::SessionError> {
//! use extprov_core::{BaseUri, Credentials, session::{self, SessionOptions}};
//!
//! let base = BaseUri::new("https://acme.app.luminance.com");
//! let creds = Credentials::client_credentials("client-id", "client-secret");
//! let session = session::connect(base, creds, &SessionOptions::default()).await?;
//!
//! let me = session.get("/api/users/me").await?;
//! println!("{}", me.body);
//! # Ok(())
//! # }
//! ```

mod cookie;
mod oauth;

pub use cookie::{CookieSession, extract_csrf_token};
pub use oauth::{OAuthSession, exchange_client_credentials};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::credentials::Credentials;
use crate::environment::BaseUri;
use crate::token::preview;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error type for session construction and requests.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Login was rejected or produced no usable token.
    #[error("authentication failed at {url}: {message}")]
    AuthenticationFailed { url: String, message: String },

    /// The CSRF handshake did not yield a token.
    #[error("CSRF token missing from {stage}")]
    CsrfTokenMissing { stage: &'static str },

    /// The server answered with a non-2xx status.
    #[error("{method} {url} failed with status {status}: {body}")]
    Http {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// A 2xx response whose body was not what the caller expected.
    #[error("unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// Credentials could not be decoded.
    #[error("invalid credentials: {message}")]
    InvalidCredentials { message: String },
}

impl SessionError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Transport settings shared by both session variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Verify TLS certificates. Only ever disabled explicitly.
    pub verify_tls: bool,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SessionOptions {
    /// Set TLS verification.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

impl ApiResponse {
    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SessionError> {
        serde_json::from_str(&self.body).map_err(|e| SessionError::InvalidResponse {
            url: self.url.clone(),
            message: format!("invalid JSON body: {}", e),
        })
    }
}

/// The verb surface shared by [`OAuthSession`] and [`CookieSession`].
///
/// Callers that only issue API requests should depend on this trait, not on
/// a concrete session type.
#[async_trait]
pub trait HttpVerbs: Send + Sync {
    /// Environment this session is bound to.
    fn base_uri(&self) -> &BaseUri;

    /// Issue a request relative to [`base_uri`](HttpVerbs::base_uri).
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, SessionError>;

    /// `GET` a path.
    async fn get(&self, path: &str) -> Result<ApiResponse, SessionError> {
        self.request(Method::GET, path, None).await
    }

    /// `PUT` a path with an optional JSON body.
    async fn put(&self, path: &str, body: Option<&serde_json::Value>) -> Result<ApiResponse, SessionError> {
        self.request(Method::PUT, path, body).await
    }

    /// `POST` a path with an optional JSON body.
    async fn post(&self, path: &str, body: Option<&serde_json::Value>) -> Result<ApiResponse, SessionError> {
        self.request(Method::POST, path, body).await
    }

    /// `PATCH` a path with an optional JSON body.
    async fn patch(&self, path: &str, body: Option<&serde_json::Value>) -> Result<ApiResponse, SessionError> {
        self.request(Method::PATCH, path, body).await
    }
}

/// Log in with whichever session variant the credentials call for.
pub async fn connect(
    base: BaseUri,
    credentials: Credentials,
    options: &SessionOptions,
) -> Result<Box<dyn HttpVerbs>, SessionError> {
    debug!("Connecting to {} as {}", base, credentials.principal());
    match credentials {
        Credentials::ClientCredentials {
            client_id,
            client_secret,
        } => {
            let session = OAuthSession::login(base, &client_id, &client_secret, options).await?;
            Ok(Box::new(session))
        }
        Credentials::Password { username, password } => {
            let session = CookieSession::login(base, &username, &password, options).await?;
            Ok(Box::new(session))
        }
    }
}

/// Build the underlying HTTP client.
pub(crate) fn build_client(
    options: &SessionOptions,
    cookie_store: bool,
    default_headers: HeaderMap,
) -> Result<reqwest::Client, SessionError> {
    reqwest::Client::builder()
        .timeout(options.timeout)
        .danger_accept_invalid_certs(!options.verify_tls)
        .cookie_store(cookie_store)
        .default_headers(default_headers)
        .build()
        .map_err(|e| SessionError::Transport {
            url: String::new(),
            message: format!("failed to build HTTP client: {}", e),
        })
}

/// Send one API request and turn non-2xx statuses into [`SessionError::Http`].
pub(crate) async fn send(
    client: &reqwest::Client,
    base: &BaseUri,
    method: Method,
    path: &str,
    body: Option<&serde_json::Value>,
    extra_headers: HeaderMap,
) -> Result<ApiResponse, SessionError> {
    let url = base.join(path);
    debug!("{} {}", method, url);

    let mut request = client.request(method.clone(), &url).headers(extra_headers);
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await.map_err(|e| SessionError::Transport {
        url: url.clone(),
        message: e.to_string(),
    })?;
    read_response(method, url, response).await
}

/// Read the body and check the status.
pub(crate) async fn read_response(
    method: Method,
    url: String,
    response: reqwest::Response,
) -> Result<ApiResponse, SessionError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| SessionError::Transport {
        url: url.clone(),
        message: format!("failed to read response body: {}", e),
    })?;
    debug!("{} {} -> {}", method, url, status.as_u16());

    if !status.is_success() {
        return Err(SessionError::Http {
            method: method.to_string(),
            url,
            status: status.as_u16(),
            body: preview(&body),
        });
    }

    Ok(ApiResponse {
        status: status.as_u16(),
        url,
        body,
    })
}
