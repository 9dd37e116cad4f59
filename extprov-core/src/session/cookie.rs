//! Cookie + CSRF session from a form login.
//!
//! The handshake is two requests:
//!
//! 1. `GET /login`: the HTML embeds a first CSRF token.
//! 2. `POST /auth/login`: form credentials plus `X-CSRF-Token: <first>`;
//!    the JSON reply carries the CSRF token used from then on.
//!
//! Cookies set along the way live in the client's cookie store and ride on
//! every later request.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info};

use super::{ApiResponse, HttpVerbs, SessionError, SessionOptions, build_client, read_response, send};
use crate::environment::BaseUri;
use crate::secret::Secret;
use crate::token::preview;

/// Login page path.
pub const LOGIN_PAGE_PATH: &str = "/login";

/// Form login endpoint path.
pub const LOGIN_PATH: &str = "/auth/login";

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

const CSRF_PATTERN: &str = r"csrf.*?'([^']+)'";

static CSRF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CSRF_PATTERN).expect("CSRF pattern is a valid regex"));

/// Session that authenticates with cookies and a CSRF header.
pub struct CookieSession {
    base: BaseUri,
    client: reqwest::Client,
    csrf_token: Secret,
}

impl CookieSession {
    /// Run the CSRF handshake and build the session.
    pub async fn login(
        base: BaseUri,
        username: &str,
        password: &Secret,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let client = build_client(options, true, HeaderMap::new())?;

        let page = send(&client, &base, Method::GET, LOGIN_PAGE_PATH, None, HeaderMap::new()).await?;
        let first_token = extract_csrf_token(&page.body).ok_or(SessionError::CsrfTokenMissing {
            stage: "login page",
        })?;
        debug!("Extracted login page CSRF token");

        let login_url = base.join(LOGIN_PATH);
        info!("Logging in as {} at {}", username, login_url);
        let response = client
            .post(&login_url)
            .headers(csrf_headers(&first_token)?)
            .form(&[("username", username), ("password", password.expose())])
            .send()
            .await
            .map_err(|e| SessionError::Transport {
                url: login_url.clone(),
                message: e.to_string(),
            })?;

        let response = match read_response(Method::POST, login_url.clone(), response).await {
            Ok(response) => response,
            Err(SessionError::Http { status, body, .. }) => {
                return Err(SessionError::AuthenticationFailed {
                    url: login_url,
                    message: format!("login rejected with status {}: {}", status, body),
                });
            }
            Err(e) => return Err(e),
        };

        let login_data: serde_json::Value =
            serde_json::from_str(&response.body).map_err(|_| SessionError::AuthenticationFailed {
                url: login_url,
                message: format!("login response is not JSON: {}", preview(&response.body)),
            })?;
        let csrf_token = login_data
            .get("csrf")
            .and_then(|v| v.as_str())
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::CsrfTokenMissing {
                stage: "login response",
            })?;

        info!("Session login successful");
        Ok(Self {
            base,
            client,
            csrf_token: Secret::new(csrf_token),
        })
    }

    /// The CSRF token sent with every request.
    pub fn csrf_token(&self) -> &Secret {
        &self.csrf_token
    }
}

impl std::fmt::Debug for CookieSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSession")
            .field("base", &self.base)
            .field("csrf_token", &self.csrf_token)
            .finish()
    }
}

#[async_trait]
impl HttpVerbs for CookieSession {
    fn base_uri(&self) -> &BaseUri {
        &self.base
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, SessionError> {
        let headers = csrf_headers(self.csrf_token.expose())?;
        send(&self.client, &self.base, method, path, body, headers).await
    }
}

/// Pull the first single-quoted string following `csrf` out of a page.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    CSRF_REGEX
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn csrf_headers(token: &str) -> Result<HeaderMap, SessionError> {
    let mut value = HeaderValue::from_str(token).map_err(|_| SessionError::CsrfTokenMissing {
        stage: "token with invalid header characters",
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(CSRF_HEADER), value);
    Ok(headers)
}
