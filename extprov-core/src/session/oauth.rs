//! OAuth2 client-credentials session.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, info};

use super::{ApiResponse, HttpVerbs, SessionError, SessionOptions, build_client, send};
use crate::environment::BaseUri;
use crate::secret::Secret;
use crate::token::{AccessToken, TokenResponse, describe_token_error};

/// Token endpoint, relative to the environment base URI.
pub const TOKEN_PATH: &str = "/auth/oauth2/token";

/// Session that sends `Authorization: Bearer <token>` on every request.
pub struct OAuthSession {
    base: BaseUri,
    client: reqwest::Client,
    token: AccessToken,
}

impl OAuthSession {
    /// Exchange client credentials for a token and build the session.
    pub async fn login(
        base: BaseUri,
        client_id: &str,
        client_secret: &Secret,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let token = exchange_client_credentials(&base, client_id, client_secret, options).await?;

        let mut bearer = HeaderValue::from_str(&token.authorization_header()).map_err(|_| {
            SessionError::AuthenticationFailed {
                url: base.join(TOKEN_PATH),
                message: "access token contains characters not allowed in a header".to_string(),
            }
        })?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        let client = build_client(options, false, headers)?;

        Ok(Self { base, client, token })
    }

    /// The token obtained at login.
    pub fn token(&self) -> &AccessToken {
        &self.token
    }
}

impl std::fmt::Debug for OAuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSession")
            .field("base", &self.base)
            .field("token", &self.token)
            .finish()
    }
}

#[async_trait]
impl HttpVerbs for OAuthSession {
    fn base_uri(&self) -> &BaseUri {
        &self.base
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, SessionError> {
        send(&self.client, &self.base, method, path, body, HeaderMap::new()).await
    }
}

/// Perform the client-credentials grant against `<base>/auth/oauth2/token`.
///
/// Anything but `200 OK` is an [`SessionError::AuthenticationFailed`] whose
/// message carries the server's `error` / `error_description`, or a bounded
/// preview of the raw body.
pub async fn exchange_client_credentials(
    base: &BaseUri,
    client_id: &str,
    client_secret: &Secret,
    options: &SessionOptions,
) -> Result<AccessToken, SessionError> {
    let token_url = base.join(TOKEN_PATH);
    info!("Requesting token from {}", token_url);
    debug!("Using client ID {}", Secret::new(client_id).masked(8));

    let client = build_client(options, false, HeaderMap::new())?;
    let response = client
        .post(&token_url)
        .basic_auth(client_id, Some(client_secret.expose()))
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body("grant_type=client_credentials")
        .send()
        .await
        .map_err(|e| SessionError::Transport {
            url: token_url.clone(),
            message: e.to_string(),
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| SessionError::Transport {
        url: token_url.clone(),
        message: format!("failed to read token response: {}", e),
    })?;

    if status != reqwest::StatusCode::OK {
        return Err(SessionError::AuthenticationFailed {
            url: token_url,
            message: format!(
                "token request failed with status {}: {}",
                status.as_u16(),
                describe_token_error(&body)
            ),
        });
    }

    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|e| SessionError::AuthenticationFailed {
            url: token_url.clone(),
            message: format!("token response has no usable access_token: {}", e),
        })?;

    info!("Token obtained successfully");
    Ok(AccessToken::from(parsed))
}
