//! OAuth2 client-credentials token handling.
//!
//! This module provides:
//! - [`TokenResponse`] - The raw body returned by the token endpoint
//! - [`AccessToken`] - A bearer token with its absolute expiry, when known
//! - [`describe_token_error`] - Human-readable summary of a failed exchange

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::secret::Secret;

/// Longest response text quoted back in an error message.
pub const ERROR_PREVIEW_CHARS: usize = 500;

/// Body of a successful `POST /auth/oauth2/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Secret,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// A bearer token obtained from the token endpoint.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token value.
    pub access_token: Secret,

    /// Token type (usually "Bearer").
    pub token_type: String,

    /// Lifetime in seconds, as reported by the server.
    pub expires_in: Option<u64>,

    /// When this token expires (None if the server did not say).
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token.expose())
    }
}

impl From<TokenResponse> for AccessToken {
    fn from(response: TokenResponse) -> Self {
        AccessToken {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            expires_at: response.expires_in.and_then(expiry_from_now),
        }
    }
}

/// Absolute expiry for a lifetime in seconds; `None` when it does not fit.
fn expiry_from_now(seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    Utc::now().checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Summarise a failed token exchange body.
///
/// JSON objects contribute their `error` and `error_description` fields;
/// anything else is quoted verbatim up to [`ERROR_PREVIEW_CHARS`].
pub fn describe_token_error(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => {
            let error = map
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("Unknown error");
            match map.get("error_description").and_then(|d| d.as_str()) {
                Some(description) => format!("{} ({})", error, description),
                None => error.to_string(),
            }
        }
        Ok(other) => other.to_string(),
        Err(_) => preview(body),
    }
}

/// Truncate response text to [`ERROR_PREVIEW_CHARS`] characters.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(ERROR_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
