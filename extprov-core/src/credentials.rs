//! Credentials accepted by the session constructors.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::secret::Secret;
use crate::session::SessionError;

/// Login material for one of the two session variants.
///
/// The variant decides which session [`crate::session::connect`] builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// OAuth2 client-credentials grant.
    ClientCredentials {
        client_id: String,
        client_secret: Secret,
    },

    /// Username/password for the cookie + CSRF login flow.
    Password { username: String, password: Secret },
}

impl Credentials {
    /// OAuth2 client ID and secret.
    pub fn client_credentials(client_id: impl Into<String>, client_secret: impl Into<Secret>) -> Self {
        Self::ClientCredentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Username and password.
    pub fn password(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode a base64 `user:pass` token into username/password credentials.
    ///
    /// A token without a `:` yields an empty password.
    pub fn from_basic_token(token: &str) -> Result<Self, SessionError> {
        let bytes = STANDARD
            .decode(token.trim())
            .map_err(|e| SessionError::InvalidCredentials {
                message: format!("basic token is not valid base64: {}", e),
            })?;
        let decoded = String::from_utf8(bytes).map_err(|_| SessionError::InvalidCredentials {
            message: "basic token is not valid UTF-8".to_string(),
        })?;

        let (username, password) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));
        if username.is_empty() {
            return Err(SessionError::InvalidCredentials {
                message: "basic token has an empty username".to_string(),
            });
        }
        Ok(Self::password(username, password))
    }

    /// The public half of the credentials, safe to log.
    pub fn principal(&self) -> &str {
        match self {
            Self::ClientCredentials { client_id, .. } => client_id,
            Self::Password { username, .. } => username,
        }
    }
}
