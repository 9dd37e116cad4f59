//! Environment identifier resolution.
//!
//! Operators name a platform environment in several ways: a six-digit numeric
//! ID (`006403`), a bare moniker (`acme-corporate`), a moniker with the
//! platform domain attached (`acme-corporate.app.luminance.com`) or a full
//! URL. [`resolve`] turns any of these into a canonical [`BaseUri`] without
//! touching the network.
//!
//! Precedence, highest first:
//!
//! 1. an explicit base URI supplied by the caller
//! 2. a full `http://` / `https://` URL
//! 3. a moniker that already carries an `.app.` or `.support.` platform suffix
//! 4. a six-digit numeric ID, expanded according to [`NumericIdPolicy`]
//! 5. anything else, treated as a bare moniker under `.app.`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Platform domain used when the caller does not configure one.
pub const DEFAULT_PLATFORM_DOMAIN: &str = "luminance.com";

/// Error type for environment resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    /// The identifier was empty or whitespace.
    #[error("invalid environment identifier: {message}")]
    InvalidIdentifier { message: String },
}

/// How a six-digit numeric environment ID maps onto a host.
///
/// Has no `Default`; every caller picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericIdPolicy {
    /// `https://<id>.support.<domain>`
    Support,
    /// `https://<id>.app.<domain>`
    App,
}

impl NumericIdPolicy {
    fn subdomain(self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::App => "app",
        }
    }
}

impl fmt::Display for NumericIdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subdomain())
    }
}

impl FromStr for NumericIdPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "support" => Ok(Self::Support),
            "app" => Ok(Self::App),
            other => Err(format!("unknown numeric host policy '{}' (expected support or app)", other)),
        }
    }
}

/// Inputs to [`resolve`] that are configuration rather than per-call data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Platform domain, e.g. `luminance.com`.
    pub domain: String,

    /// Expansion rule for six-digit numeric IDs.
    pub numeric_policy: NumericIdPolicy,
}

impl ResolverConfig {
    /// Create a resolver configuration for the default platform domain.
    pub fn new(numeric_policy: NumericIdPolicy) -> Self {
        Self {
            domain: DEFAULT_PLATFORM_DOMAIN.to_string(),
            numeric_policy,
        }
    }

    /// Override the platform domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    fn known_suffixes(&self) -> [String; 2] {
        [
            format!(".app.{}", self.domain),
            format!(".support.{}", self.domain),
        ]
    }
}

/// Canonical scheme + host of an environment, never ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseUri(String);

impl BaseUri {
    /// Wrap a URI, stripping any trailing slashes.
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self(uri.trim_end_matches('/').to_string())
    }

    /// Get the base URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a request path onto the base with exactly one `/` between them.
    pub fn join(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.0, path)
        } else {
            format!("{}/{}", self.0, path)
        }
    }

    /// The SAML service-provider callback for this environment.
    pub fn saml_callback(&self) -> String {
        self.join("/saml2/sp")
    }
}

impl fmt::Display for BaseUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve an environment identifier to its base URI.
///
/// `explicit_base_uri`, when present, wins outright and is used verbatim apart
/// from trailing-slash removal.
pub fn resolve(
    identifier: &str,
    explicit_base_uri: Option<&str>,
    config: &ResolverConfig,
) -> Result<BaseUri, EnvironmentError> {
    if let Some(base) = explicit_base_uri.filter(|b| !b.trim().is_empty()) {
        return Ok(BaseUri::new(base.trim()));
    }

    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(EnvironmentError::InvalidIdentifier {
            message: "environment identifier is empty".to_string(),
        });
    }

    if identifier.starts_with("http://") || identifier.starts_with("https://") {
        return Ok(BaseUri::new(identifier));
    }

    if config
        .known_suffixes()
        .iter()
        .any(|suffix| identifier.contains(suffix.as_str()))
    {
        return Ok(BaseUri::new(format!("https://{}", identifier)));
    }

    if is_numeric_id(identifier) {
        return Ok(BaseUri::new(format!(
            "https://{}.{}.{}",
            identifier,
            config.numeric_policy.subdomain(),
            config.domain
        )));
    }

    Ok(BaseUri::new(format!("https://{}.app.{}", identifier, config.domain)))
}

fn is_numeric_id(identifier: &str) -> bool {
    identifier.len() == 6 && identifier.bytes().all(|b| b.is_ascii_digit())
}
