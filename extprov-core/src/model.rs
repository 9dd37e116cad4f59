//! Domain model types for external providers.
//!
//! This module defines the small vocabulary shared by the provider and
//! upsert modules:
//! - [`ProviderType`] - Discriminant of a remote provider record
//! - [`Capability`] - What a provider is used for (`auth`, `report`, ...)
//! - [`ProviderState`] - Activation state of a provider record
//! - [`AccountId`] - Platform account the provider belongs to
//! - [`ProviderId`] - Remote-assigned provider identifier

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of an external provider record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// SAML 2.0 single sign-on.
    Saml2,

    /// DocuSign report integration.
    Docusign,
}

impl ProviderType {
    /// Wire name used by the remote API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saml2 => "saml2",
            Self::Docusign => "docusign",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability a provider grants on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Sign-in via the provider.
    Auth,

    /// Just-in-time user creation on first sign-in.
    Autoprovision,

    /// Map IdP claims onto platform attributes.
    ClaimsMapping,

    /// Report/e-signature integration.
    Report,
}

impl Capability {
    /// Get the capability as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Autoprovision => "autoprovision",
            Self::ClaimsMapping => "claims_mapping",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(Self::Auth),
            "autoprovision" => Ok(Self::Autoprovision),
            "claims_mapping" => Ok(Self::ClaimsMapping),
            "report" => Ok(Self::Report),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Activation state of a provider record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    /// Awaiting an administrative step before use.
    Pending,

    /// Live.
    Active,
}

/// Platform account identifier.
///
/// The remote reports this as either a JSON number or a string; whichever it
/// used is sent back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountId {
    Numeric(i64),
    Text(String),
}

impl AccountId {
    /// Interpret a JSON value as an account ID.
    ///
    /// `null`, empty strings, zero and non-scalar values yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().filter(|id| *id != 0).map(Self::Numeric),
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{}", id),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl FromStr for AccountId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(id) => Self::Numeric(id),
            Err(_) => Self::Text(s.to_string()),
        })
    }
}

/// Remote-assigned provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub u64);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProviderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
