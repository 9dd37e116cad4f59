//! Top-level error types for extprov.

use thiserror::Error;

use crate::environment::EnvironmentError;
use crate::provider::ProviderError;
use crate::saml::SamlError;
use crate::session::SessionError;

/// Top-level error type encompassing all extprov errors.
#[derive(Debug, Error)]
pub enum ExtprovError {
    /// Error from environment resolution.
    #[error("environment error: {0}")]
    Environment(#[from] EnvironmentError),

    /// Error from SAML metadata extraction.
    #[error("SAML error: {0}")]
    Saml(#[from] SamlError),

    /// Error from login or an API request.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error from a provider upsert.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}
