//! # extprov Core
//!
//! Core library for provisioning external identity and report providers on
//! the document-management platform.
//!
//! This crate provides:
//! - Environment identifier resolution to a canonical base URI
//! - SAML2 IdP metadata extraction
//! - OAuth2 and cookie/CSRF sessions behind one [`HttpVerbs`] trait
//! - The find-or-create provider upsert protocol for SAML2 and DocuSign
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use extprov_core::{
//!     Credentials, NumericIdPolicy, ResolverConfig, SamlProviderRequest,
//!     environment, session::{self, SessionOptions}, upsert,
//! };
//!
//! async fn provision(xml: &str) -> Result<(), extprov_core::ExtprovError> {
//!     let config = ResolverConfig::new(NumericIdPolicy::Support);
//!     let base = environment::resolve("006403", None, &config)?;
//!     let creds = Credentials::client_credentials("client-id", "client-secret");
//!     let session = session::connect(base, creds, &SessionOptions::default()).await?;
//!
//!     let record = upsert::setup_saml_provider(&*session, xml, SamlProviderRequest::new("SAML SSO")).await?;
//!     println!("provider id: {:?}", record.id);
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod model;
pub mod provider;
pub mod saml;
pub mod secret;
pub mod session;
pub mod token;
pub mod upsert;

// Re-export commonly used types at crate root
pub use model::{
    AccountId,
    Capability,
    ProviderId,
    ProviderState,
    ProviderType,
};

pub use environment::{
    BaseUri,
    EnvironmentError,
    NumericIdPolicy,
    ResolverConfig,
};

pub use saml::{
    SamlError,
    SamlMetadata,
};

pub use secret::Secret;

pub use credentials::Credentials;

pub use session::{
    ApiResponse,
    CookieSession,
    HttpVerbs,
    OAuthSession,
    SessionError,
    SessionOptions,
};

pub use token::AccessToken;

pub use provider::{
    DocusignEnvironment,
    DocusignProviderSpec,
    ProviderError,
    ProviderRecord,
    ProviderSpec,
    SamlProviderSpec,
};

pub use upsert::{
    DocusignProviderRequest,
    SamlProviderRequest,
};

pub use account::discover_account_id;

pub use error::ExtprovError;
