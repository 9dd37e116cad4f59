//! Find-or-create of external providers.
//!
//! The remote has no create endpoint: every write is a `PUT` to
//! `/api/external_providers/<id>`. Updates use the ID found by scanning the
//! collection for the same (name, type); creates use a large sentinel ID that
//! the remote replaces with a freshly allocated one.
//!
//! The lookup and the write are not atomic. Two operators creating the same
//! (name, type) at once can both miss the lookup and both create.

use serde_json::json;
use tracing::{info, warn};

use crate::account::discover_account_id;
use crate::model::{AccountId, Capability, ProviderId, ProviderType};
use crate::provider::{
    DocusignEnvironment, DocusignProviderSpec, ProviderError, ProviderRecord, ProviderSpec,
    SamlProviderSpec, select_docusign_target,
};
use crate::saml;
use crate::secret::Secret;
use crate::session::{HttpVerbs, SessionError};

/// Provider collection path.
pub const EXTERNAL_PROVIDERS_PATH: &str = "/api/external_providers";

/// Sentinel ID for creating a SAML2 provider.
pub const SAML_CREATE_SENTINEL: ProviderId = ProviderId(999_999);

/// Sentinel ID for creating a DocuSign provider.
pub const DOCUSIGN_CREATE_SENTINEL: ProviderId = ProviderId(999_998);

/// Sentinel used to create a provider of the given type.
pub fn create_sentinel(provider_type: ProviderType) -> ProviderId {
    match provider_type {
        ProviderType::Saml2 => SAML_CREATE_SENTINEL,
        ProviderType::Docusign => DOCUSIGN_CREATE_SENTINEL,
    }
}

/// Path of a single provider.
pub fn provider_path(id: ProviderId) -> String {
    format!("{}/{}", EXTERNAL_PROVIDERS_PATH, id)
}

/// Fetch the full provider collection.
pub async fn list_providers(session: &dyn HttpVerbs) -> Result<Vec<ProviderRecord>, ProviderError> {
    let response = session.get(EXTERNAL_PROVIDERS_PATH).await?;
    Ok(ProviderRecord::from_listing(response.json()?))
}

/// ID of the first provider with this name and type, if any.
pub async fn find_provider_by_name_type(
    session: &dyn HttpVerbs,
    name: &str,
    provider_type: ProviderType,
) -> Result<Option<ProviderId>, ProviderError> {
    let providers = list_providers(session).await?;
    Ok(providers
        .iter()
        .find(|p| p.matches(name, provider_type))
        .and_then(|p| p.id))
}

/// Create or update a provider.
///
/// Without `existing_id` the collection is searched by (name, type); a miss
/// goes to the type's create sentinel.
pub async fn upsert(
    session: &dyn HttpVerbs,
    spec: &ProviderSpec,
    existing_id: Option<ProviderId>,
) -> Result<ProviderRecord, ProviderError> {
    let existing_id = match existing_id {
        Some(id) => Some(id),
        None => find_provider_by_name_type(session, spec.name(), spec.provider_type()).await?,
    };

    let target = match existing_id {
        Some(id) => {
            info!("Updating {} provider '{}' (ID {})", spec.provider_type(), spec.name(), id);
            id
        }
        None => {
            let sentinel = create_sentinel(spec.provider_type());
            info!("Creating {} provider '{}'", spec.provider_type(), spec.name());
            sentinel
        }
    };

    let body = spec.to_json();
    let response = session
        .put(&provider_path(target), Some(&body))
        .await
        .map_err(|e| match e {
            SessionError::Http { status, body, .. } => ProviderError::UpsertFailed { status, body },
            other => ProviderError::Session(other),
        })?;

    Ok(response.json()?)
}

/// Replace a provider's stored secret.
pub async fn update_secret(
    session: &dyn HttpVerbs,
    id: ProviderId,
    secret: &Secret,
) -> Result<(), ProviderError> {
    let path = format!("{}/updateSecret", provider_path(id));
    session
        .post(&path, Some(&json!({ "secret": secret.expose() })))
        .await?;
    info!("Secret updated for provider {}", id);
    Ok(())
}

/// Inputs for [`setup_saml_provider`] besides the metadata XML.
#[derive(Debug, Clone, Default)]
pub struct SamlProviderRequest {
    pub name: String,
    /// Discovered when absent.
    pub account_id: Option<AccountId>,
    /// Defaults to `[auth]` when empty.
    pub provides: Vec<Capability>,
    pub name_key: Option<String>,
    pub email_key: Option<String>,
    /// Skips the (name, type) lookup.
    pub provider_id: Option<ProviderId>,
}

impl SamlProviderRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Register or refresh a SAML2 provider from IdP metadata.
pub async fn setup_saml_provider(
    session: &dyn HttpVerbs,
    saml_xml: &str,
    request: SamlProviderRequest,
) -> Result<ProviderRecord, ProviderError> {
    let metadata = saml::parse(saml_xml)?;
    let mut spec = SamlProviderSpec::from_metadata(request.name, &metadata, session.base_uri())?
        .with_provides(request.provides);

    if let Some(name_key) = request.name_key {
        spec = spec.with_name_key(name_key);
    }
    if let Some(email_key) = request.email_key {
        spec = spec.with_email_key(email_key);
    }

    let account_id = match request.account_id {
        Some(account_id) => Some(account_id),
        None => discover_account_id(session).await,
    };
    if account_id.is_none() {
        warn!("No account_id available; the remote may reject the SAML provider");
    }
    let spec = spec.with_account_id(account_id);

    upsert(session, &ProviderSpec::from(spec), request.provider_id).await
}

/// Inputs for [`setup_docusign_provider`].
#[derive(Debug, Clone)]
pub struct DocusignProviderRequest {
    pub name: String,
    /// DocuSign-side account ID.
    pub docusign_account_id: String,
    /// DocuSign base URL or host, used to tell demo from production.
    pub base_url: String,
    pub environment: DocusignEnvironment,
    /// Required for [`DocusignEnvironment::Development`].
    pub integration_key: Option<String>,
    /// Discovered when absent.
    pub account_id: Option<AccountId>,
    /// Sent through `updateSecret` after the upsert; empty values are ignored.
    pub secret: Option<Secret>,
    /// Skips the (name, type) lookup.
    pub provider_id: Option<ProviderId>,
}

impl DocusignProviderRequest {
    pub fn new(docusign_account_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: "DocuSign Integration".to_string(),
            docusign_account_id: docusign_account_id.into(),
            base_url: base_url.into(),
            environment: DocusignEnvironment::default(),
            integration_key: None,
            account_id: None,
            secret: None,
            provider_id: None,
        }
    }
}

/// Register or refresh a DocuSign provider in the `pending` state.
pub async fn setup_docusign_provider(
    session: &dyn HttpVerbs,
    request: DocusignProviderRequest,
) -> Result<ProviderRecord, ProviderError> {
    let target = select_docusign_target(
        &request.base_url,
        request.environment,
        request.integration_key.as_deref(),
    )?;

    let account_id = match request.account_id {
        Some(account_id) => Some(account_id),
        None => discover_account_id(session).await,
    };
    if account_id.is_none() {
        warn!("No account_id available; the remote may reject the DocuSign provider");
    }

    let spec = DocusignProviderSpec::new(request.name, request.docusign_account_id, target)
        .with_account_id(account_id);
    let record = upsert(session, &ProviderSpec::from(spec), request.provider_id).await?;

    let secret = request.secret.filter(|secret| !secret.is_empty());
    match (&secret, record.id) {
        (Some(secret), Some(id)) => update_secret(session, id, secret).await?,
        (Some(_), None) => warn!("Provider response has no id; secret not updated"),
        (None, _) => info!("No secret supplied; provider stays pending until one is set"),
    }

    Ok(record)
}
