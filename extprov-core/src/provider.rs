//! External provider specifications.
//!
//! This module provides:
//! - [`ProviderSpec`] - Tagged union of the provider bodies sent to the remote
//! - [`SamlProviderSpec`] / [`DocusignProviderSpec`] - Per-type payloads
//! - [`ProviderRecord`] - A provider as returned by the remote
//! - [`select_docusign_target`] - DocuSign host/integration key selection
//!
//! Specs are serialised with a `type` discriminant (`saml2` / `docusign`)
//! next to the variant's own fields, which is exactly the body the
//! `/api/external_providers/<id>` endpoint expects.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::environment::BaseUri;
use crate::model::{AccountId, Capability, ProviderId, ProviderState, ProviderType};
use crate::saml::{SamlError, SamlMetadata};
use crate::session::SessionError;

/// Attribute used as the SAML identifier key.
pub const SAML_IDENTIFIER_KEY: &str = "nameID";

/// DocuSign demo (developer sandbox) account host.
pub const DOCUSIGN_DEMO_HOST: &str = "account-d.docusign.net";

/// DocuSign production account host.
pub const DOCUSIGN_PRODUCTION_HOST: &str = "account.docusign.net";

/// Integration key of the platform's DocuSign testing app.
pub const DOCUSIGN_TESTING_INTEGRATION_KEY: &str = "0f1754c4-b1b2-4817-9bcf-5908fa28d326";

/// Integration key of the platform's DocuSign production app.
pub const DOCUSIGN_PRODUCTION_INTEGRATION_KEY: &str = "824ad6b0-de12-4d65-a008-0f945cc9549c";

/// Error type for provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The create/update PUT was rejected.
    #[error("failed to create/update provider: status {status}: {body}")]
    UpsertFailed { status: u16, body: String },

    /// A development DocuSign provider needs an explicit integration key.
    #[error("integration key is required for the {environment} DocuSign environment")]
    MissingIntegrationKey { environment: DocusignEnvironment },

    /// SAML metadata could not be used.
    #[error("SAML metadata error: {0}")]
    Saml(#[from] SamlError),

    /// Session-level failure outside the upsert itself.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// Provider body for `PUT /api/external_providers/<id>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderSpec {
    Saml2(SamlProviderSpec),
    Docusign(DocusignProviderSpec),
}

impl ProviderSpec {
    /// Provider name, half of the remote uniqueness key.
    pub fn name(&self) -> &str {
        match self {
            Self::Saml2(spec) => &spec.name,
            Self::Docusign(spec) => &spec.name,
        }
    }

    /// Provider type, the other half of the uniqueness key.
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::Saml2(_) => ProviderType::Saml2,
            Self::Docusign(_) => ProviderType::Docusign,
        }
    }

    /// Serialise to the JSON request body.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<SamlProviderSpec> for ProviderSpec {
    fn from(spec: SamlProviderSpec) -> Self {
        Self::Saml2(spec)
    }
}

impl From<DocusignProviderSpec> for ProviderSpec {
    fn from(spec: DocusignProviderSpec) -> Self {
        Self::Docusign(spec)
    }
}

/// SAML2 provider payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamlProviderSpec {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,

    /// The platform's SAML callback URL.
    pub identifier: String,

    pub provides: Vec<Capability>,

    pub options: SamlOptions,

    /// IdP hostname, taken from the entry point when it parses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Options block of a SAML2 provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamlOptions {
    pub entry_point: String,
    pub public_cert: String,
    pub identifier_key: String,
    pub email_key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_key: Option<String>,
}

impl SamlProviderSpec {
    /// Build a spec from extracted metadata for the given environment.
    ///
    /// Fails with `MissingField` when the entry point or certificate is empty.
    pub fn from_metadata(
        name: impl Into<String>,
        metadata: &SamlMetadata,
        base: &BaseUri,
    ) -> Result<Self, SamlError> {
        if metadata.entry_point.trim().is_empty() {
            return Err(SamlError::MissingField {
                field: "SingleSignOnService Location",
            });
        }
        if metadata.public_cert.trim().is_empty() {
            return Err(SamlError::MissingField {
                field: "X509Certificate",
            });
        }

        Ok(Self {
            name: name.into(),
            account_id: None,
            identifier: base.saml_callback(),
            provides: vec![Capability::Auth],
            options: SamlOptions {
                entry_point: metadata.entry_point.clone(),
                public_cert: crate::saml::format_certificate(&metadata.public_cert),
                identifier_key: SAML_IDENTIFIER_KEY.to_string(),
                email_key: SAML_IDENTIFIER_KEY.to_string(),
                name_key: None,
            },
            host: entry_point_host(&metadata.entry_point),
        })
    }

    /// Set the platform account.
    pub fn with_account_id(mut self, account_id: Option<AccountId>) -> Self {
        self.account_id = account_id;
        self
    }

    /// Set the capabilities. An empty list keeps the default `auth`.
    pub fn with_provides(mut self, provides: Vec<Capability>) -> Self {
        if !provides.is_empty() {
            self.provides = provides;
        }
        self
    }

    /// Override the email attribute key.
    pub fn with_email_key(mut self, email_key: impl Into<String>) -> Self {
        self.options.email_key = email_key.into();
        self
    }

    /// Set the display-name attribute key.
    pub fn with_name_key(mut self, name_key: impl Into<String>) -> Self {
        self.options.name_key = Some(name_key.into());
        self
    }
}

fn entry_point_host(entry_point: &str) -> Option<String> {
    url::Url::parse(entry_point)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

/// DocuSign app environment the provider should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocusignEnvironment {
    #[default]
    Production,
    Testing,
    Development,
}

impl fmt::Display for DocusignEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Testing => "testing",
            Self::Development => "development",
        })
    }
}

impl FromStr for DocusignEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "testing" => Ok(Self::Testing),
            "development" => Ok(Self::Development),
            other => Err(format!(
                "unknown DocuSign environment '{}' (expected production, testing or development)",
                other
            )),
        }
    }
}

/// Host and integration key a DocuSign provider is registered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocusignTarget {
    pub host: &'static str,
    pub identifier: String,
}

/// Whether a DocuSign base URL points at the demo tenant.
pub fn is_docusign_demo(base_url: &str) -> bool {
    base_url.contains(DOCUSIGN_DEMO_HOST) || base_url.to_ascii_lowercase().contains("demo")
}

/// Choose the account host and integration key for a DocuSign provider.
///
/// | tenant     | environment | identifier                          |
/// |------------|-------------|-------------------------------------|
/// | any        | development | `integration_key`, required         |
/// | demo       | testing     | testing constant                    |
/// | production | production  | production constant                 |
/// | demo       | production  | `integration_key` or testing const  |
/// | production | testing     | `integration_key` or production const |
pub fn select_docusign_target(
    base_url: &str,
    environment: DocusignEnvironment,
    integration_key: Option<&str>,
) -> Result<DocusignTarget, ProviderError> {
    let integration_key = integration_key.map(str::trim).filter(|key| !key.is_empty());
    let demo = is_docusign_demo(base_url);

    let host = if demo {
        DOCUSIGN_DEMO_HOST
    } else {
        DOCUSIGN_PRODUCTION_HOST
    };

    let identifier = match (environment, demo) {
        (DocusignEnvironment::Development, _) => integration_key
            .ok_or(ProviderError::MissingIntegrationKey { environment })?
            .to_string(),
        (DocusignEnvironment::Testing, true) => DOCUSIGN_TESTING_INTEGRATION_KEY.to_string(),
        (DocusignEnvironment::Production, false) => DOCUSIGN_PRODUCTION_INTEGRATION_KEY.to_string(),
        (_, true) => integration_key
            .unwrap_or(DOCUSIGN_TESTING_INTEGRATION_KEY)
            .to_string(),
        (_, false) => integration_key
            .unwrap_or(DOCUSIGN_PRODUCTION_INTEGRATION_KEY)
            .to_string(),
    };

    Ok(DocusignTarget { host, identifier })
}

/// DocuSign provider payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocusignProviderSpec {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,

    pub host: String,

    /// DocuSign integration key.
    pub identifier: String,

    pub provides: Vec<Capability>,

    pub options: DocusignOptions,

    /// Always `pending`: an administrator activates the provider later.
    pub state: ProviderState,
}

/// Options block of a DocuSign provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocusignOptions {
    /// DocuSign-side account ID.
    pub account_id: String,
}

impl DocusignProviderSpec {
    /// Build a pending DocuSign provider for the selected target.
    pub fn new(
        name: impl Into<String>,
        docusign_account_id: impl Into<String>,
        target: DocusignTarget,
    ) -> Self {
        Self {
            name: name.into(),
            account_id: None,
            host: target.host.to_string(),
            identifier: target.identifier,
            provides: vec![Capability::Report],
            options: DocusignOptions {
                account_id: docusign_account_id.into(),
            },
            state: ProviderState::Pending,
        }
    }

    /// Set the platform account.
    pub fn with_account_id(mut self, account_id: Option<AccountId>) -> Self {
        self.account_id = account_id;
        self
    }
}

/// A provider as returned by the remote.
///
/// `id`, `name` and `type` are typed; every other field is kept verbatim.
/// Typed fields of an unexpected shape read as `None` rather than failing
/// the record; numeric-string IDs are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(
        default,
        deserialize_with = "lenient_provider_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<ProviderId>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_type: Option<String>,

    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ProviderRecord {
    /// Whether this record is the (name, type) pair being looked for.
    pub fn matches(&self, name: &str, provider_type: ProviderType) -> bool {
        self.name.as_deref() == Some(name) && self.provider_type.as_deref() == Some(provider_type.as_str())
    }

    /// The record's `account_id`, when it carries a usable one.
    pub fn account_id(&self) -> Option<AccountId> {
        self.fields.get("account_id").and_then(AccountId::from_json)
    }

    /// Records from a provider listing, skipping entries that are not objects.
    pub fn from_listing(entries: Vec<serde_json::Value>) -> Vec<Self> {
        entries
            .into_iter()
            .filter_map(|entry| {
                serde_json::from_value(entry)
                    .map_err(|e| debug!("Skipping unreadable provider entry: {}", e))
                    .ok()
            })
            .collect()
    }
}

fn lenient_provider_id<'de, D>(deserializer: D) -> Result<Option<ProviderId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_u64().map(ProviderId),
        serde_json::Value::String(s) => s.trim().parse().ok().map(ProviderId),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata() -> SamlMetadata {
        SamlMetadata {
            entry_point: "https://login.example.com/tenant/saml2".to_string(),
            public_cert: "MIIC".to_string(),
            entity_id: Some("https://sts.example.com".to_string()),
        }
    }

    fn base() -> BaseUri {
        BaseUri::new("https://acme.app.luminance.com")
    }

    #[test]
    fn test_saml_spec_defaults() {
        let spec = SamlProviderSpec::from_metadata("Okta", &metadata(), &base()).unwrap();

        assert_eq!(spec.identifier, "https://acme.app.luminance.com/saml2/sp");
        assert_eq!(spec.provides, vec![Capability::Auth]);
        assert_eq!(spec.options.identifier_key, "nameID");
        assert_eq!(spec.options.email_key, "nameID");
        assert_eq!(spec.host.as_deref(), Some("login.example.com"));
        assert!(spec.options.public_cert.starts_with("-----BEGIN CERTIFICATE-----\nMIIC"));
    }

    #[test]
    fn test_saml_spec_serialises_with_type_tag() {
        let spec = SamlProviderSpec::from_metadata("Okta", &metadata(), &base())
            .unwrap()
            .with_account_id(Some(AccountId::Numeric(12)))
            .with_provides(vec![Capability::Auth, Capability::Autoprovision])
            .with_email_key("email")
            .with_name_key("displayName");
        let body = ProviderSpec::from(spec).to_json();

        assert_eq!(body["type"], "saml2");
        assert_eq!(body["name"], "Okta");
        assert_eq!(body["account_id"], 12);
        assert_eq!(body["provides"], json!(["auth", "autoprovision"]));
        assert_eq!(body["options"]["email_key"], "email");
        assert_eq!(body["options"]["name_key"], "displayName");
        assert_eq!(body["options"]["entry_point"], "https://login.example.com/tenant/saml2");
        assert_eq!(body["host"], "login.example.com");
        assert!(body.get("state").is_none());
    }

    #[test]
    fn test_saml_spec_without_account_or_host() {
        let mut meta = metadata();
        meta.entry_point = "not a url".to_string();
        let spec = SamlProviderSpec::from_metadata("Okta", &meta, &base()).unwrap();
        let body = ProviderSpec::from(spec).to_json();

        assert!(body.get("account_id").is_none());
        assert!(body.get("host").is_none());
        assert!(body["options"].get("name_key").is_none());
    }

    #[test]
    fn test_saml_spec_requires_entry_point_and_cert() {
        let mut meta = metadata();
        meta.public_cert = String::new();
        let err = SamlProviderSpec::from_metadata("Okta", &meta, &base()).unwrap_err();
        assert!(matches!(err, SamlError::MissingField { field: "X509Certificate" }));

        let mut meta = metadata();
        meta.entry_point = " ".to_string();
        assert!(SamlProviderSpec::from_metadata("Okta", &meta, &base()).is_err());
    }

    #[test]
    fn test_docusign_demo_testing() {
        let target = select_docusign_target(
            "https://account-d.docusign.net",
            DocusignEnvironment::Testing,
            Some("ignored-key"),
        )
        .unwrap();
        assert_eq!(target.host, DOCUSIGN_DEMO_HOST);
        assert_eq!(target.identifier, DOCUSIGN_TESTING_INTEGRATION_KEY);
    }

    #[test]
    fn test_docusign_production_production() {
        let target =
            select_docusign_target("account.docusign.net", DocusignEnvironment::Production, None).unwrap();
        assert_eq!(target.host, DOCUSIGN_PRODUCTION_HOST);
        assert_eq!(target.identifier, DOCUSIGN_PRODUCTION_INTEGRATION_KEY);
    }

    #[test]
    fn test_docusign_demo_detected_case_insensitively() {
        assert!(is_docusign_demo("https://DEMO.docusign.net"));
        assert!(is_docusign_demo("account-d.docusign.net"));
        assert!(!is_docusign_demo("https://na3.docusign.net"));
    }

    #[test]
    fn test_docusign_development_requires_key_on_any_host() {
        for base_url in ["account-d.docusign.net", "account.docusign.net"] {
            let err = select_docusign_target(base_url, DocusignEnvironment::Development, None).unwrap_err();
            assert!(matches!(
                err,
                ProviderError::MissingIntegrationKey {
                    environment: DocusignEnvironment::Development
                }
            ));

            let err =
                select_docusign_target(base_url, DocusignEnvironment::Development, Some("  ")).unwrap_err();
            assert!(matches!(err, ProviderError::MissingIntegrationKey { .. }));
        }

        let target =
            select_docusign_target("account.docusign.net", DocusignEnvironment::Development, Some("dev-key"))
                .unwrap();
        assert_eq!(target.identifier, "dev-key");
    }

    #[test]
    fn test_docusign_cross_combinations_fall_back_to_constants() {
        let target = select_docusign_target("demo.docusign.net", DocusignEnvironment::Production, None).unwrap();
        assert_eq!(target.identifier, DOCUSIGN_TESTING_INTEGRATION_KEY);

        let target = select_docusign_target("account.docusign.net", DocusignEnvironment::Testing, None).unwrap();
        assert_eq!(target.identifier, DOCUSIGN_PRODUCTION_INTEGRATION_KEY);

        let target =
            select_docusign_target("account.docusign.net", DocusignEnvironment::Testing, Some("custom")).unwrap();
        assert_eq!(target.identifier, "custom");
    }

    #[test]
    fn test_docusign_spec_body() {
        let target = select_docusign_target("account-d.docusign.net", DocusignEnvironment::Testing, None).unwrap();
        let spec = DocusignProviderSpec::new("DocuSign Integration", "633b43f4", target)
            .with_account_id(Some(AccountId::Numeric(5)));
        let body = ProviderSpec::from(spec).to_json();

        assert_eq!(
            body,
            json!({
                "type": "docusign",
                "name": "DocuSign Integration",
                "account_id": 5,
                "host": "account-d.docusign.net",
                "identifier": DOCUSIGN_TESTING_INTEGRATION_KEY,
                "provides": ["report"],
                "options": { "account_id": "633b43f4" },
                "state": "pending"
            })
        );
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("Testing".parse::<DocusignEnvironment>().unwrap(), DocusignEnvironment::Testing);
        assert!("staging".parse::<DocusignEnvironment>().is_err());
        assert_eq!(DocusignEnvironment::default(), DocusignEnvironment::Production);
    }

    #[test]
    fn test_provider_record_matches() {
        let record: ProviderRecord = serde_json::from_value(json!({
            "id": 17,
            "name": "SAML SSO",
            "type": "saml2",
            "account_id": 3,
            "state": "active"
        }))
        .unwrap();

        assert_eq!(record.id, Some(ProviderId(17)));
        assert!(record.matches("SAML SSO", ProviderType::Saml2));
        assert!(!record.matches("SAML SSO", ProviderType::Docusign));
        assert!(!record.matches("Other", ProviderType::Saml2));
        assert_eq!(record.account_id(), Some(AccountId::Numeric(3)));
        assert_eq!(record.fields["state"], "active");
    }

    #[test]
    fn test_from_listing_tolerates_odd_entries() {
        let records = ProviderRecord::from_listing(vec![
            json!({"id": "abc", "name": "Other", "type": "saml2"}),
            json!({"id": "12", "name": 5, "type": null}),
            json!("not an object"),
            json!({"id": 7, "name": "Okta", "type": "saml2"}),
        ]);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, None);
        assert_eq!(records[1].id, Some(ProviderId(12)));
        assert_eq!(records[1].name, None);
        assert!(records[2].matches("Okta", ProviderType::Saml2));
        assert_eq!(records[2].id, Some(ProviderId(7)));
    }
}
