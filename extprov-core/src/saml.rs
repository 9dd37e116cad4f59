//! SAML2 IdP metadata extraction.
//!
//! Only the three fields needed to register an identity provider are read:
//! the SSO entry point, the signing certificate and the entity ID. The
//! document is never validated beyond being well-formed XML.
//!
//! # Example
//!
//! ```
//! use extprov_core::saml;
//!
//! let xml = r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata"
//!         xmlns:ds="http://www.w3.org/2000/09/xmldsig#" entityID="https://idp.example.com">
//!   <md:IDPSSODescriptor>
//!     <md:KeyDescriptor use="signing">
//!       <ds:KeyInfo><ds:X509Data><ds:X509Certificate>MIIC</ds:X509Certificate></ds:X509Data></ds:KeyInfo>
//!     </md:KeyDescriptor>
//!     <md:SingleSignOnService Location="https://idp.example.com/sso"/>
//!   </md:IDPSSODescriptor>
//! </md:EntityDescriptor>"#;
//!
//! let metadata = saml::parse(xml).unwrap();
//! assert_eq!(metadata.entry_point, "https://idp.example.com/sso");
//! assert!(metadata.public_cert.starts_with("-----BEGIN CERTIFICATE-----"));
//! ```

use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SAML 2.0 metadata namespace.
pub const METADATA_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// XML digital signature namespace.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Error type for metadata extraction.
#[derive(Debug, Error)]
pub enum SamlError {
    /// The document is not well-formed XML.
    #[error("malformed SAML metadata XML: {message}")]
    MalformedXml { message: String },

    /// A mandatory field could not be located.
    #[error("SAML metadata is missing {field}")]
    MissingField { field: &'static str },
}

/// Fields extracted from IdP metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamlMetadata {
    /// `SingleSignOnService/@Location` of the IdP descriptor.
    pub entry_point: String,

    /// Signing certificate in PEM form.
    pub public_cert: String,

    /// `EntityDescriptor/@entityID`, informational only.
    pub entity_id: Option<String>,
}

/// Parse IdP metadata XML.
pub fn parse(xml: &str) -> Result<SamlMetadata, SamlError> {
    let doc = Document::parse(xml).map_err(|e| SamlError::MalformedXml {
        message: e.to_string(),
    })?;
    let root = doc.root_element();

    let idp = find_descendant(root, METADATA_NS, "IDPSSODescriptor");

    let entity_id = root
        .attribute("entityID")
        .or_else(|| {
            idp.and_then(|idp| {
                idp.ancestors()
                    .find(|n| n.has_tag_name("EntityDescriptor"))
                    .and_then(|n| n.attribute("entityID"))
            })
        })
        .map(str::to_string);

    let entry_point = idp
        .and_then(|idp| find_descendant(idp, METADATA_NS, "SingleSignOnService"))
        .and_then(|sso| sso.attribute("Location"))
        .map(str::trim)
        .filter(|location| !location.is_empty())
        .map(str::to_string)
        .ok_or(SamlError::MissingField {
            field: "SingleSignOnService Location",
        })?;

    let certificate = idp
        .and_then(signing_key_descriptor)
        .and_then(certificate_text)
        .or_else(|| certificate_text(root))
        .ok_or(SamlError::MissingField {
            field: "X509Certificate",
        })?;

    Ok(SamlMetadata {
        entry_point,
        public_cert: format_certificate(&certificate),
        entity_id,
    })
}

/// Wrap bare base64 certificate text in PEM markers.
///
/// Text that already starts with a PEM header is returned trimmed but
/// otherwise unchanged, so the function is idempotent.
pub fn format_certificate(cert: &str) -> String {
    let cert = cert.trim();
    if cert.starts_with("-----BEGIN") {
        cert.to_string()
    } else {
        format!("{}\n{}\n{}", PEM_BEGIN, cert, PEM_END)
    }
}

/// Prefer a `use="signing"` key descriptor, else take the first one.
fn signing_key_descriptor<'a, 'input>(idp: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    let mut descriptors = idp
        .descendants()
        .filter(|n| n.has_tag_name((METADATA_NS, "KeyDescriptor")) || n.has_tag_name("KeyDescriptor"));

    let first = descriptors.next()?;
    if first.attribute("use") == Some("signing") {
        return Some(first);
    }
    Some(
        descriptors
            .find(|n| n.attribute("use") == Some("signing"))
            .unwrap_or(first),
    )
}

fn certificate_text(scope: Node<'_, '_>) -> Option<String> {
    find_descendant(scope, XMLDSIG_NS, "X509Certificate")
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Namespaced lookup first, then a local-name match for documents that
/// declare the elements without (or under a different) namespace.
fn find_descendant<'a, 'input>(
    scope: Node<'a, 'input>,
    namespace: &str,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    scope
        .descendants()
        .find(|n| n.has_tag_name((namespace, local_name)))
        .or_else(|| scope.descendants().find(|n| n.has_tag_name(local_name)))
}
