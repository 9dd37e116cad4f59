//! Integration tests for the provider upsert protocol.
//!
//! These tests verify that:
//! - A (name, type) miss creates through the type's sentinel ID
//! - A hit updates the matched provider in place
//! - Account discovery falls back from the profile to existing providers
//! - DocuSign secrets go through `updateSecret` after the upsert

use extprov_core::{
    AccountId, BaseUri, DocusignEnvironment, DocusignProviderRequest, HttpVerbs, OAuthSession,
    ProviderError, ProviderId, ProviderType, SamlProviderRequest, Secret, SessionOptions,
    discover_account_id,
    upsert::{self, find_provider_by_name_type},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_partial_json, method, path, query_param},
};

const SAML_XML: &str = r#"<?xml version="1.0"?>
<EntityDescriptor xmlns="urn:oasis:names:tc:SAML:2.0:metadata" entityID="https://sts.example.com/">
  <IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <KeyDescriptor use="signing">
      <KeyInfo xmlns="http://www.w3.org/2000/09/xmldsig#">
        <X509Data><X509Certificate>MIICert</X509Certificate></X509Data>
      </KeyInfo>
    </KeyDescriptor>
    <SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect"
                         Location="https://idp.example.com/sso"/>
  </IDPSSODescriptor>
</EntityDescriptor>"#;

async fn login(server: &MockServer) -> OAuthSession {
    Mock::given(method("POST"))
        .and(path("/auth/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-123",
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;

    OAuthSession::login(
        BaseUri::new(server.uri()),
        "client-id",
        &Secret::new("client-secret"),
        &SessionOptions::default(),
    )
    .await
    .unwrap()
}

async fn mount_provider_list(server: &MockServer, providers: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/external_providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(providers))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_find_provider_by_name_type() {
    let server = MockServer::start().await;
    let session = login(&server).await;
    mount_provider_list(
        &server,
        json!([
            {"id": 3, "name": "Okta", "type": "docusign"},
            {"id": 7, "name": "Okta", "type": "saml2"},
            {"id": 9, "name": "Okta", "type": "saml2"}
        ]),
    )
    .await;

    let found = find_provider_by_name_type(&session, "Okta", ProviderType::Saml2).await.unwrap();
    assert_eq!(found, Some(ProviderId(7)));

    let missing = find_provider_by_name_type(&session, "Azure", ProviderType::Saml2).await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_find_provider_skips_odd_entries() {
    let server = MockServer::start().await;
    let session = login(&server).await;
    mount_provider_list(
        &server,
        json!([
            {"id": "abc", "name": "Other", "type": "saml2"},
            {"id": 7, "name": "Okta", "type": "saml2"}
        ]),
    )
    .await;

    let found = find_provider_by_name_type(&session, "Okta", ProviderType::Saml2).await.unwrap();
    assert_eq!(found, Some(ProviderId(7)));
}

#[tokio::test]
async fn test_saml_setup_creates_with_sentinel() {
    let server = MockServer::start().await;
    let session = login(&server).await;
    mount_provider_list(&server, json!([{"id": 3, "name": "Okta", "type": "docusign"}])).await;

    Mock::given(method("PUT"))
        .and(path("/api/external_providers/999999"))
        .and(body_partial_json(json!({
            "type": "saml2",
            "name": "Okta",
            "account_id": 42,
            "identifier": format!("{}/saml2/sp", server.uri()),
            "provides": ["auth"],
            "options": {
                "entry_point": "https://idp.example.com/sso",
                "identifier_key": "nameID",
                "email_key": "nameID"
            },
            "host": "idp.example.com"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12, "name": "Okta", "type": "saml2", "account_id": 42
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = SamlProviderRequest::new("Okta");
    request.account_id = Some(AccountId::Numeric(42));

    let record = upsert::setup_saml_provider(&session, SAML_XML, request).await.unwrap();
    assert_eq!(record.id, Some(ProviderId(12)));
    assert_eq!(record.account_id(), Some(AccountId::Numeric(42)));
}

#[tokio::test]
async fn test_saml_setup_updates_existing() {
    let server = MockServer::start().await;
    let session = login(&server).await;
    mount_provider_list(&server, json!([{"id": 7, "name": "Okta", "type": "saml2"}])).await;

    Mock::given(method("PUT"))
        .and(path("/api/external_providers/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "name": "Okta", "type": "saml2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = SamlProviderRequest::new("Okta");
    request.account_id = Some(AccountId::Numeric(1));

    let record = upsert::setup_saml_provider(&session, SAML_XML, request).await.unwrap();
    assert_eq!(record.id, Some(ProviderId(7)));
}

#[tokio::test]
async fn test_saml_setup_rejects_metadata_before_network() {
    let server = MockServer::start().await;
    let session = login(&server).await;

    let xml = r#"<EntityDescriptor xmlns="urn:oasis:names:tc:SAML:2.0:metadata"/>"#;
    let err = upsert::setup_saml_provider(&session, xml, SamlProviderRequest::new("Okta"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Saml(_)));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "only the token exchange should have been sent");
}

#[tokio::test]
async fn test_upsert_rejection_carries_status_and_body() {
    let server = MockServer::start().await;
    let session = login(&server).await;
    mount_provider_list(&server, json!([])).await;

    Mock::given(method("PUT"))
        .and(path("/api/external_providers/999999"))
        .respond_with(ResponseTemplate::new(422).set_body_string("account_id is required"))
        .mount(&server)
        .await;

    let mut request = SamlProviderRequest::new("Okta");
    request.account_id = Some(AccountId::Numeric(1));

    let err = upsert::setup_saml_provider(&session, SAML_XML, request).await.unwrap_err();
    match err {
        ProviderError::UpsertFailed { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "account_id is required");
        }
        other => panic!("expected UpsertFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_explicit_provider_id_skips_lookup() {
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("PUT"))
        .and(path("/api/external_providers/55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 55})))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = SamlProviderRequest::new("Okta");
    request.account_id = Some(AccountId::Numeric(1));
    request.provider_id = Some(ProviderId(55));

    let record = upsert::setup_saml_provider(&session, SAML_XML, request).await.unwrap();
    assert_eq!(record.id, Some(ProviderId(55)));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() != "GET"));
}

#[tokio::test]
async fn test_docusign_setup_creates_and_updates_secret() {
    let server = MockServer::start().await;
    let session = login(&server).await;
    mount_provider_list(&server, json!([])).await;

    Mock::given(method("PUT"))
        .and(path("/api/external_providers/999998"))
        .and(body_partial_json(json!({
            "type": "docusign",
            "name": "DocuSign Integration",
            "account_id": 42,
            "host": "account-d.docusign.net",
            "identifier": "0f1754c4-b1b2-4817-9bcf-5908fa28d326",
            "provides": ["report"],
            "options": {"account_id": "ds-account"},
            "state": "pending"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 21, "name": "DocuSign Integration", "type": "docusign"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/external_providers/21/updateSecret"))
        .and(body_json(json!({"secret": "rsa-private-key"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = DocusignProviderRequest::new("ds-account", "https://demo.docusign.net/restapi");
    request.environment = DocusignEnvironment::Testing;
    request.account_id = Some(AccountId::Numeric(42));
    request.secret = Some(Secret::new("rsa-private-key"));

    let record = upsert::setup_docusign_provider(&session, request).await.unwrap();
    assert_eq!(record.id, Some(ProviderId(21)));
}

#[tokio::test]
async fn test_docusign_development_without_key_sends_nothing() {
    let server = MockServer::start().await;
    let session = login(&server).await;

    let mut request = DocusignProviderRequest::new("ds-account", "https://www.docusign.net");
    request.environment = DocusignEnvironment::Development;

    let err = upsert::setup_docusign_provider(&session, request).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::MissingIntegrationKey {
            environment: DocusignEnvironment::Development
        }
    ));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_account_discovery_prefers_profile() {
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"account_id": "acct-7"})))
        .mount(&server)
        .await;

    let account_id = discover_account_id(&session).await;
    assert_eq!(account_id, Some(AccountId::Text("acct-7".to_string())));
}

#[tokio::test]
async fn test_account_discovery_falls_back_to_providers() {
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/external_providers"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Existing", "type": "saml2", "account_id": 314}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let account_id = discover_account_id(&session).await;
    assert_eq!(account_id, Some(AccountId::Numeric(314)));
}

#[tokio::test]
async fn test_account_discovery_gives_up_quietly() {
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"account_id": null})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/external_providers"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert_eq!(discover_account_id(&session).await, None);
}

#[tokio::test]
async fn test_discovered_account_flows_into_body() {
    let server = MockServer::start().await;
    let session = login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"account_id": 8})))
        .mount(&server)
        .await;
    mount_provider_list(&server, json!([])).await;

    Mock::given(method("PUT"))
        .and(path("/api/external_providers/999999"))
        .and(body_partial_json(json!({"account_id": 8})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 30})))
        .expect(1)
        .mount(&server)
        .await;

    let record = upsert::setup_saml_provider(&session, SAML_XML, SamlProviderRequest::new("Okta"))
        .await
        .unwrap();
    assert_eq!(record.id, Some(ProviderId(30)));
    assert_eq!(session.base_uri().as_str(), server.uri());
}

#[tokio::test]
async fn test_docusign_empty_secret_is_not_sent() {
    let server = MockServer::start().await;
    let session = login(&server).await;
    mount_provider_list(&server, json!([])).await;

    Mock::given(method("PUT"))
        .and(path("/api/external_providers/999998"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 21})))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = DocusignProviderRequest::new("ds-account", "account.docusign.net");
    request.account_id = Some(AccountId::Numeric(42));
    request.secret = Some(Secret::new(""));

    let record = upsert::setup_docusign_provider(&session, request).await.unwrap();
    assert_eq!(record.id, Some(ProviderId(21)));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().ends_with("/updateSecret")));
}
