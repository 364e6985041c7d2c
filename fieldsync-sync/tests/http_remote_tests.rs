use fieldsync_sync::remote::build_client;
use fieldsync_sync::{
    EntityConfig, HttpRemote, NoCredentials, RemoteConfig, RemoteEndpoint, StaticToken, SyncError,
};
use fieldsync_types::{EntityType, Record, RecordId};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote(base_url: &str) -> HttpRemote {
    HttpRemote::new(
        build_client(&RemoteConfig::default()).unwrap(),
        base_url,
        &EntityConfig::new(EntityType::Account, vec![]),
        Arc::new(StaticToken::new("test-token")),
    )
}

fn record(id: &str, name: &str) -> Record {
    Record::new(
        RecordId::new(id),
        json!({ "name": name }).as_object().cloned().unwrap(),
    )
}

// ── URLs ────────────────────────────────────────────────────────

#[test]
fn url_joins_base_and_endpoint() {
    let r = remote("http://example.test/api/");
    assert_eq!(r.url(), "http://example.test/api/accounts");
    assert_eq!(r.entity_type(), EntityType::Account);
}

// ── list ────────────────────────────────────────────────────────

#[tokio::test]
async fn list_parses_array_and_sends_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "001", "name": "Acme", "createdAt": 1000, "lastModifiedAt": 2000},
            {"id": 42, "name": "Globex"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let records = remote(&server.uri()).list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, RecordId::new("001"));
    assert_eq!(records[0].created_at.as_millis(), 1000);
    assert_eq!(records[0].last_modified_at.as_millis(), 2000);
    assert_eq!(records[1].id, RecordId::new("42"));
    assert_eq!(records[1].get("name"), Some(&json!("Globex")));
}

#[tokio::test]
async fn list_accepts_records_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"records": [{"id": "a", "name": "Acme"}]})),
        )
        .mount(&server)
        .await;

    let records = remote(&server.uri()).list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, RecordId::new("a"));
}

#[tokio::test]
async fn list_rejects_non_array_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let err = remote(&server.uri()).list().await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidResponse(_)), "{err}");
}

#[tokio::test]
async fn no_credentials_sends_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let r = HttpRemote::new(
        build_client(&RemoteConfig::default()).unwrap(),
        &server.uri(),
        &EntityConfig::new(EntityType::Account, vec![]),
        Arc::new(NoCredentials),
    );
    assert!(r.list().await.unwrap().is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

// ── Status mapping ──────────────────────────────────────────────

#[tokio::test]
async fn unauthorized_maps_to_remote_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired token"))
        .mount(&server)
        .await;

    let err = remote(&server.uri()).list().await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteUnauthorized(ref m) if m == "expired token"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unprocessable_maps_to_validation_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(422).set_body_string("name is required"))
        .mount(&server)
        .await;

    let err = remote(&server.uri())
        .create(&record("local1", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ValidationFailed(_)), "{err}");
}

#[tokio::test]
async fn server_error_maps_to_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = remote(&server.uri()).list().await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteRequestFailed { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn unreachable_host_maps_to_network_unreachable() {
    let err = remote("http://127.0.0.1:1").list().await.unwrap_err();
    assert!(matches!(err, SyncError::NetworkUnreachable(_)), "{err}");
    assert!(err.is_transient());
}

// ── get ─────────────────────────────────────────────────────────

#[tokio::test]
async fn get_fetches_one_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/001xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "001xyz", "name": "Acme"})))
        .mount(&server)
        .await;

    let r = remote(&server.uri())
        .get(&RecordId::new("001xyz"))
        .await
        .unwrap();
    assert_eq!(r.id, RecordId::new("001xyz"));
    assert_eq!(r.get("name"), Some(&json!("Acme")));
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = remote(&server.uri())
        .get(&RecordId::new("nope"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ── create / update ─────────────────────────────────────────────

#[tokio::test]
async fn create_posts_operation_and_takes_server_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts"))
        .and(body_partial_json(json!({
            "operation": "create",
            "data": {"id": "local1", "name": "Acme"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "001xyz"})))
        .expect(1)
        .mount(&server)
        .await;

    let submitted = record("local1", "Acme");
    let created = remote(&server.uri()).create(&submitted).await.unwrap();
    assert_eq!(created.id, RecordId::new("001xyz"));
    assert_eq!(created.fields, submitted.fields);
    assert_eq!(created.created_at, submitted.created_at);
}

#[tokio::test]
async fn create_prefers_returned_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "001xyz",
            "record": {"name": "ACME", "createdAt": 5, "lastModifiedAt": 6}
        })))
        .mount(&server)
        .await;

    let created = remote(&server.uri())
        .create(&record("local1", "Acme"))
        .await
        .unwrap();
    assert_eq!(created.id, RecordId::new("001xyz"));
    assert_eq!(created.get("name"), Some(&json!("ACME")));
    assert_eq!(created.created_at.as_millis(), 5);
}

#[tokio::test]
async fn create_without_id_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let err = remote(&server.uri())
        .create(&record("local1", "Acme"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidResponse(_)));
}

#[tokio::test]
async fn update_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts"))
        .and(body_partial_json(json!({"operation": "update", "data": {"id": "001xyz"}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let submitted = record("001xyz", "Acme Corp");
    let updated = remote(&server.uri()).update(&submitted).await.unwrap();
    assert_eq!(updated, submitted);
}

#[tokio::test]
async fn update_unwraps_record_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "record": {"id": "001xyz", "name": "Acme Corp", "tier": "gold"}
        })))
        .mount(&server)
        .await;

    let updated = remote(&server.uri())
        .update(&record("001xyz", "Acme Corp"))
        .await
        .unwrap();
    assert_eq!(updated.get("tier"), Some(&json!("gold")));
}

// ── delete ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_sends_delete() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/accounts/001xyz"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    remote(&server.uri())
        .delete(&RecordId::new("001xyz"))
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_of_missing_record_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/accounts/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    remote(&server.uri())
        .delete(&RecordId::new("gone"))
        .await
        .unwrap();
}
