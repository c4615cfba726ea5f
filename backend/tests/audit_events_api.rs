//! HTTP-level tests for request validation.
//!
//! The router is built over a lazy pool that never connects, so every
//! request exercised here must be rejected before any query runs. The
//! happy paths that need real rows are covered by the unit tests on the
//! query and acknowledgement engines.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use marketplace_backend::config::Config;
use marketplace_backend::state::AppState;
use marketplace_backend::utils::time::Clock;

fn test_app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://postgres@localhost/marketplace_validation_test")
        .expect("lazy pool");
    let config = Config {
        database_url: "postgres://postgres@localhost/marketplace_validation_test".to_string(),
        read_database_url: None,
        database_max_connections: 1,
        default_page_size: 100,
        bind_addr: "127.0.0.1:0".to_string(),
    };
    let state = AppState::new(Arc::new(pool), None, config, Clock::fixed_at(1_700_000_000));
    marketplace_backend::app(state)
}

async fn get(uri: &str) -> (StatusCode, Value) {
    let response = test_app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .expect("request");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .expect("request");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn unknown_audit_type_filter_is_a_bad_request() {
    let (status, body) = get("/audit-events?audit-type=made_up_event").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("invalid audit type supplied"));
}

#[tokio::test]
async fn invalid_acknowledged_token_is_a_bad_request() {
    let (status, body) = get("/audit-events?acknowledged=banana").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("invalid acknowledged state supplied"));
}

#[tokio::test]
async fn object_id_without_object_type_is_a_bad_request() {
    let (status, body) = get("/audit-events?object-id=7").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("object-id cannot be provided without object-type"));
}

#[tokio::test]
async fn malformed_audit_date_is_a_bad_request() {
    let (status, body) = get("/audit-events?audit-date=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("invalid audit date supplied"));
}

#[tokio::test]
async fn non_positive_page_is_a_bad_request() {
    for uri in ["/audit-events?page=0", "/audit-events?page=-3"] {
        let (status, body) = get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri {}", uri);
        assert!(body["error"].as_str().unwrap().contains("Invalid page argument"));
    }

    let (status, body) = get("/audit-events?per_page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("invalid page size supplied"));
}

#[tokio::test]
async fn create_requires_type_and_data() {
    let (status, body) = post("/audit-events", json!({"auditEvents": {"data": {}}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'type' is a required field"));

    let (status, body) = post(
        "/audit-events",
        json!({"auditEvents": {"type": "update_service"}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'data' is a required field"));
}

#[tokio::test]
async fn create_rejects_unknown_event_type() {
    let (status, body) = post(
        "/audit-events",
        json!({"auditEvents": {"type": "made_up_event", "data": {}}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("invalid audit type supplied: made_up_event"));
}

#[tokio::test]
async fn create_rejects_a_dangling_object_reference_half() {
    let (status, body) = post(
        "/audit-events",
        json!({"auditEvents": {"type": "update_service", "data": {}, "objectId": 7}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("object ID cannot be provided without an object type"));

    let (status, body) = post(
        "/audit-events",
        json!({"auditEvents": {"type": "update_service", "data": {}, "objectType": "services"}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("object type cannot be provided without an object ID"));
}

#[tokio::test]
async fn acknowledge_requires_updated_by() {
    let (status, body) = post("/audit-events/5/acknowledge", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("'updated_by' is a required field"));
}

#[tokio::test]
async fn cascade_requires_latest_event_id() {
    let (status, body) = post(
        "/services/7/updates/acknowledge",
        json!({"updated_by": "admin@example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("'latestAuditEventId' is a required field"));

    let (status, body) = post(
        "/services/7/updates/acknowledge",
        json!({"updated_by": "admin@example.com", "latestAuditEventId": "seven"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("invalid latestAuditEventId supplied"));
}

#[tokio::test]
async fn cascade_accepts_updated_by_nested_in_update_details() {
    // the nested form passes payload validation; the request then fails
    // on the unreachable database, not on the payload
    let (status, _) = post(
        "/services/7/updates/acknowledge",
        json!({"update_details": {"updated_by": "admin@example.com"}, "latestAuditEventId": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn responses_carry_the_request_id_header() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/audit-events?page=0")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "abc-123"
    );
}
