use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use sea_orm::{DatabaseBackend, DbErr, MockDatabase};
use serde_json::{Value, json};

use gst_einvoice::domain::retry::RetryPolicy;
use gst_einvoice::infra::einvoice_api::HttpEinvoiceClient;
use gst_einvoice::infra::rate_limit::RateLimiter;
use gst_einvoice::infra::token::TokenManager;
use gst_einvoice::router::build_router;
use gst_einvoice::state::AppState;

/// Router over a database that fails every query and an unreachable Redis;
/// only paths that finish before touching storage succeed.
fn server() -> TestServer {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_errors([DbErr::Custom("connection reset by peer".to_owned())])
        .into_connection();
    let redis = deadpool_redis::Config::from_url("redis://127.0.0.1:1")
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .unwrap();
    let einvoice = HttpEinvoiceClient::new(
        Arc::new(TokenManager::new()),
        Arc::new(RateLimiter::new()),
        Duration::from_secs(1),
    )
    .unwrap();
    let state = AppState {
        db,
        redis,
        einvoice,
        settings_cache_ttl_secs: 60,
        rate_limit_max_wait: Duration::from_secs(1),
        retry_policy: RetryPolicy::default(),
        reconcile_batch_size: 10,
    };
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn should_answer_liveness_check_with_request_id() {
    let server = server();

    let response = server.get("/healthz").await;

    response.assert_status_ok();
    assert!(!response.header("x-request-id").is_empty());
}

#[tokio::test]
async fn should_report_not_ready_while_redis_is_down() {
    let server = server();

    let response = server.get("/readyz").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["ready"], false);
    assert_eq!(body["checks"]["database"], "ok");
    assert_ne!(body["checks"]["redis"], "ok");
}

#[tokio::test]
async fn should_echo_caller_request_id() {
    let server = server();

    let response = server
        .get("/healthz")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-123"),
        )
        .await;

    assert_eq!(response.header("x-request-id"), "req-123");
}

#[tokio::test]
async fn should_reject_malformed_invoice_id() {
    let server = server();

    let response = server
        .post("/gst/einvoice/submit")
        .json(&json!({ "invoiceId": "forty-two" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn should_reject_blank_cancellation_reason_before_storage() {
    let server = server();

    let response = server
        .post("/gst/einvoice/cancel")
        .json(&json!({ "invoiceId": 42, "reason": "" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn should_report_storage_failure_as_internal_error() {
    let server = server();

    let response = server.get("/gst/einvoice/42").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["kind"], "INTERNAL");
    assert_eq!(body["message"], "internal error");
}

#[tokio::test]
async fn should_reject_non_numeric_invoice_path() {
    let server = server();

    server
        .get("/gst/einvoice/abc/logs")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
