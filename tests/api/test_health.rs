//! Liveness and readiness endpoints.

use actix_web::{http::StatusCode, test};
use serde_json::Value;

use super::test_helpers::{TestContext, create_test_app};

#[actix_rt::test]
async fn test_health_reports_healthy() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_rt::test]
async fn test_ready_pings_store() {
    let ctx = TestContext::new();
    let app = create_test_app(&ctx).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/ready").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["database"], "connected");
}
