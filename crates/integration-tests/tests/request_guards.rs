//! Requests that are answered before any database access.
//!
//! The app under test points its pool at a closed port, so a handler that
//! reached the database would answer 500 instead of the asserted status.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;
use stockroom_core::Role;
use stockroom_integration_tests::TestApp;

#[tokio::test]
async fn test_health_is_ok_and_echoes_request_id() {
    let app = TestApp::without_database();
    let response = app.get("/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!("ok"));
    assert!(response.request_id.is_some());
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let app = TestApp::without_database();
    let response = app.get("/health/ready", None).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_orders_require_a_token() {
    let app = TestApp::without_database();

    let missing = app.get("/api/orders", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["isSuccess"], json!(false));

    let garbage = app.get("/api/orders", Some("not.a.token")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_catalogue_writes_require_admin() {
    let app = TestApp::without_database();
    let token = app.token_for(Role::User);
    let body = json!({"name": "Starter kit", "price": "10.00", "products": []});

    let bundle = app.post("/api/bundles", Some(&token), &body).await;
    assert_eq!(bundle.status, StatusCode::FORBIDDEN);

    let product = app
        .send(
            Method::DELETE,
            &format!("/api/products/{}", uuid::Uuid::now_v7()),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(product.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bundle_without_products_is_rejected_up_front() {
    let app = TestApp::without_database();
    let token = app.token_for(Role::Admin);
    let body = json!({"name": "Starter kit", "price": "10.00", "products": []});

    let response = app.post("/api/bundles", Some(&token), &body).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_fields(), vec!["request.products"]);
}

#[tokio::test]
async fn test_bundle_listing_a_product_twice_is_rejected_up_front() {
    let app = TestApp::without_database();
    let token = app.token_for(Role::Admin);
    let product_id = uuid::Uuid::now_v7();
    let body = json!({
        "name": "Starter kit",
        "price": "10.00",
        "products": [
            {"productId": product_id, "quantity": 1},
            {"productId": product_id, "quantity": 2},
        ],
    });

    let response = app.post("/api/bundles", Some(&token), &body).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_fields(), vec!["request.products"]);
}

#[tokio::test]
async fn test_order_without_items_is_rejected_up_front() {
    let app = TestApp::without_database();
    let token = app.token_for(Role::User);

    let response = app.post("/api/orders", Some(&token), &json!({"items": []})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_fields(), vec!["request.items"]);
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let app = TestApp::without_database();
    let token = app.token_for(Role::User);

    let response = app
        .post("/api/orders", Some(&token), &json!({"items": "everything"}))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_fields(), vec!["request"]);
}

#[tokio::test]
async fn test_bad_path_id_is_a_bad_request() {
    let app = TestApp::without_database();

    let response = app.get("/api/products/not-a-uuid", None).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_with_mismatched_body_id_is_rejected() {
    let app = TestApp::without_database();
    let token = app.token_for(Role::Admin);
    let body = json!({
        "id": uuid::Uuid::now_v7(),
        "name": "Tee",
        "basePrice": "12.50",
    });

    let response = app
        .send(
            Method::PUT,
            &format!("/api/products/{}", uuid::Uuid::now_v7()),
            Some(&token),
            Some(&body),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited_per_client() {
    let app = TestApp::without_database();
    let client = std::net::Ipv4Addr::new(198, 51, 100, 20);
    let body = json!({"email": "not-an-email", "password": "whatever-it-is"});

    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = app
            .send_from(client, Method::POST, "/api/auth/login", None, Some(&body))
            .await;
        statuses.push(response.status);
    }

    assert!(statuses[..5].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);

    let other = app.post("/api/auth/login", None, &body).await;
    assert_eq!(other.status, StatusCode::UNAUTHORIZED);
}
