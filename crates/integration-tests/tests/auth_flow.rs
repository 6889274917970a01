//! Registration, login, and refresh-token rotation against `PostgreSQL`.
//!
//! Run with: cargo test -p stockroom-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;
use stockroom_integration_tests::{TEST_PASSWORD, TestApp};

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_register_login_refresh_logout() {
    let app = TestApp::with_database().await;
    let email = format!("buyer-{}@Shop.Example", uuid::Uuid::new_v4().simple());

    let registered = app
        .post(
            "/api/auth/register",
            None,
            &json!({
                "email": email,
                "password": TEST_PASSWORD,
                "firstName": "Ada",
                "lastName": "Byrne",
            }),
        )
        .await;
    assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.body);
    assert_eq!(registered.data()["role"], json!("user"));
    assert_eq!(registered.data()["email"], json!(email.to_lowercase()));

    let duplicate = app
        .post(
            "/api/auth/register",
            None,
            &json!({
                "email": email.to_uppercase(),
                "password": TEST_PASSWORD,
                "firstName": "Ada",
                "lastName": "Byrne",
            }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let wrong = app
        .post(
            "/api/auth/login",
            None,
            &json!({"email": email, "password": "not-the-password"}),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let login = app
        .post(
            "/api/auth/login",
            None,
            &json!({"email": email, "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let access = login.data()["accessToken"].as_str().unwrap().to_owned();
    let first_refresh = login.data()["refreshToken"].as_str().unwrap().to_owned();

    let me = app.get("/api/users/me", Some(&access)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.data()["firstName"], json!("Ada"));

    let rotated = app
        .post(
            "/api/auth/refresh",
            None,
            &json!({"refreshToken": first_refresh}),
        )
        .await;
    assert_eq!(rotated.status, StatusCode::OK);
    let second_refresh = rotated.data()["refreshToken"].as_str().unwrap().to_owned();
    assert_ne!(second_refresh, first_refresh);

    let replayed = app
        .post(
            "/api/auth/refresh",
            None,
            &json!({"refreshToken": first_refresh}),
        )
        .await;
    assert_eq!(replayed.status, StatusCode::UNAUTHORIZED);

    let logout = app
        .post("/api/auth/logout", None, &json!({"refreshToken": second_refresh}))
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    let after_logout = app
        .post(
            "/api/auth/refresh",
            None,
            &json!({"refreshToken": second_refresh}),
        )
        .await;
    assert_eq!(after_logout.status, StatusCode::UNAUTHORIZED);
}
