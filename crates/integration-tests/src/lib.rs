//! Integration test harness for Stockroom.
//!
//! Requests are driven through the real router in-process with
//! `tower::ServiceExt::oneshot`; no listening socket is needed.
//!
//! # Running Tests
//!
//! ```bash
//! # Tests that never reach the database
//! cargo test -p stockroom-integration-tests
//!
//! # Full flows against PostgreSQL (migrations are applied automatically)
//! DATABASE_URL=postgres://localhost/stockroom_test \
//!     cargo test -p stockroom-integration-tests -- --ignored
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use stockroom_core::identity::User;
use stockroom_core::{Email, Role};
use stockroom_server::config::{AuthConfig, LogFormat, ServerConfig};
use stockroom_server::db::UserRepository;
use stockroom_server::services::auth::{Argon2Hasher, PasswordHasher};
use stockroom_server::state::AppState;

/// Nothing listens here, so any query fails fast.
const UNREACHABLE_DATABASE_URL: &str = "postgres://stockroom@127.0.0.1:1/stockroom";

/// Password given to every account created by [`TestApp::create_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

#[must_use]
pub fn test_config(database_url: &str) -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from(database_url),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        db_max_connections: 5,
        request_timeout: Duration::from_secs(10),
        auth: AuthConfig {
            jwt_secret: SecretString::from("Qm7#vR2!kP9@wX4$zL8^nB3&hT6*cD1%"),
            issuer: "stockroom-test".to_owned(),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(3600),
        },
        log_format: LogFormat::Text,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    /// The JSON envelope, or the raw body as a string when it is not JSON.
    pub body: Value,
}

impl TestResponse {
    /// `data` of the envelope.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// Fields named in the `errors` list.
    #[must_use]
    pub fn error_fields(&self) -> Vec<&str> {
        self.body["errors"]
            .as_array()
            .map(|errors| errors.iter().filter_map(|e| e["field"].as_str()).collect())
            .unwrap_or_default()
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    next_client: AtomicU32,
}

impl TestApp {
    /// App whose pool points at a closed port. Only for requests that must
    /// be answered without touching the database.
    #[must_use]
    pub fn without_database() -> Self {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(2))
            .connect_lazy(UNREACHABLE_DATABASE_URL)
            .unwrap();
        Self::with_pool(test_config(UNREACHABLE_DATABASE_URL), pool)
    }

    /// App backed by `DATABASE_URL`, with migrations applied.
    pub async fn with_database() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("../server/migrations").run(&pool).await.unwrap();
        Self::with_pool(test_config(&url), pool)
    }

    fn with_pool(config: ServerConfig, pool: PgPool) -> Self {
        let state = AppState::new(config, pool).unwrap();
        let router = stockroom_server::app(state.clone());
        Self {
            state,
            router,
            next_client: AtomicU32::new(1),
        }
    }

    /// Access token for an account that only exists in the token.
    #[must_use]
    pub fn token_for(&self, role: Role) -> String {
        let email = Email::parse(&format!("{role}-{}@shop.example", uuid::Uuid::new_v4())).unwrap();
        let user = User::new(email, String::new(), "Test", "Caller", role);
        self.state.tokens().issue_access(&user, Utc::now()).unwrap()
    }

    /// Insert an account and return it with an access token.
    pub async fn create_user(&self, role: Role) -> (User, String) {
        let email = Email::parse(&format!("{role}-{}@shop.example", uuid::Uuid::new_v4())).unwrap();
        let hash = Argon2Hasher.hash(TEST_PASSWORD).unwrap();
        let user = User::new(email, hash, "Test", "Caller", role);
        UserRepository::new(self.state.pool()).create(&user).await.unwrap();
        let token = self.state.tokens().issue_access(&user, Utc::now()).unwrap();
        (user, token)
    }

    /// Send a request through the router from a fresh client address, so
    /// the auth rate limiter never sees two requests from the same client.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> TestResponse {
        let client = Ipv4Addr::from(0x0a00_0000 | self.next_client.fetch_add(1, Ordering::Relaxed));
        self.send_from(client, method, uri, token, body).await
    }

    /// Send a request through the router as `client`.
    ///
    /// The address goes in `x-forwarded-for`, since oneshot requests carry
    /// no socket address.
    pub async fn send_from(
        &self,
        client: Ipv4Addr,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", client.to_string());
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse {
            status,
            request_id,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }
}

/// A name no other test run will use.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix} {}", uuid::Uuid::new_v4().simple())
}
