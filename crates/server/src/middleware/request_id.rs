//! Correlation ids for requests.
//!
//! An upstream `x-request-id` is kept when it looks sane; otherwise a fresh
//! UUIDv7 is minted, so ids sort by arrival time like every other id in the
//! service. The id lands in the `request_id` field of the trace span, as a
//! Sentry tag, and on the response.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// The upstream id, if it is short printable ASCII.
fn inbound_request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .filter(|id| id.bytes().all(|b| b.is_ascii_graphic()))
}

pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = inbound_request_id(request.headers())
        .map_or_else(|| Uuid::now_v7().to_string(), str::to_owned);

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::Request as HttpRequest, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_inbound_id_is_kept_when_sane() {
        assert_eq!(inbound_request_id(&headers(" abc-123 ")), Some("abc-123"));
    }

    #[test]
    fn test_inbound_id_is_dropped_when_odd() {
        assert_eq!(inbound_request_id(&HeaderMap::new()), None);
        assert_eq!(inbound_request_id(&headers("")), None);
        assert_eq!(inbound_request_id(&headers("two words")), None);
        assert_eq!(inbound_request_id(&headers(&"x".repeat(129))), None);
    }

    #[tokio::test]
    async fn test_response_carries_generated_id() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert_eq!(Uuid::parse_str(id).unwrap().get_version_num(), 7);
    }
}
