//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Every error is rendered in
//! the standard envelope; server errors are captured to Sentry and their
//! details are never sent to the client.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use stockroom_core::ValidationErrors;
use stockroom_core::bundles::BundleRequestError;
use stockroom_core::catalog::{VariantBuildError, VariantUpdateError};
use stockroom_core::orders::OrderLineError;

use crate::db::RepositoryError;
use crate::response::{ApiResponse, ErrorDetail};
use crate::services::auth::AuthError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Field-level input problems, reported together.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request violates a business rule.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken(_) => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::MissingName(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server errors are reduced to a generic string.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Validation(_) => "Validation failed".to_string(),
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Auth(AuthError::Repository(RepositoryError::Conflict(msg))) => msg.clone(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::MissingName(field) => format!("{field} is required"),
                AuthError::InvalidToken(reason) => format!("Invalid token: {reason}"),
                _ => "Authentication error".to_string(),
            },
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::Database(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let message = self.public_message();
        let errors = match self {
            Self::Validation(errors) => errors
                .into_errors()
                .into_iter()
                .map(ErrorDetail::Field)
                .collect(),
            _ => vec![ErrorDetail::General {
                message: message.clone(),
            }],
        };

        ApiResponse::failure(status, message, errors).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// Engine error conversions
// =============================================================================

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<VariantBuildError> for AppError {
    fn from(err: VariantBuildError) -> Self {
        match err {
            VariantBuildError::Validation(errors) => Self::Validation(errors),
            VariantBuildError::Invariant(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<VariantUpdateError> for AppError {
    fn from(err: VariantUpdateError) -> Self {
        match err {
            VariantUpdateError::Validation(errors) => Self::Validation(errors),
            fatal => Self::Internal(fatal.to_string()),
        }
    }
}

impl From<BundleRequestError> for AppError {
    fn from(err: BundleRequestError) -> Self {
        Self::Validation(err.into_validation())
    }
}

impl From<OrderLineError> for AppError {
    fn from(err: OrderLineError) -> Self {
        if err.is_not_found() {
            Self::NotFound(err.to_string())
        } else {
            Self::BadRequest(err.to_string())
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(ValidationErrors::single("request", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Set the Sentry user context for the authenticated caller.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stockroom_core::{BundleId, ProductId};

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::Auth(AuthError::InvalidCredentials),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Auth(AuthError::UserAlreadyExists),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Database(RepositoryError::NotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Database(RepositoryError::Conflict("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_validation_errors_listed_by_field() {
        let mut errors = ValidationErrors::new();
        errors.push("variants[0].selections", "option 'Color' with value 'Red' does not exist");
        errors.push("variants[2].selections", "option 'Size' with value 'XL' does not exist");
        let (status, body) = body_json(AppError::Validation(errors)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["isSuccess"], false);
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
        assert_eq!(body["errors"][1]["field"], "variants[2].selections");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, body) = body_json(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(!body.to_string().contains("pool exhausted"));
    }

    #[test]
    fn test_order_errors_map_to_404_or_400() {
        let missing: AppError = OrderLineError::BundleNotFound(BundleId::generate()).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let short: AppError = OrderLineError::InsufficientProductStock {
            product_id: ProductId::generate(),
            requested: 2,
            available: 1,
        }
        .into();
        assert_eq!(short.status(), StatusCode::BAD_REQUEST);
        assert!(short.to_string().contains("Insufficient stock"));
    }

    #[test]
    fn test_bundle_request_error_uses_products_field() {
        let err: AppError = BundleRequestError::NoProducts.into();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.errors()[0].field, "request.products");
    }
}
