//! The JSON envelope every endpoint answers with.
//!
//! ```json
//! { "status": 200, "message": "...", "isSuccess": true, "data": { ... } }
//! { "status": 400, "message": "...", "isSuccess": false, "errors": [{ "field": "...", "error": "..." }] }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use stockroom_core::FieldError;

/// One entry of the `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Field(FieldError),
    General { message: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: u16,
    pub message: String,
    pub is_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorDetail>>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with `data`.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::success(StatusCode::OK, message, data)
    }

    /// 201 with `data`.
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::success(StatusCode::CREATED, message, data)
    }

    fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            is_success: true,
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiResponse<()> {
    /// 200 with a message and no `data`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            is_success: true,
            data: None,
            errors: None,
        }
    }

    /// A failure envelope with no `data`.
    pub fn failure(status: StatusCode, message: impl Into<String>, errors: Vec<ErrorDetail>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            is_success: false,
            data: None,
            errors: Some(errors),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
