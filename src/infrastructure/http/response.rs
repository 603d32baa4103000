//! Response envelope (§6): `{status: "success"|"error", message?, ...data}`.

use crate::domain::errors::{AppError, AuthError, PersistenceError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: Value,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self { status: "success", message: None, data }
    }

    pub fn ok_empty() -> Self {
        Self::ok(json!({}))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "error", message: Some(message.into()), data: json!({}) }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let code = if self.status == "success" { StatusCode::OK } else { StatusCode::BAD_REQUEST };
        (code, Json(self)).into_response()
    }
}

/// Maps the taxonomy of §7 to the status codes of §6. Request handlers
/// never leak internals — `Internal` collapses to a generic 500 message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Auth(e) => match e {
                AuthError::MissingKey => (StatusCode::UNAUTHORIZED, e.to_string()),
                AuthError::InvalidKey | AuthError::AccountMismatch => (StatusCode::FORBIDDEN, e.to_string()),
            },
            AppError::Persistence(e) => match e {
                PersistenceError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                PersistenceError::Conflict(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                PersistenceError::Database(_) => {
                    tracing::error!("persistence error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
                }
            },
            AppError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (code, Json(ApiResponse::error(message))).into_response()
    }
}
