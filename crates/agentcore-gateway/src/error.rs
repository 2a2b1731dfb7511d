//! Maps `CoreError` (and gateway-local validation failures) to HTTP
//! responses. Every handler returns `Result<_, ApiError>` so a thrown error
//! always becomes a well-formed JSON response instead of a panic.

use agentcore_types::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// The error type every gateway handler returns on failure.
#[derive(Debug)]
pub enum ApiError {
    /// Request failed validation (missing/malformed field).
    BadRequest(String),
    /// Referenced id does not exist.
    NotFound(String),
    /// Operation is illegal given current state.
    Conflict(String),
    /// A downstream dependency failed transiently.
    BadGateway(String),
    /// Invariant violation.
    Internal(String),
    /// The core has not finished wiring persistence yet.
    ServiceUnavailable(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ApiError::BadRequest(msg),
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            CoreError::TransientExternal(msg) => ApiError::BadGateway(msg),
            CoreError::Fatal(msg) => ApiError::Internal(msg),
            CoreError::Initializing => ApiError::ServiceUnavailable("core is still initializing".into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
