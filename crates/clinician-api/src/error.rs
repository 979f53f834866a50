//! API error types and the JSON error envelope.
//!
//! Every failing endpoint answers with `{error, message}` where `error` is a
//! machine-readable code and `message` is safe to show in the chat UI.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use clinician_chat::ChatError;
use clinician_core::error::ClinicianError;

/// Shown when the record store cannot be reached; the cause is logged only.
pub const STORE_UNAVAILABLE_MESSAGE: &str =
    "The patient records service is currently unavailable. Please try again later.";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - assistant disabled or record store down.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::ConversationNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::Disabled => {
                ApiError::ServiceUnavailable("The assistant is disabled.".to_string())
            }
            ChatError::StoreUnavailable(cause) => {
                tracing::warn!(cause = %cause, "Record store unavailable");
                ApiError::ServiceUnavailable(STORE_UNAVAILABLE_MESSAGE.to_string())
            }
            ChatError::Storage(cause) => {
                tracing::error!(cause = %cause, "Conversation storage failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<ClinicianError> for ApiError {
    fn from(err: ClinicianError) -> Self {
        ChatError::from(err).into()
    }
}
