use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{
    JsonRejection, PathRejection, QueryRejection,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chirp_engine::EngineError;
use thiserror::Error;

/// Message returned for every authentication failure, whether the token is
/// missing, malformed or expired.
pub const SESSION_ENDED: &str = "Session ended :(";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session ended :(")]
    Unauthenticated,

    #[error("Invalid login")]
    InvalidLogin,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Upload too large: {size} bytes (max {max})")]
    UploadTooLarge { size: usize, max: usize },

    /// The request body hit the router's body limit before it was read in full.
    #[error("Request body too large: {0}")]
    BodyTooLarge(String),

    /// One of two dependent writes succeeded and could not be rolled back.
    #[error("Partial write: {0}")]
    PartialWrite(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(what) => ApiError::NotFound(what.to_string()),
            EngineError::Validation(msg) => ApiError::Validation(msg),
            EngineError::Forbidden(msg) => ApiError::Forbidden(msg),
            EngineError::Store(err) => ApiError::Internal(err.to_string()),
        }
    }
}

/// Map a rejected body or request part onto the error envelope, keeping the
/// 413 of an overlong body.
fn rejection(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BodyTooLarge(text)
    } else {
        ApiError::Validation(text)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        rejection(e.status(), e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        rejection(e.status(), e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        rejection(e.status(), e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        rejection(e.status(), e.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        rejection(e.status(), format!("Multipart error: {}", e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, SESSION_ENDED.to_string()),
            ApiError::InvalidLogin => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::UploadTooLarge { .. } | ApiError::BodyTooLarge(_) => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ApiError::PartialWrite(detail) => {
                tracing::error!(detail = %detail, "partial write");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Partial write: the request was only partly applied".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "status": "error",
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
