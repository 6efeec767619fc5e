//! Domain error types for the image pipeline.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::queue::QueueError;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data; the message is returned to the caller as-is
    #[error("{0}")]
    InvalidInput(String),

    /// Upload exceeded the configured size limit
    #[error("file exceeds maximum upload size of {0} bytes")]
    PayloadTooLarge(usize),

    /// Filesystem operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Publishing to the message queue failed
    #[error("Queue error: {0}")]
    Queue(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, response_message) = match self {
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "internal database error".to_string(),
                )
            }
            AppError::NotFound(_) => (actix_web::http::StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidInput(_) => {
                (actix_web::http::StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::PayloadTooLarge(_) => (
                actix_web::http::StatusCode::PAYLOAD_TOO_LARGE,
                self.to_string(),
            ),
            AppError::Storage(err_str) => {
                tracing::error!("Storage error: {}", err_str);
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to save file".to_string(),
                )
            }
            AppError::Queue(err_str) => {
                tracing::error!("Queue error: {}", err_str);
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to start image processing".to_string(),
                )
            }
        };

        HttpResponse::build(status).json(ErrorResponse::new(response_message))
    }
}

/// Error response body matching OpenAPI schema.
#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Always "Error"
    pub status: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: "Error".to_string(),
            error: error.into(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.error)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::Queue(err.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(_: uuid::Error) -> Self {
        AppError::InvalidInput("invalid image ID".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;

    async fn body_of(err: AppError) -> (StatusCode, ErrorResponse) {
        let resp = err.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_rt::test]
    async fn test_not_found_maps_to_404() {
        let (status, body) = body_of(AppError::NotFound("image".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.status, "Error");
        assert_eq!(body.error, "image not found");
    }

    #[actix_rt::test]
    async fn test_database_error_hides_detail() {
        let (status, body) =
            body_of(AppError::Database("connection refused".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.contains("connection refused"));
    }

    #[actix_rt::test]
    async fn test_queue_error_reports_processing_start_failure() {
        let (status, body) = body_of(AppError::from(QueueError::Closed)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "failed to start image processing");
    }

    #[test]
    fn test_uuid_error_is_invalid_image_id() {
        let err: AppError = uuid::Uuid::parse_str("not-a-uuid").unwrap_err().into();
        assert_eq!(err.to_string(), "invalid image ID");
    }
}
