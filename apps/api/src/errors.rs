use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors a report assembly can end with.
///
/// Missing fonts, missing or broken images, and unresolved placeholders are
/// not errors: the engine logs them and degrades. Only these abort a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report assembly was cancelled")]
    Cancelled,

    #[error("failed to write report to {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid destination: {0}")]
    InvalidDestination(String),
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Multipart error: {0}")]
    Multipart(String),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        AppError::Multipart(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Multipart(msg) => (StatusCode::BAD_REQUEST, "MULTIPART_ERROR", msg.clone()),
            AppError::Report(ReportError::Cancelled) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CANCELLED",
                "Report assembly was cancelled".to_string(),
            ),
            AppError::Report(ReportError::InvalidDestination(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Report(e @ ReportError::Sink { .. }) => {
                tracing::error!("Report output failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "OUTPUT_ERROR",
                    "The report could not be written to its destination".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
