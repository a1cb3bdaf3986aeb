use crate::services::orchestrator::{CatalogOpError, CreateError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

const GENERIC_FAILURE: &str = "Internal Server Error";

/// An HTTP-facing error: status, a stable machine-readable code, and a
/// message safe to show the client. Store details stay in the logs.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    /// Shortcut for a 500 with the generic message and a failure-class code
    pub fn internal(code: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, GENERIC_FAILURE)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "code": self.code,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Render an error with its whole `source()` chain for logging.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

impl From<CreateError> for AppError {
    fn from(err: CreateError) -> Self {
        match &err {
            CreateError::NoAttachment => AppError::bad_request("No image uploaded"),
            CreateError::UnsupportedMediaType(reason) => AppError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                format!("Error: Image only ({reason})"),
            ),
            CreateError::BlobWrite { .. } => {
                tracing::error!(error = %error_chain(&err), "upload error");
                AppError::internal("BLOB_WRITE_ERROR")
            }
            CreateError::CatalogWrite { orphaned_blob, .. } => {
                tracing::error!(
                    error = %error_chain(&err),
                    orphaned_blob = ?orphaned_blob,
                    "upload error"
                );
                AppError::internal("CATALOG_WRITE_ERROR")
            }
            CreateError::DeadlineExceeded { orphaned_blob, .. } => {
                tracing::error!(error = %err, orphaned_blob = ?orphaned_blob, "upload error");
                AppError::new(
                    StatusCode::GATEWAY_TIMEOUT,
                    "DEADLINE_EXCEEDED",
                    GENERIC_FAILURE,
                )
            }
        }
    }
}

impl From<CatalogOpError> for AppError {
    fn from(err: CatalogOpError) -> Self {
        tracing::error!(error = %error_chain(&err), "catalog error");
        match err {
            CatalogOpError::Store(_) => AppError::internal("LIST_ERROR"),
            CatalogOpError::DeadlineExceeded => AppError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "DEADLINE_EXCEEDED",
                GENERIC_FAILURE,
            ),
        }
    }
}
