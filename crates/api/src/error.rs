use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use analytics_core::error::CoreError;
use analytics_db::StoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`StoreError`] for storage
/// failures. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `analytics_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A storage error.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => classify_core_error(core),

            // --- Storage errors ---
            AppError::Store(StoreError::NotFound { entity, id }) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} with id {id} not found"),
            ),
            AppError::Store(err) => {
                tracing::error!(error = %err, "Storage error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a domain error to an HTTP status, error code and message.
///
/// Structurally broken intake is a 400; well-formed intake that names an
/// unknown job or misses or violates parameters is a 406.
fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::MalformedRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        _ if core.is_not_acceptable() => (
            StatusCode::NOT_ACCEPTABLE,
            "NOT_ACCEPTABLE",
            core.to_string(),
        ),
        CoreError::QueueFull { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "QUEUE_FULL",
            core.to_string(),
        ),
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        _ => {
            tracing::error!(error = %core, "Internal core error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
