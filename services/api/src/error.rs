//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant is rendered as an HTTP response.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use research_assistant_core::ports::PortError;
use serde_json::json;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request body failed validation. Each entry names a field.
    #[error("Invalid request data")]
    Validation(Vec<String>),

    /// An uploaded file was refused before it was stored.
    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    /// No text-generation provider credential is configured.
    #[error("OpenAI API key not configured")]
    ProviderNotConfigured,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request data", "details": details }),
            ),
            ApiError::UploadRejected(reason) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "error": format!("Upload rejected: {}", reason) }),
            ),
            ApiError::ProviderNotConfigured => {
                error!("Report generation requested without OPENAI_API_KEY");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "OpenAI API key not configured" }),
                )
            }
            ApiError::Port(PortError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, json!({ "error": what }))
            }
            ApiError::Port(PortError::InsufficientCredits { needed, remaining }) => {
                let message = PortError::InsufficientCredits { needed, remaining }.to_string();
                (
                    StatusCode::PAYMENT_REQUIRED,
                    json!({ "error": message, "needed": needed, "remaining": remaining }),
                )
            }
            ApiError::Port(PortError::Invalid(reason)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request data", "details": [reason] }),
            ),
            ApiError::Port(PortError::Unavailable(reason)) => {
                error!("Text generation provider failed: {}", reason);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Failed to generate research report" }),
                )
            }
            other => {
                error!("Internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
