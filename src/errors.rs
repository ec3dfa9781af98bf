use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Top-level application error.
/// Every variant renders as `{"error": "<message>"}` with a matching status code.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Database errors ──────────────────────────────────────────────────────
    #[error("Database query failed: {message}")]
    DatabaseQueryFailed {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    // ── API key validation ───────────────────────────────────────────────────
    #[error("Provider and API key are required")]
    KeyFieldsRequired,

    #[error("At least one model must be specified")]
    NoModels,

    #[error("Failed to validate API key: {message}")]
    KeyValidationFailed { message: String },

    #[error("Model \"{model}\" not found for provider \"{provider}\". Please check the model name.")]
    ModelNotFound { provider: String, model: String },

    #[error("Provider not found")]
    ProviderNotFound,

    // ── Chat validation ──────────────────────────────────────────────────────
    #[error("Message, model_provider, and model_name are required")]
    MessageFieldsRequired,

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    #[error("No API key configured for {provider}")]
    ProviderNotConfigured { provider: String },

    #[error("Model \"{model}\" not configured for provider \"{provider}\"")]
    ModelNotConfigured { provider: String, model: String },

    #[error("Chat session not found")]
    SessionNotFound { id: String },

    // ── Provider errors ──────────────────────────────────────────────────────
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Failed to generate response: {message}")]
    InferenceError { message: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn db_query(message: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::DatabaseQueryFailed { message: message.into(), source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::SessionNotFound { .. } | AppError::ProviderNotFound)
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::KeyFieldsRequired
                | AppError::NoModels
                | AppError::KeyValidationFailed { .. }
                | AppError::ModelNotFound { .. }
                | AppError::MessageFieldsRequired
                | AppError::FieldTooLong { .. }
                | AppError::ProviderNotConfigured { .. }
                | AppError::ModelNotConfigured { .. }
                | AppError::UnsupportedProvider(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
