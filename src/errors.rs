use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Generic body for every 5xx; internal detail only goes to the log.
pub const INTERNAL_ERROR_BODY: &str = "An error occurred while processing your request!";

/// Top-level application error. Each variant maps to exactly one HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Request errors ───────────────────────────────────────────────────────
    #[error("Unauthorized!")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidPayload(String),

    // ── Database errors ──────────────────────────────────────────────────────
    #[error("Database query failed: {message}")]
    DatabaseQueryFailed {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Stored record '{id}' is malformed: {message}")]
    CorruptRecord { id: String, message: String },

    // ── Model errors ─────────────────────────────────────────────────────────
    #[error(transparent)]
    Generation(#[from] GenerationError),

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn db_query(message: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::DatabaseQueryFailed { message: message.into(), source }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        AppError::InvalidPayload(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
            return (status, INTERNAL_ERROR_BODY).into_response();
        }
        (status, self.to_string()).into_response()
    }
}

/// Failures of the hosted model capability.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Model service unavailable at {host}")]
    Unavailable { host: String },

    #[error("Model '{model_name}' not found")]
    ModelNotFound { model_name: String },

    #[error("Inference error: {message}")]
    Inference { message: String },

    #[error("Model output for '{target}' did not match its schema: {message}")]
    SchemaMismatch { target: String, message: String },
}

/// Failures raised while dispatching a model-requested tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("Invalid arguments for tool '{name}': {message}")]
    InvalidArguments { name: String, message: String },

    #[error("Tool '{name}' failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: GenerationError,
    },
}

/// Start-up configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable '{0}' must be set")]
    Missing(&'static str),

    #[error("Environment variable '{name}' has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_hide_internal_detail() {
        let err = AppError::Unexpected("connection pool exhausted".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn request_errors_map_to_client_statuses() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::not_found("Not Found!").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::invalid_payload("Invalid update payload!").status(),
            StatusCode::BAD_REQUEST
        );
        let generation = AppError::from(GenerationError::Inference { message: "boom".into() });
        assert_eq!(generation.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
