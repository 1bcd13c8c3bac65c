use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::calls::CallError;
use crate::mailer::MailError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// A provider credential is missing. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Mail, call or classifier provider failure. `details` is returned to the
    /// client for operator debugging.
    #[error("{provider} error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
        details: Value,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CallError> for AppError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::InvalidRequest(msg) => AppError::Validation(msg),
            CallError::NotConfigured(name) => {
                AppError::Config(format!("Server is missing call provider setting {name}"))
            }
            CallError::MissingCallId { raw } => AppError::Upstream {
                provider: "call provider",
                message: "Call provider did not return a call id".to_string(),
                details: raw,
            },
            other => AppError::Upstream {
                provider: "call provider",
                message: "Failed to create call".to_string(),
                details: Value::String(other.to_string()),
            },
        }
    }
}

/// Malformed, mistyped or non-JSON request bodies are client errors like any
/// other missing field.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MailError> for AppError {
    fn from(e: MailError) -> Self {
        match e {
            MailError::NotConfigured(name) => {
                AppError::Config(format!("Server is missing mail provider setting {name}"))
            }
            other => AppError::Upstream {
                provider: "mail provider",
                message: "Failed to send email".to_string(),
                details: Value::String(other.to_string()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
                None,
            ),
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", msg, None)
            }
            AppError::Upstream {
                provider,
                message,
                details,
            } => {
                tracing::error!("{provider} error: {message}: {details}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_ERROR",
                    message,
                    Some(details),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
