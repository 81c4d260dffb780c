//! Application error taxonomy and HTTP rendering.
//!
//! Every error leaving the service is rendered as the shared envelope
//! `{"success": false, "error": {"code", "message", "details"?}}` with a
//! stable `code` the frontend can branch on. Internal causes (database,
//! cache, crypto) are logged with context and collapsed into a generic
//! `INTERNAL_ERROR` so no store or library text reaches the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// One field-level validation failure, reported alongside its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input data")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Generic credential failure. The message is identical for unknown
    /// emails and wrong passwords to resist account enumeration.
    #[error("Invalid email or password")]
    InvalidCredentials {
        remaining_attempts: Option<u32>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Account temporarily locked due to too many failed login attempts")]
    AccountLocked {
        retry_after_secs: u64,
    },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error")]
    Database(#[source] anyhow::Error),

    #[error("Cache error")]
    Cache(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(anyhow::Error::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(anyhow::Error::new(err))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Cache(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized("Invalid or expired token".to_string())
    }
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) | AppError::InvalidCredentials { .. } => "AUTH_INVALID",
            AppError::Forbidden(_) | AppError::EmailNotVerified => "PERMISSION_DENIED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::AccountLocked { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Config(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidCredentials { .. } => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) | AppError::EmailNotVerified => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::AccountLocked { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Validation(errors) => Some(json!(errors)),
            AppError::InvalidCredentials {
                remaining_attempts: Some(n),
            } => Some(json!([{ "remainingAttempts": n }])),
            AppError::EmailNotVerified => Some(json!([{ "emailVerified": false }])),
            AppError::AccountLocked { retry_after_secs } => {
                Some(json!([{ "lockoutRemainingMinutes": retry_after_secs.div_ceil(60) }]))
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(err) | AppError::Config(err) => {
                tracing::error!(error = %err, "Internal error");
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "Persistent store error");
            }
            AppError::Cache(err) => {
                tracing::error!(error = %err, "Volatile store error");
            }
            _ => {}
        }

        let retry_after = match &self {
            AppError::AccountLocked { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
                details: self.details(),
            },
        };

        let mut res = (self.status(), Json(body)).into_response();
        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_share_one_message() {
        let unknown = AppError::InvalidCredentials {
            remaining_attempts: None,
        };
        let wrong = AppError::InvalidCredentials {
            remaining_attempts: Some(3),
        };
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.to_string(), "Invalid email or password");
    }

    #[test]
    fn lockout_reports_remaining_minutes() {
        let err = AppError::AccountLocked {
            retry_after_secs: 90,
        };
        assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(
            err.details().unwrap(),
            json!([{ "lockoutRemainingMinutes": 2 }])
        );
    }
}
