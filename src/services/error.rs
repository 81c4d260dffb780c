//! Service-level outcomes, mapped onto the HTTP error taxonomy at the
//! handler boundary.

use thiserror::Error;

use crate::error::{AppError, FieldError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User with this email already exists")]
    EmailAlreadyRegistered,

    #[error("Organization with this name already exists")]
    OrganizationExists,

    #[error("Password does not meet requirements")]
    WeakPassword(Vec<String>),

    #[error("Invalid email or password")]
    InvalidCredentials { remaining_attempts: Option<u32> },

    #[error("Account temporarily locked due to too many failed login attempts")]
    AccountLocked { retry_after_secs: u64 },

    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Invalid unlock token")]
    InvalidUnlockToken,

    #[error("Account is not locked")]
    AccountNotLocked,

    #[error("Refresh token not found")]
    MissingRefreshToken,

    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Persistent store error")]
    Store(#[source] anyhow::Error),

    #[error("Volatile store error")]
    Cache(#[source] anyhow::Error),

    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::EmailAlreadyRegistered | ServiceError::OrganizationExists => {
                AppError::Conflict(err.to_string())
            }
            ServiceError::WeakPassword(messages) => AppError::Validation(
                messages
                    .into_iter()
                    .map(|m| FieldError::new("password", m))
                    .collect(),
            ),
            ServiceError::InvalidCredentials { remaining_attempts } => {
                AppError::InvalidCredentials { remaining_attempts }
            }
            ServiceError::AccountLocked { retry_after_secs } => {
                AppError::AccountLocked { retry_after_secs }
            }
            ServiceError::EmailNotVerified => AppError::EmailNotVerified,
            ServiceError::AlreadyVerified
            | ServiceError::InvalidVerificationToken
            | ServiceError::InvalidResetToken
            | ServiceError::InvalidUnlockToken
            | ServiceError::AccountNotLocked => AppError::BadRequest(err.to_string()),
            ServiceError::MissingRefreshToken | ServiceError::InvalidRefreshToken => {
                AppError::Unauthorized(err.to_string())
            }
            ServiceError::UserNotFound => AppError::NotFound("User".to_string()),
            ServiceError::OrganizationNotFound => AppError::NotFound("Organization".to_string()),
            ServiceError::Store(e) => AppError::Database(e),
            ServiceError::Cache(e) => AppError::Cache(e),
            ServiceError::Internal(e) => AppError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_password_maps_to_field_errors() {
        let err = ServiceError::WeakPassword(vec![
            "Password must be at least 8 characters long".to_string(),
            "Password must contain at least one number".to_string(),
        ]);
        let AppError::Validation(fields) = AppError::from(err) else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.field == "password"));
    }

    #[test]
    fn conflict_messages_are_preserved() {
        let err = AppError::from(ServiceError::EmailAlreadyRegistered);
        assert_eq!(err.to_string(), "User with this email already exists");
    }
}
