//! JSON extraction with schema validation.
//!
//! Shape violations are converted into `AppError::Validation` carrying
//! per-field messages, so handlers branch on an explicit error variant
//! rather than inspecting a library error type.

use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, FieldError};

pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;

        value.validate().map_err(validation_failure)?;
        Ok(ValidatedJson(value))
    }
}

/// Flatten `validator` errors into the envelope's field-level details.
pub fn validation_failure(errors: ValidationErrors) -> AppError {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {field}"));
                FieldError::new(field, message)
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    AppError::Validation(fields)
}
