//! Password recovery and account unlock endpoints.

use axum::{extract::State, Json};

use crate::dtos::auth::{
    ForgotPasswordRequest, MessageResponse, ResetPasswordRequest, UnlockAccountRequest,
};
use crate::dtos::ApiResponse;
use crate::error::AppError;
use crate::utils::ValidatedJson;
use crate::AppState;

/// The response is identical whether or not the email is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.auth.forgot_password(&req.email).await?;
    Ok(ApiResponse::ok(MessageResponse {
        message: "If an account exists with this email, a password reset link will be sent"
            .to_string(),
    }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.auth.reset_password(&req.token, &req.password).await?;
    Ok(ApiResponse::ok(MessageResponse {
        message: "Password reset successfully".to_string(),
    }))
}

pub async fn unlock_account(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<UnlockAccountRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state
        .auth
        .unlock_account(&req.email, &req.unlock_token)
        .await?;
    Ok(ApiResponse::ok(MessageResponse {
        message: "Account unlocked successfully".to_string(),
    }))
}
