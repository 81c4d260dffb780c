//! Registration and email verification endpoints.

use axum::{extract::State, Json};
use axum_extra::extract::CookieJar;

use crate::dtos::auth::{
    MessageResponse, RegisterRequest, RegisterResponse, ResendVerificationRequest,
    VerifyEmailRequest,
};
use crate::dtos::ApiResponse;
use crate::error::AppError;
use crate::utils::ValidatedJson;
use crate::AppState;

use super::refresh_cookie;

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(CookieJar, Json<ApiResponse<RegisterResponse>>), AppError> {
    let outcome = state
        .auth
        .register(
            &req.email,
            &req.password,
            &req.first_name,
            &req.last_name,
            &req.organization_name,
        )
        .await?;

    let jar = jar.add(refresh_cookie(
        outcome.tokens.refresh_token,
        &state.config,
    ));
    let body = ApiResponse::ok(RegisterResponse {
        user: outcome.user.sanitized(),
        organization: outcome.organization.sanitized(),
        access_token: outcome.tokens.access_token,
        message: "Registration successful. Please check your email to verify your account."
            .to_string(),
    });
    Ok((jar, body))
}

pub async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.auth.verify_email(&req.token).await?;
    Ok(ApiResponse::ok(MessageResponse {
        message: "Email verified successfully".to_string(),
    }))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResendVerificationRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.auth.resend_verification(&req.email).await?;
    Ok(ApiResponse::ok(MessageResponse {
        message: "Verification email sent".to_string(),
    }))
}
