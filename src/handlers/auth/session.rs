//! Login, session refresh, logout, and the current-user endpoint.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::CookieJar;

use crate::dtos::auth::{LoginRequest, LoginResponse, MeResponse, RefreshResponse};
use crate::dtos::ApiResponse;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::jwt::TokenKind;
use crate::utils::ValidatedJson;
use crate::AppState;

use super::{clear_refresh_cookie, refresh_cookie, REFRESH_COOKIE};

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), AppError> {
    let outcome = state.auth.login(&req.email, &req.password).await?;

    let jar = jar.add(refresh_cookie(
        outcome.tokens.refresh_token,
        &state.config,
    ));
    let body = ApiResponse::ok(LoginResponse {
        user: outcome.user.sanitized(),
        access_token: outcome.tokens.access_token,
    });
    Ok((jar, body))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<ApiResponse<RefreshResponse>>, AppError> {
    let token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let access_token = state.auth.refresh(token.as_deref()).await?;
    Ok(ApiResponse::ok(RefreshResponse { access_token }))
}

/// Always ends the session from the client's point of view: the cookie is
/// cleared and 204 returned no matter what. The bearer token is verified
/// best-effort only to know which mirror to drop; a missing or invalid
/// token skips the cleanup, it never errors outward.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    let claims = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.tokens.verify(token).ok())
        .filter(|claims| claims.kind == TokenKind::Access);

    if let Some(claims) = claims {
        if let Err(err) = state.auth.logout(claims.sub).await {
            tracing::warn!(error = %err, user_id = %claims.sub, "Logout cleanup failed");
        }
    }

    (jar.add(clear_refresh_cookie()), StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<ApiResponse<MeResponse>>, AppError> {
    let current = state.auth.current_user(ctx.user_id).await?;
    Ok(ApiResponse::ok(MeResponse {
        user: current.user.sanitized(),
        last_login_at: current.user.last_login_at,
        organization: current.organization.sanitized(),
        teams: current.teams,
    }))
}
