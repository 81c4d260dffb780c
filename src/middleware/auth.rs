//! Bearer-token authentication middleware.
//!
//! Verifies the access token and stores a typed [`AuthContext`] in the
//! request extensions; handlers receive it through the [`AuthUser`]
//! extractor instead of re-parsing headers.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Role;
use crate::services::jwt::TokenKind;
use crate::AppState;

/// Identity claims of the verified access token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email_verified: bool,
    pub role: Role,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".to_string()))?;

    let claims = state
        .tokens
        .verify(token)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    if claims.kind != TokenKind::Access {
        return Err(AppError::Unauthorized("Invalid token type".to_string()));
    }

    let context = AuthContext {
        user_id: claims.sub,
        email_verified: claims.email_verified.unwrap_or(false),
        role: claims.role.unwrap_or(Role::Viewer),
    };
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Extractor for the [`AuthContext`] placed by [`auth_middleware`].
pub struct AuthUser(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "AuthContext missing; route not behind auth middleware"
                ))
            })
    }
}
