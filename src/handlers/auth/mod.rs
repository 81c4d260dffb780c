//! HTTP layer for the auth endpoints. Handlers stay thin: extract,
//! delegate to `AuthService`, shape the envelope and cookies.

pub mod password;
pub mod registration;
pub mod session;

pub use password::{forgot_password, reset_password, unlock_account};
pub use registration::{register, resend_verification, verify_email};
pub use session::{login, logout, me, refresh};

use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::{AppConfig, Environment};

pub(crate) const REFRESH_COOKIE: &str = "refresh_token";

/// Refresh tokens travel only in an httpOnly cookie scoped to the auth
/// routes; script code never sees them.
pub(crate) fn refresh_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path("/auth")
        .http_only(true)
        .secure(config.environment == Environment::Prod)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(config.jwt.refresh_token_expiry_days))
        .build()
}

pub(crate) fn clear_refresh_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .path("/auth")
        .http_only(true)
        .max_age(time::Duration::ZERO)
        .build()
}
