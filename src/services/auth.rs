//! Account lifecycle orchestration.
//!
//! Every operation here takes already-validated input, runs the flow
//! against the injected stores, and returns a domain outcome or a
//! `ServiceError`. HTTP concerns (envelopes, cookies, status codes) stay
//! in the handlers.
//!
//! One-time tokens (verification, reset, unlock) are written twice: a
//! per-user key holding the current token, which enforces a single
//! outstanding token per purpose, and a reverse key from token to user id
//! so presentation is a single lookup. Both carry the same TTL and are
//! deleted together on use.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::{HashingConfig, SecurityConfig};
use crate::models::{Organization, Role, TeamMembership, User};
use crate::models::organization::slugify;
use crate::services::cache::VolatileStore;
use crate::services::error::ServiceError;
use crate::services::guard::LoginGuard;
use crate::services::jwt::{TokenKind, TokenService};
use crate::services::mailer::Mailer;
use crate::services::store::{NewUser, UserStore};
use crate::utils::password::{hash_password, verify_password, Password, PasswordHashString};
use crate::utils::security::{
    account_unlock_key, email_verification_key, generate_secure_token, password_reset_key,
    refresh_token_key, reset_token_key, sanitize_input, unlock_token_key,
    validate_password_strength, verification_token_key,
};

#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub user: User,
    pub organization: Organization,
    pub tokens: SessionTokens,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: SessionTokens,
}

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub organization: Organization,
    pub teams: Vec<TeamMembership>,
}

#[derive(Debug, Clone, Copy)]
enum TokenPurpose {
    Verification,
    PasswordReset,
    Unlock,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn VolatileStore>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenService,
    guard: LoginGuard,
    security: SecurityConfig,
    hashing: HashingConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        cache: Arc<dyn VolatileStore>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenService,
        security: SecurityConfig,
        hashing: HashingConfig,
    ) -> Self {
        let guard = LoginGuard::new(cache.clone(), &security);
        Self {
            store,
            cache,
            mailer,
            tokens,
            guard,
            security,
            hashing,
        }
    }

    /// Create an organization and its first (admin) user, dispatch a
    /// verification email, and open a session.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        organization_name: &str,
    ) -> Result<RegisterOutcome, ServiceError> {
        if self
            .store
            .find_user_by_email(email)
            .await
            .map_err(ServiceError::Store)?
            .is_some()
        {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let strength = validate_password_strength(password);
        if !strength.is_valid {
            return Err(ServiceError::WeakPassword(strength.errors));
        }

        let organization_name = sanitize_input(organization_name.trim());
        let slug = slugify(&organization_name);
        if self
            .store
            .find_organization_by_slug(&slug)
            .await
            .map_err(ServiceError::Store)?
            .is_some()
        {
            return Err(ServiceError::OrganizationExists);
        }

        let organization = self
            .store
            .create_organization(&organization_name, &slug)
            .await
            .map_err(ServiceError::Store)?;

        let hash = hash_password(&Password::new(password.to_string()), &self.hashing)
            .map_err(ServiceError::Internal)?;

        let user = self
            .store
            .create_user(NewUser {
                email: email.to_string(),
                password_hash: hash.into_string(),
                first_name: sanitize_input(first_name.trim()),
                last_name: sanitize_input(last_name.trim()),
                role: Role::Admin,
                organization_id: organization.id,
                email_verified: false,
            })
            .await
            .map_err(ServiceError::Store)?;

        let verification = self.issue_token(TokenPurpose::Verification, user.id).await?;
        self.mailer
            .send_verification(&user.email, &verification)
            .await
            .map_err(ServiceError::Internal)?;

        let tokens = self.open_session(&user).await?;
        tracing::info!(user_id = %user.id, organization_id = %organization.id, "User registered");

        Ok(RegisterOutcome {
            user,
            organization,
            tokens,
        })
    }

    /// Authenticate credentials under the brute-force guard.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await
            .map_err(ServiceError::Store)?;

        if let Some(ref user) = user {
            if self
                .guard
                .is_locked(user.id)
                .await
                .map_err(ServiceError::Cache)?
            {
                let retry_after_secs = self
                    .guard
                    .lockout_remaining(user.id)
                    .await
                    .map_err(ServiceError::Cache)?;
                return Err(ServiceError::AccountLocked { retry_after_secs });
            }
        }

        let Some(user) = user else {
            return Err(self.register_failed_attempt(email, None).await?);
        };

        let password_ok = verify_password(
            &PasswordHashString::new(user.password_hash.clone()),
            &Password::new(password.to_string()),
        );
        if !password_ok {
            return Err(self.register_failed_attempt(email, Some(&user)).await?);
        }

        if !user.email_verified {
            return Err(ServiceError::EmailNotVerified);
        }

        self.guard
            .clear_attempts(email)
            .await
            .map_err(ServiceError::Cache)?;
        self.store
            .set_last_login(user.id, Utc::now())
            .await
            .map_err(ServiceError::Store)?;

        let tokens = self.open_session(&user).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome { user, tokens })
    }

    /// Consume a verification token and mark the owning account verified.
    pub async fn verify_email(&self, token: &str) -> Result<(), ServiceError> {
        let Some(user_id) = self.owner_of(TokenPurpose::Verification, token).await? else {
            return Err(ServiceError::InvalidVerificationToken);
        };

        // The account may have been removed while the token was live.
        if !self
            .store
            .set_email_verified(user_id)
            .await
            .map_err(ServiceError::Store)?
        {
            self.consume_token(TokenPurpose::Verification, user_id, token)
                .await?;
            return Err(ServiceError::InvalidVerificationToken);
        }

        self.consume_token(TokenPurpose::Verification, user_id, token)
            .await?;
        tracing::info!(user_id = %user_id, "Email verified");
        Ok(())
    }

    /// Issue a fresh verification token, invalidating any outstanding one.
    pub async fn resend_verification(&self, email: &str) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::UserNotFound)?;

        if user.email_verified {
            return Err(ServiceError::AlreadyVerified);
        }

        let token = self.issue_token(TokenPurpose::Verification, user.id).await?;
        self.mailer
            .send_verification(&user.email, &token)
            .await
            .map_err(ServiceError::Internal)?;
        Ok(())
    }

    /// Start a password reset. Succeeds identically whether or not the
    /// email is registered, to resist enumeration.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ServiceError> {
        match self
            .store
            .find_user_by_email(email)
            .await
            .map_err(ServiceError::Store)?
        {
            Some(user) => {
                let token = self.issue_token(TokenPurpose::PasswordReset, user.id).await?;
                self.mailer
                    .send_password_reset(&user.email, &token)
                    .await
                    .map_err(ServiceError::Internal)?;
            }
            None => {
                tracing::info!("Password reset requested for unknown email");
            }
        }
        Ok(())
    }

    /// Consume a reset token and set a new password. A successful reset
    /// also clears any lockout state, since the owner has proven control
    /// of the mailbox.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let strength = validate_password_strength(new_password);
        if !strength.is_valid {
            return Err(ServiceError::WeakPassword(strength.errors));
        }

        let Some(user_id) = self.owner_of(TokenPurpose::PasswordReset, token).await? else {
            return Err(ServiceError::InvalidResetToken);
        };

        let Some(user) = self
            .store
            .find_user_by_id(user_id)
            .await
            .map_err(ServiceError::Store)?
        else {
            self.consume_token(TokenPurpose::PasswordReset, user_id, token)
                .await?;
            return Err(ServiceError::InvalidResetToken);
        };

        let hash = hash_password(&Password::new(new_password.to_string()), &self.hashing)
            .map_err(ServiceError::Internal)?;
        self.store
            .set_password_hash(user.id, hash.as_str())
            .await
            .map_err(ServiceError::Store)?;

        self.consume_token(TokenPurpose::PasswordReset, user.id, token)
            .await?;
        self.clear_lockout_state(&user).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Clear a lockout early using the token dispatched when the lock was
    /// applied.
    pub async fn unlock_account(&self, email: &str, token: &str) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::UserNotFound)?;

        if !self
            .guard
            .is_locked(user.id)
            .await
            .map_err(ServiceError::Cache)?
        {
            return Err(ServiceError::AccountNotLocked);
        }

        let stored = self
            .cache
            .get(&account_unlock_key(user.id))
            .await
            .map_err(ServiceError::Cache)?;
        if stored.as_deref() != Some(token) {
            return Err(ServiceError::InvalidUnlockToken);
        }

        self.clear_lockout_state(&user).await?;
        tracing::info!(user_id = %user.id, "Account unlocked");
        Ok(())
    }

    /// Exchange a refresh token for a new access token. The presented
    /// token must be byte-equal to the mirror in the volatile store, so a
    /// token invalidated by a newer login (or by logout) is refused even
    /// while its signature is still valid.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String, ServiceError> {
        let token = refresh_token.ok_or(ServiceError::MissingRefreshToken)?;

        let claims = self
            .tokens
            .verify(token)
            .map_err(|_| ServiceError::InvalidRefreshToken)?;
        if claims.kind != TokenKind::Refresh {
            return Err(ServiceError::InvalidRefreshToken);
        }

        let mirror = self
            .cache
            .get(&refresh_token_key(claims.sub))
            .await
            .map_err(ServiceError::Cache)?;
        if mirror.as_deref() != Some(token) {
            return Err(ServiceError::InvalidRefreshToken);
        }

        let user = self
            .store
            .find_user_by_id(claims.sub)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::InvalidRefreshToken)?;

        self.tokens
            .sign_access(user.id, user.email_verified, user.role)
            .map_err(ServiceError::Internal)
    }

    /// Drop the refresh-token mirror, ending the session.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.cache
            .del(&refresh_token_key(user_id))
            .await
            .map_err(ServiceError::Cache)?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Load the authenticated user with organization and team context.
    pub async fn current_user(&self, user_id: Uuid) -> Result<CurrentUser, ServiceError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::UserNotFound)?;
        let organization = self
            .store
            .find_organization_by_id(user.organization_id)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::OrganizationNotFound)?;
        let teams = self
            .store
            .team_memberships(user.id)
            .await
            .map_err(ServiceError::Store)?;
        Ok(CurrentUser {
            user,
            organization,
            teams,
        })
    }

    /// Count a failed attempt and decide between the generic credential
    /// error and a lockout. Unknown emails are counted too, under the
    /// submitted address, so the response shape never reveals whether the
    /// account exists.
    async fn register_failed_attempt(
        &self,
        email: &str,
        user: Option<&User>,
    ) -> Result<ServiceError, ServiceError> {
        let count = self
            .guard
            .record_failure(email)
            .await
            .map_err(ServiceError::Cache)?;
        let max = self.guard.max_attempts();

        if count < max {
            return Ok(ServiceError::InvalidCredentials {
                remaining_attempts: Some(max - count),
            });
        }

        if let Some(user) = user {
            self.guard.lock(user.id).await.map_err(ServiceError::Cache)?;
            let token = self.issue_token(TokenPurpose::Unlock, user.id).await?;
            self.mailer
                .send_unlock(&user.email, &token)
                .await
                .map_err(ServiceError::Internal)?;
            tracing::warn!(user_id = %user.id, "Account locked after repeated failures");
        }

        Ok(ServiceError::AccountLocked {
            retry_after_secs: self.guard.lockout_seconds(),
        })
    }

    async fn open_session(&self, user: &User) -> Result<SessionTokens, ServiceError> {
        let access_token = self
            .tokens
            .sign_access(user.id, user.email_verified, user.role)
            .map_err(ServiceError::Internal)?;
        let refresh_token = self
            .tokens
            .sign_refresh(user.id)
            .map_err(ServiceError::Internal)?;

        // Newer logins overwrite the mirror, invalidating earlier refresh
        // tokens for the same user.
        self.cache
            .set_ex(
                &refresh_token_key(user.id),
                &refresh_token,
                self.tokens.refresh_ttl_seconds(),
            )
            .await
            .map_err(ServiceError::Cache)?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Remove lockout flag, attempt counter, and any outstanding unlock
    /// token for the user.
    async fn clear_lockout_state(&self, user: &User) -> Result<(), ServiceError> {
        self.guard
            .unlock(user.id)
            .await
            .map_err(ServiceError::Cache)?;
        self.guard
            .clear_attempts(&user.email)
            .await
            .map_err(ServiceError::Cache)?;
        if let Some(token) = self
            .cache
            .get(&account_unlock_key(user.id))
            .await
            .map_err(ServiceError::Cache)?
        {
            self.consume_token(TokenPurpose::Unlock, user.id, &token)
                .await?;
        }
        Ok(())
    }

    fn token_ttl_seconds(&self, purpose: TokenPurpose) -> u64 {
        match purpose {
            TokenPurpose::Verification => self.security.email_verification_expiry_hours * 3600,
            TokenPurpose::PasswordReset => self.security.password_reset_expiry_minutes * 60,
            // An unlock token is only useful while the lock holds.
            TokenPurpose::Unlock => self.security.account_lockout_duration_minutes * 60,
        }
    }

    fn user_key(purpose: TokenPurpose, user_id: Uuid) -> String {
        match purpose {
            TokenPurpose::Verification => email_verification_key(user_id),
            TokenPurpose::PasswordReset => password_reset_key(user_id),
            TokenPurpose::Unlock => account_unlock_key(user_id),
        }
    }

    fn token_key(purpose: TokenPurpose, token: &str) -> String {
        match purpose {
            TokenPurpose::Verification => verification_token_key(token),
            TokenPurpose::PasswordReset => reset_token_key(token),
            TokenPurpose::Unlock => unlock_token_key(token),
        }
    }

    /// Write a fresh one-time token under both keys, dropping the reverse
    /// entry of any token it replaces.
    async fn issue_token(
        &self,
        purpose: TokenPurpose,
        user_id: Uuid,
    ) -> Result<String, ServiceError> {
        let user_key = Self::user_key(purpose, user_id);
        if let Some(previous) = self
            .cache
            .get(&user_key)
            .await
            .map_err(ServiceError::Cache)?
        {
            self.cache
                .del(&Self::token_key(purpose, &previous))
                .await
                .map_err(ServiceError::Cache)?;
        }

        let token = generate_secure_token(32);
        let ttl = self.token_ttl_seconds(purpose);
        self.cache
            .set_ex(&user_key, &token, ttl)
            .await
            .map_err(ServiceError::Cache)?;
        self.cache
            .set_ex(&Self::token_key(purpose, &token), &user_id.to_string(), ttl)
            .await
            .map_err(ServiceError::Cache)?;
        Ok(token)
    }

    /// Resolve a presented token to its owner via the reverse index.
    async fn owner_of(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<Option<Uuid>, ServiceError> {
        let Some(raw) = self
            .cache
            .get(&Self::token_key(purpose, token))
            .await
            .map_err(ServiceError::Cache)?
        else {
            return Ok(None);
        };
        Ok(Uuid::parse_str(&raw).ok())
    }

    async fn consume_token(
        &self,
        purpose: TokenPurpose,
        user_id: Uuid,
        token: &str,
    ) -> Result<(), ServiceError> {
        self.cache
            .del(&Self::user_key(purpose, user_id))
            .await
            .map_err(ServiceError::Cache)?;
        self.cache
            .del(&Self::token_key(purpose, token))
            .await
            .map_err(ServiceError::Cache)?;
        Ok(())
    }
}
