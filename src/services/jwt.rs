//! Access and refresh token signing and verification.
//!
//! Both token kinds are HS256 JWTs signed with the same secret and
//! distinguished by a `type` claim, so a refresh token can never pass
//! where an access token is required and vice versa.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Unique per issuance, so two tokens minted in the same second for
    /// the same subject never compare equal.
    pub jti: Uuid,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Present on access tokens only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// Present on access tokens only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_expiry: Duration,
    refresh_expiry: Duration,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_expiry: Duration::minutes(config.access_token_expiry_minutes),
            refresh_expiry: Duration::days(config.refresh_token_expiry_days),
        }
    }

    pub fn sign_access(
        &self,
        user_id: Uuid,
        email_verified: bool,
        role: Role,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            kind: TokenKind::Access,
            email_verified: Some(email_verified),
            role: Some(role),
            iat: now.timestamp(),
            exp: (now + self.access_expiry).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to sign access token: {}", e))
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            kind: TokenKind::Refresh,
            email_verified: None,
            role: None,
            iat: now.timestamp(),
            exp: (now + self.refresh_expiry).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to sign refresh token: {}", e))
    }

    /// Verify signature and expiry. Callers check the `kind` claim
    /// themselves, since which kind is acceptable depends on the endpoint.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }

    /// Refresh lifetime in seconds, used for the volatile-store mirror.
    pub fn refresh_ttl_seconds(&self) -> u64 {
        self.refresh_expiry.num_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&JwtConfig {
            secret: "a-test-secret-that-is-long-enough!!".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        })
    }

    #[test]
    fn access_token_round_trips() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc.sign_access(user_id, true, Role::Manager).unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.email_verified, Some(true));
        assert_eq!(claims.role, Some(Role::Manager));
    }

    #[test]
    fn refresh_token_carries_only_identity() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc.sign_refresh(user_id).unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.email_verified, None);
        assert_eq!(claims.role, None);
    }

    #[test]
    fn consecutive_tokens_for_one_subject_are_distinct() {
        let svc = service();
        let user_id = Uuid::new_v4();
        assert_ne!(
            svc.sign_refresh(user_id).unwrap(),
            svc.sign_refresh(user_id).unwrap()
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let mut token = svc.sign_access(Uuid::new_v4(), true, Role::Admin).unwrap();
        token.push('x');
        assert!(svc.verify(&token).is_err());
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let svc = service();
        let other = TokenService::new(&JwtConfig {
            secret: "a-different-secret-also-long-enough".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        });
        let token = other.sign_access(Uuid::new_v4(), true, Role::Admin).unwrap();
        assert!(svc.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        let now = Utc::now();
        // Expired well past the default validation leeway.
        let claims = Claims {
            sub: Uuid::new_v4(),
            jti: Uuid::new_v4(),
            kind: TokenKind::Access,
            email_verified: Some(true),
            role: Some(Role::Admin),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("a-test-secret-that-is-long-enough!!".as_bytes()),
        )
        .unwrap();
        assert!(svc.verify(&token).is_err());
    }
}
