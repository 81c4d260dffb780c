//! User model and role hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User roles, ordered from least to most privileged.
///
/// Authorization is defined purely by this total order: a subject may act
/// when its role is >= the strongest role the action permits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Tester,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Tester => "tester",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// True when this role satisfies at least one of the permitted roles.
    pub fn permits(&self, permitted: &[Role]) -> bool {
        permitted.iter().max().is_some_and(|required| self >= required)
    }
}

/// User entity. `password_hash` is produced only by the credential hasher
/// and never serialized out.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub organization_id: Uuid,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Convert to the API shape (no credential material).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            email_verified: self.email_verified,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub email_verified: bool,
}

/// A user's membership in a team, as surfaced by `/auth/me`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TeamMembership {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_order_matches_privilege() {
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::Tester);
        assert!(Role::Tester > Role::Viewer);
    }

    #[test]
    fn permits_uses_strongest_required_role() {
        assert!(Role::Admin.permits(&[Role::Manager, Role::Admin]));
        assert!(!Role::Manager.permits(&[Role::Manager, Role::Admin]));
        assert!(Role::Manager.permits(&[Role::Tester]));
        assert!(!Role::Viewer.permits(&[Role::Tester]));
    }

    #[test]
    fn permits_empty_list_denies() {
        assert!(!Role::Admin.permits(&[]));
    }
}
