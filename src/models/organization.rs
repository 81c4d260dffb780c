//! Organization model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub max_users: i32,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn sanitized(&self) -> OrganizationResponse {
        OrganizationResponse {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            plan: self.plan.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: String,
}

/// Derive a URL-safe slug from an organization name: lowercase, whitespace
/// collapsed to hyphens, everything outside `[a-z0-9-]` stripped.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}
