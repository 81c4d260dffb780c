//! Persistent store behind a trait, with a Postgres implementation and an
//! in-memory double for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Organization, Role, TeamMembership, User};

/// Fields needed to insert a user; everything else is generated by the
/// store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub organization_id: Uuid,
    pub email_verified: bool,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, anyhow::Error>;
    async fn create_user(&self, new_user: NewUser) -> Result<User, anyhow::Error>;

    /// Mark a user's email as verified. Returns false when no row matched.
    async fn set_email_verified(&self, user_id: Uuid) -> Result<bool, anyhow::Error>;
    async fn set_password_hash(&self, user_id: Uuid, hash: &str) -> Result<(), anyhow::Error>;
    async fn set_last_login(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error>;

    async fn find_organization_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Organization>, anyhow::Error>;
    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, anyhow::Error>;
    async fn create_organization(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Organization, anyhow::Error>;

    async fn team_memberships(&self, user_id: Uuid) -> Result<Vec<TeamMembership>, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, \
     role, organization_id, email_verified, last_login_at, created_at";

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
                 (email, password_hash, first_name, last_name, role, \
                  organization_id, email_verified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.role)
        .bind(new_user.organization_id)
        .bind(new_user.email_verified)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_email_verified(&self, user_id: Uuid) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(&self, user_id: Uuid, hash: &str) -> Result<(), anyhow::Error> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_last_login(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_organization_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Organization>, anyhow::Error> {
        let org = sqlx::query_as::<_, Organization>(
            "SELECT id, name, slug, plan, max_users, created_at \
             FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(org)
    }

    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, anyhow::Error> {
        let org = sqlx::query_as::<_, Organization>(
            "SELECT id, name, slug, plan, max_users, created_at \
             FROM organizations WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(org)
    }

    async fn create_organization(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Organization, anyhow::Error> {
        let org = sqlx::query_as::<_, Organization>(
            "INSERT INTO organizations (name, slug) VALUES ($1, $2) \
             RETURNING id, name, slug, plan, max_users, created_at",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(org)
    }

    async fn team_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<TeamMembership>, anyhow::Error> {
        let teams = sqlx::query_as::<_, TeamMembership>(
            "SELECT t.id, t.name, tm.role \
             FROM team_members tm \
             JOIN teams t ON t.id = tm.team_id \
             WHERE tm.user_id = $1 \
             ORDER BY t.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(teams)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-memory double. Generates ids and timestamps the way the database
/// would, so service-level behavior is exercised unchanged.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    organizations: HashMap<Uuid, Organization>,
    teams: Vec<(Uuid, TeamMembership)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user directly, simulating out-of-band deletion.
    pub fn delete_user(&self, user_id: Uuid) {
        self.inner.lock().unwrap().users.remove(&user_id);
    }

    /// Attach a team membership for a user.
    pub fn add_team_membership(&self, user_id: Uuid, team_name: &str, role: Role) {
        self.inner.lock().unwrap().teams.push((
            user_id,
            TeamMembership {
                id: Uuid::new_v4(),
                name: team_name.to_string(),
                role,
            },
        ));
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, anyhow::Error> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, anyhow::Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.email == new_user.email) {
            return Err(anyhow::anyhow!("duplicate key value: users_email_key"));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            role: new_user.role,
            organization_id: new_user.organization_id,
            email_verified: new_user.email_verified,
            last_login_at: None,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_email_verified(&self, user_id: Uuid) -> Result<bool, anyhow::Error> {
        let mut inner = self.inner.lock().unwrap();
        match inner.users.get_mut(&user_id) {
            Some(user) => {
                user.email_verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_password_hash(&self, user_id: Uuid, hash: &str) -> Result<(), anyhow::Error> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.password_hash = hash.to_string();
        }
        Ok(())
    }

    async fn set_last_login(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn find_organization_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Organization>, anyhow::Error> {
        Ok(self.inner.lock().unwrap().organizations.get(&id).cloned())
    }

    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, anyhow::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .organizations
            .values()
            .find(|o| o.slug == slug)
            .cloned())
    }

    async fn create_organization(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Organization, anyhow::Error> {
        let mut inner = self.inner.lock().unwrap();
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.to_string(),
            plan: "free".to_string(),
            max_users: 5,
            created_at: Utc::now(),
        };
        inner.organizations.insert(org.id, org.clone());
        Ok(org)
    }

    async fn team_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<TeamMembership>, anyhow::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .teams
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
