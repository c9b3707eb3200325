use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User, UserProfile};

/// Another user already holds the email.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct DuplicateEmail;

fn map_write_error(e: sqlx::Error, what: &'static str) -> anyhow::Error {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DuplicateEmail.into(),
        e => anyhow::Error::new(e).context(what),
    }
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, password_hash, active, created_at, updated_at";

/// The user store the auth core consumes. Lookups return `None` for unknown users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    /// Returns `false` when no such user exists.
    async fn set_active(&self, id: Uuid, active: bool) -> anyhow::Result<bool>;

    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Fails with `DuplicateEmail` when the email is taken.
    async fn insert(&self, user: NewUser) -> anyhow::Result<User>;
    /// Fails with `DuplicateEmail` when the email is taken.
    async fn update_profile(&self, id: Uuid, profile: UserProfile)
        -> anyhow::Result<Option<User>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update password hash")?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> anyhow::Result<bool> {
        let done = sqlx::query("UPDATE users SET active = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.db)
            .await
            .context("set user active flag")?;
        Ok(done.rows_affected() > 0)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY last_name, first_name"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, first_name, last_name, password_hash, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.active)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "insert user"))?;
        Ok(created)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        profile: UserProfile,
    ) -> anyhow::Result<Option<User>> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email = $2, first_name = $3, last_name = $4,
                   password_hash = COALESCE($5, password_hash), updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(profile.password_hash.as_deref())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "update user profile"))?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(())
    }
}
