use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::TokenRecord;
use crate::auth::token::{Fingerprint, IssuedToken};
use crate::error::AuthError;

/// Persistence for token records, keyed by fingerprint and by owning user.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fails with `Conflict` when the fingerprint is already stored.
    async fn insert(&self, token: &IssuedToken) -> Result<(), AuthError>;
    /// Fails with `NotFound` when no record matches.
    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint)
        -> Result<TokenRecord, AuthError>;
    /// Deleting an absent token is not an error.
    async fn delete_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<(), AuthError>;
    /// Returns the number of records removed, possibly zero.
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError>;
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, AuthError>;
}

#[derive(Clone)]
pub struct PgTokenStore {
    db: PgPool,
}

impl PgTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: &IssuedToken) -> Result<(), AuthError> {
        let res = sqlx::query(
            r#"
            INSERT INTO tokens (id, user_id, fingerprint, expiry, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token.user_id)
        .bind(token.fingerprint.as_str())
        .bind(token.expiry)
        .bind(token.created_at)
        .execute(&self.db)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AuthError::Conflict)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert token").into()),
        }
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<TokenRecord, AuthError> {
        let record = sqlx::query_as::<_, TokenRecord>(
            r#"
            SELECT id, user_id, fingerprint, expiry, created_at
              FROM tokens
             WHERE fingerprint = $1
            "#,
        )
        .bind(fingerprint.as_str())
        .fetch_optional(&self.db)
        .await
        .context("find token by fingerprint")?;

        record.ok_or(AuthError::NotFound)
    }

    async fn delete_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM tokens WHERE fingerprint = $1")
            .bind(fingerprint.as_str())
            .execute(&self.db)
            .await
            .context("delete token by fingerprint")?;
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let done = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete tokens for user")?;
        Ok(done.rows_affected())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, AuthError> {
        let done = sqlx::query("DELETE FROM tokens WHERE expiry <= $1")
            .bind(now)
            .execute(&self.db)
            .await
            .context("purge expired tokens")?;
        Ok(done.rows_affected())
    }
}
