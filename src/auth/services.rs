use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, needs_rehash, verify_decoy, verify_password};
use crate::auth::repo::TokenStore;
use crate::auth::token::{self, Fingerprint, IssuedToken};
use crate::error::AuthError;
use crate::users::{repo::UserStore, repo_types::User};

/// Result of a successful login. The plaintext token inside is not retrievable again.
#[derive(Debug)]
pub struct Session {
    pub token: IssuedToken,
    pub user: User,
}

/// Issues, validates and revokes bearer tokens against the shared stores.
#[derive(Clone)]
pub struct SessionAuthority {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    ttl: Duration,
}

impl SessionAuthority {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<dyn TokenStore>, ttl: Duration) -> Self {
        Self { users, tokens, ttl }
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_lowercase();

        let Some(user) = self.users.get_by_email(&email).await? else {
            verify_decoy(password);
            return Err(AuthError::UserNotFound);
        };

        if !verify_password(&user.password_hash, password)? {
            return Err(AuthError::InvalidPassword);
        }

        if !user.active {
            return Err(AuthError::InactiveUser);
        }

        if needs_rehash(&user.password_hash) {
            self.upgrade_hash(user.id, password).await;
        }

        let token = self.issue(user.id).await?;
        info!(user_id = %user.id, fingerprint = %token.fingerprint, "token issued");
        Ok(Session { token, user })
    }

    /// Best effort; the old hash keeps working if this fails.
    async fn upgrade_hash(&self, user_id: Uuid, password: &str) {
        let result = match hash_password(password) {
            Ok(hash) => self.users.update_password_hash(user_id, &hash).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => info!(%user_id, "password hash upgraded"),
            Err(e) => warn!(error = %e, %user_id, "password hash upgrade failed"),
        }
    }

    /// Generate and persist a token, retrying once on a fingerprint collision.
    async fn issue(&self, user_id: Uuid) -> Result<IssuedToken, AuthError> {
        let first = token::generate(user_id, self.ttl);
        match self.tokens.insert(&first).await {
            Ok(()) => return Ok(first),
            Err(AuthError::Conflict) => {
                warn!(%user_id, "token fingerprint collision, regenerating");
            }
            Err(e) => return Err(e),
        }

        let second = token::generate(user_id, self.ttl);
        match self.tokens.insert(&second).await {
            Ok(()) => Ok(second),
            Err(AuthError::Conflict) => {
                error!(%user_id, "repeated fingerprint collision; random source is suspect");
                Err(AuthError::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke a token. Unknown or already revoked tokens are not an error.
    pub async fn logout(&self, plaintext: &str) -> Result<(), AuthError> {
        if !token::is_well_formed(plaintext) {
            return Ok(());
        }
        let fingerprint = Fingerprint::of(plaintext);
        match self.tokens.delete_by_fingerprint(&fingerprint).await {
            Ok(()) | Err(AuthError::NotFound) => {
                info!(%fingerprint, "token revoked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve a token to its owner. `None` for anything that is not a live token.
    pub async fn validate(&self, plaintext: &str) -> Option<Uuid> {
        self.validate_at(plaintext, OffsetDateTime::now_utc()).await
    }

    pub async fn validate_at(&self, plaintext: &str, now: OffsetDateTime) -> Option<Uuid> {
        if !token::is_well_formed(plaintext) {
            return None;
        }
        let fingerprint = Fingerprint::of(plaintext);
        debug!(%fingerprint, "validating token");

        match self.tokens.find_by_fingerprint(&fingerprint).await {
            Ok(record) if record.is_live_at(now) => Some(record.user_id),
            Ok(_) | Err(AuthError::NotFound) => None,
            Err(e) => {
                error!(error = %e, %fingerprint, "token lookup failed; denying");
                None
            }
        }
    }

    /// Mark the user inactive, then revoke every token they hold.
    ///
    /// The user stays inactive even when revocation fails; that failure comes
    /// back as `RevocationFailed`.
    pub async fn deactivate(&self, user_id: Uuid) -> Result<u64, AuthError> {
        if !self.users.set_active(user_id, false).await? {
            return Err(AuthError::NotFound);
        }
        info!(%user_id, "user deactivated");

        self.revoke_all(user_id).await.map_err(|e| {
            error!(error = %e, %user_id, "token revocation failed after deactivation");
            AuthError::RevocationFailed(Box::new(e))
        })
    }

    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self.tokens.delete_all_for_user(user_id).await?;
        info!(%user_id, revoked, "tokens revoked for user");
        Ok(revoked)
    }
}

/// Periodically delete expired token rows. Expiry is enforced on read regardless.
pub fn spawn_expiry_sweep(
    tokens: Arc<dyn TokenStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match tokens.purge_expired(OffsetDateTime::now_utc()).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired tokens purged"),
                Err(e) => warn!(error = %e, "expired token sweep failed"),
            }
        }
    })
}
