//! In-memory stores used by `AppState::fake()` and the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::TokenStore;
use crate::auth::repo_types::TokenRecord;
use crate::auth::token::{Fingerprint, IssuedToken};
use crate::error::AuthError;
use crate::users::repo::{DuplicateEmail, UserStore};
use crate::users::repo_types::{NewUser, User, UserProfile};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> anyhow::Result<bool> {
        match self.users.lock().unwrap().get_mut(&id) {
            Some(user) => {
                user.active = active;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let mut all: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(all)
    }

    async fn insert(&self, new: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == new.email) {
            return Err(DuplicateEmail.into());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            password_hash: new.password_hash,
            active: new.active,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        profile: UserProfile,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.id != id && u.email == profile.email) {
            return Err(DuplicateEmail.into());
        }
        Ok(users.get_mut(&id).map(|user| {
            user.email = profile.email;
            user.first_name = profile.first_name;
            user.last_name = profile.last_name;
            if let Some(hash) = profile.password_hash {
                user.password_hash = hash;
            }
            user.updated_at = OffsetDateTime::now_utc();
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.users.lock().unwrap().remove(&id);
        Ok(())
    }
}

/// Token store double with switches for injecting storage failures.
#[derive(Default)]
pub struct MemoryTokenStore {
    records: Mutex<HashMap<String, TokenRecord>>,
    forced_conflicts: AtomicUsize,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryTokenStore {
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next `n` inserts report a fingerprint conflict.
    pub fn force_conflicts(&self, n: usize) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    fn check_deletes(&self) -> Result<(), AuthError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("token store unavailable").into());
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: &IssuedToken) -> Result<(), AuthError> {
        let pending = self.forced_conflicts.load(Ordering::SeqCst);
        if pending > 0 {
            self.forced_conflicts.store(pending - 1, Ordering::SeqCst);
            return Err(AuthError::Conflict);
        }

        let mut records = self.records.lock().unwrap();
        let key = token.fingerprint.as_str().to_string();
        if records.contains_key(&key) {
            return Err(AuthError::Conflict);
        }
        records.insert(
            key.clone(),
            TokenRecord {
                id: Uuid::new_v4(),
                user_id: token.user_id,
                fingerprint: key,
                expiry: token.expiry,
                created_at: token.created_at,
            },
        );
        Ok(())
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<TokenRecord, AuthError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("token store unavailable").into());
        }
        self.records
            .lock()
            .unwrap()
            .get(fingerprint.as_str())
            .cloned()
            .ok_or(AuthError::NotFound)
    }

    async fn delete_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<(), AuthError> {
        self.check_deletes()?;
        self.records.lock().unwrap().remove(fingerprint.as_str());
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        self.check_deletes()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, r| r.user_id != user_id);
        Ok((before - records.len()) as u64)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, AuthError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, r| r.is_live_at(now));
        Ok((before - records.len()) as u64)
    }
}
