//! Opaque bearer tokens and their fingerprints.
//!
//! The plaintext is handed to the client once and never stored. The store
//! only sees the SHA-256 fingerprint, which is enough to look a token up
//! but cannot be turned back into a usable token.

use std::fmt;
use std::time::Duration;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration as TimeDuration, OffsetDateTime};
use uuid::Uuid;

/// Random bytes per token (hex-encoded to twice this length).
pub const TOKEN_BYTES: usize = 32;

/// Hex-encoded SHA-256 of a plaintext token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(plaintext: &str) -> Self {
        Self(hex::encode(Sha256::digest(plaintext.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Enough to correlate log lines, not enough to matter if leaked.
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// A freshly generated token. The only value that ever carries the plaintext.
#[derive(Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub fingerprint: Fingerprint,
    pub user_id: Uuid,
    pub expiry: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"<redacted>")
            .field("fingerprint", &self.fingerprint)
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .finish()
    }
}

pub fn generate(user_id: Uuid, ttl: Duration) -> IssuedToken {
    generate_at(user_id, ttl, OffsetDateTime::now_utc())
}

pub fn generate_at(user_id: Uuid, ttl: Duration, now: OffsetDateTime) -> IssuedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let plaintext = hex::encode(bytes);
    let ttl = TimeDuration::try_from(ttl).unwrap_or(TimeDuration::MAX);

    IssuedToken {
        fingerprint: Fingerprint::of(&plaintext),
        plaintext,
        user_id,
        expiry: now.saturating_add(ttl),
        created_at: now,
    }
}

/// Cheap shape check so garbage never reaches the store.
pub fn is_well_formed(candidate: &str) -> bool {
    candidate.len() == TOKEN_BYTES * 2 && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}
