use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Token row. Holds the fingerprint only; the plaintext never reaches storage.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fingerprint: String,
    pub expiry: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl TokenRecord {
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now < self.expiry
    }
}
