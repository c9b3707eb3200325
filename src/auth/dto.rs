use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::repo_types::User;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body carrying a plaintext token (logout, validate).
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// Returned once, at login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}
