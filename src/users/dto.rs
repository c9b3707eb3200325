use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo_types::User;

/// Create (no `id`) or edit (with `id`) a user.
#[derive(Debug, Deserialize)]
pub struct SaveUserRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Empty on edit means "keep the current password".
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub revoked_tokens: u64,
}
