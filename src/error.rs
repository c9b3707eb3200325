use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Message used for every authentication failure, whatever the sub-cause.
pub const AUTH_FAILED: &str = "invalid credentials";

/// Errors produced by the auth core and the routes around it.
///
/// Several variants collapse to the same wire response on purpose; the
/// distinct variants exist for logging and for callers that need to branch.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid request: {0}")]
    Input(String),
    #[error("user not found")]
    UserNotFound,
    #[error("invalid password")]
    InvalidPassword,
    #[error("unsupported or malformed password hash: {0}")]
    HashMismatch(String),
    #[error("user is not active")]
    InactiveUser,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token fingerprint already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("user deactivated but token revocation failed: {0}")]
    RevocationFailed(#[source] Box<AuthError>),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    /// Credential and token failures that share one response.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::UserNotFound
                | AuthError::InvalidPassword
                | AuthError::HashMismatch(_)
                | AuthError::InactiveUser
                | AuthError::InvalidToken
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Input(_) => StatusCode::BAD_REQUEST,
            e if e.is_authentication_failure() => StatusCode::UNAUTHORIZED,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AuthError::Input(msg) => msg.clone(),
            e if e.is_authentication_failure() => AUTH_FAILED.to_string(),
            AuthError::NotFound => "not found".to_string(),
            AuthError::RevocationFailed(_) => {
                "user deactivated but token revocation failed".to_string()
            }
            _ => "internal server error".to_string(),
        }
    }
}

/// Envelope shared by every JSON response.
#[derive(Debug, Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl JsonResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = JsonResponse::<()> {
            error: true,
            message: self.public_message(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_share_status_and_message() {
        let errs = [
            AuthError::UserNotFound,
            AuthError::InvalidPassword,
            AuthError::HashMismatch("bad".into()),
            AuthError::InactiveUser,
            AuthError::InvalidToken,
        ];
        for e in errs {
            assert_eq!(e.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(e.public_message(), AUTH_FAILED);
        }
    }

    #[test]
    fn storage_errors_hide_details() {
        let e = AuthError::Storage(anyhow::anyhow!("connection refused to 10.0.0.1"));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.public_message(), "internal server error");
        assert_eq!(AuthError::Conflict.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn envelope_omits_missing_data() {
        let json = serde_json::to_value(JsonResponse::message("logged out")).unwrap();
        assert_eq!(json["error"], false);
        assert_eq!(json["message"], "logged out");
        assert!(json.get("data").is_none());
    }
}
