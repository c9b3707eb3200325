use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use crate::error::AuthError;
use crate::state::AppState;

/// Identity of the caller, resolved from a live bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<AuthUser, AuthError> {
    let Some(token) = bearer_token(headers) else {
        warn!("missing or malformed Authorization header");
        return Err(AuthError::InvalidToken);
    };
    match state.sessions.validate(token).await {
        Some(user_id) => Ok(AuthUser(user_id)),
        None => {
            warn!("invalid or expired token");
            Err(AuthError::InvalidToken)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved by `require_auth` further up.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }
        authenticate(&parts.headers, state).await
    }
}

/// Gate for whole route groups: rejects before the handler runs, otherwise
/// leaves an `AuthUser` in the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &state).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_accepts_either_case_scheme() {
        assert_eq!(bearer_token(&headers_with("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("bearer abc")), Some("abc"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes_and_blanks() {
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&headers_with("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn extractor_prefers_identity_left_by_middleware() {
        let state = AppState::fake();
        let id = Uuid::new_v4();
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        parts.extensions.insert(AuthUser(id));
        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user, AuthUser(id));
    }

    #[tokio::test]
    async fn extractor_without_token_is_rejected() {
        let state = AppState::fake();
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}
