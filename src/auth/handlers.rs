use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::dto::{LoginRequest, LoginResponse, TokenRequest, ValidateResponse},
    error::{AuthError, JsonResponse},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/validate-token", post(validate_token))
}

fn input_error(rejection: JsonRejection) -> AuthError {
    warn!(error = %rejection, "rejected request body");
    AuthError::Input("invalid json supplied, or json missing entirely".into())
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<JsonResponse<LoginResponse>>, AuthError> {
    let Json(payload) = payload.map_err(input_error)?;

    let session = match state.sessions.login(&payload.email, &payload.password).await {
        Ok(s) => s,
        Err(e) if e.is_authentication_failure() => {
            warn!(reason = %e, "login rejected");
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    info!(user_id = %session.user.id, email = %session.user.email, "user logged in");
    Ok(Json(JsonResponse::success(
        "success",
        LoginResponse {
            token: session.token.plaintext,
            expiry: session.token.expiry,
            user: session.user,
        },
    )))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<JsonResponse<()>>, AuthError> {
    let Json(payload) = payload.map_err(input_error)?;
    state.sessions.logout(&payload.token).await?;
    Ok(Json(JsonResponse::message("logged out")))
}

#[instrument(skip(state, payload))]
pub async fn validate_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<JsonResponse<ValidateResponse>>, AuthError> {
    let Json(payload) = payload.map_err(input_error)?;
    let valid = state.sessions.validate(&payload.token).await.is_some();
    Ok(Json(JsonResponse::success("", ValidateResponse { valid })))
}
