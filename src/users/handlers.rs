use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::{require_auth, AuthUser},
        password::hash_password,
    },
    error::{AuthError, JsonResponse},
    state::AppState,
    users::{
        dto::{DeactivateResponse, DeleteUserRequest, SaveUserRequest, UsersResponse},
        repo::{DuplicateEmail, UserStore},
        repo_types::{NewUser, User, UserProfile},
    },
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Everything here sits behind the auth gate.
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/users", post(all_users))
        .route("/admin/users/get/:id", post(get_user))
        .route("/admin/users/save", post(save_user))
        .route("/admin/users/delete", post(delete_user))
        .route("/admin/log-user-out/:id", post(log_user_out_and_set_inactive))
        .route("/me", get(get_me))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn bad_json(rejection: JsonRejection) -> AuthError {
    warn!(error = %rejection, "rejected request body");
    AuthError::Input("invalid json".into())
}

fn write_error(e: anyhow::Error) -> AuthError {
    if e.is::<DuplicateEmail>() {
        AuthError::Input("Email already registered".into())
    } else {
        e.into()
    }
}

#[instrument(skip(state))]
pub async fn all_users(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<JsonResponse<UsersResponse>>, AuthError> {
    let users = state.users().list().await?;
    Ok(Json(JsonResponse::success("success", UsersResponse { users })))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JsonResponse<User>>, AuthError> {
    let user = state.users().get_by_id(id).await?.ok_or(AuthError::NotFound)?;
    Ok(Json(JsonResponse::success("success", user)))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<JsonResponse<User>>, AuthError> {
    // A token can outlive its user only if deletion raced the lookup.
    let user = state
        .users()
        .get_by_id(user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    Ok(Json(JsonResponse::success("success", user)))
}

#[instrument(skip(state, payload))]
pub async fn save_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<SaveUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<JsonResponse<()>>), AuthError> {
    let Json(mut payload) = payload.map_err(bad_json)?;
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(AuthError::Input("Invalid email".into()));
    }
    if !payload.password.is_empty() && payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Input("Password too short".into()));
    }

    match payload.id {
        None => create_user(&state, payload).await?,
        Some(id) => edit_user(&state, id, payload).await?,
    }

    Ok((StatusCode::ACCEPTED, Json(JsonResponse::message("Changes saved"))))
}

async fn create_user(state: &AppState, payload: SaveUserRequest) -> Result<(), AuthError> {
    if payload.password.is_empty() {
        return Err(AuthError::Input("Password is required".into()));
    }

    let user = state
        .users()
        .insert(NewUser {
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password_hash: hash_password(&payload.password)?,
            active: payload.active,
        })
        .await
        .map_err(write_error)?;
    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(())
}

async fn edit_user(state: &AppState, id: Uuid, payload: SaveUserRequest) -> Result<(), AuthError> {
    let current = state.users().get_by_id(id).await?.ok_or(AuthError::NotFound)?;

    let password_hash = match payload.password.as_str() {
        "" => None,
        plain => Some(hash_password(plain)?),
    };
    let password_changed = password_hash.is_some();

    state
        .users()
        .update_profile(
            id,
            UserProfile {
                email: payload.email,
                first_name: payload.first_name,
                last_name: payload.last_name,
                password_hash,
            },
        )
        .await
        .map_err(write_error)?
        .ok_or(AuthError::NotFound)?;
    if password_changed {
        info!(user_id = %id, "password changed");
    }

    match (current.active, payload.active) {
        (true, false) => {
            state.sessions.deactivate(id).await?;
        }
        (false, true) => {
            state.users().set_active(id, true).await?;
            info!(user_id = %id, "user reactivated");
        }
        _ => {}
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<DeleteUserRequest>, JsonRejection>,
) -> Result<Json<JsonResponse<()>>, AuthError> {
    let Json(payload) = payload.map_err(bad_json)?;
    state.sessions.revoke_all(payload.id).await?;
    state.users().delete(payload.id).await?;
    info!(user_id = %payload.id, "user deleted");
    Ok(Json(JsonResponse::message("User deleted")))
}

#[instrument(skip(state))]
pub async fn log_user_out_and_set_inactive(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<JsonResponse<DeactivateResponse>>), AuthError> {
    let revoked_tokens = state.sessions.deactivate(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JsonResponse::success(
            "user logged out and set to inactive",
            DeactivateResponse { revoked_tokens },
        )),
    ))
}
