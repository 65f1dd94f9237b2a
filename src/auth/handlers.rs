use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{debug, info, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, PublicUser, RefreshRequest,
            RegisterRequest,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        repo_types::User,
        services::{self, normalize_email},
    },
    error::{ApiError, ApiJson, MessageBody},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh", post(refresh))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(get_profile))
        .route("/users/password", put(change_password))
}

fn issue_tokens(state: &AppState, user: User) -> Result<AuthResponse, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&payload.email, state.config.normalize_email);
    let user = services::register(
        state.users.as_ref(),
        &payload.name,
        &email,
        &payload.password,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = normalize_email(&payload.email, state.config.normalize_email);
    let user = services::verify(state.users.as_ref(), &email, &payload.password).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| {
            debug!(error = %e, "refresh token rejected");
            ApiError::Unauthorized("Not authorized, token failed".into())
        })?;

    // A refresh token for a user that no longer exists is not a session.
    let user = services::get_by_id(state.users.as_ref(), claims.sub)
        .await
        .map_err(|_| ApiError::Unauthorized("User not found".into()))?;
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = services::get_by_id(state.users.as_ref(), user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageBody>, ApiError> {
    services::update_password(
        state.users.as_ref(),
        user_id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageBody {
        message: "Password updated".into(),
    }))
}
