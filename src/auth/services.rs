use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    password::{hash_password, verify_password},
    repo::UserStore,
    repo_types::User,
};
use crate::error::{ApiError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Deliberately silent about whether the email or the password was wrong.
    #[error("Invalid email or password")]
    AuthFailure,
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("User not found")]
    UserNotFound,
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(StoreError),
    #[error("credential hashing failed: {0}")]
    Hash(anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::UserNotFound => AuthError::UserNotFound,
            other => AuthError::Store(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::AuthFailure => ApiError::Unauthorized(e.to_string()),
            AuthError::DuplicateEmail => ApiError::Conflict(e.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(e.to_string()),
            AuthError::InvalidInput(msg) => ApiError::Validation(msg),
            AuthError::Store(e) => e.into(),
            AuthError::Hash(e) => ApiError::Internal(e.to_string()),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Applies the configured email policy before anything touches the store.
pub fn normalize_email(email: &str, lowercase: bool) -> String {
    let trimmed = email.trim();
    if lowercase {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

pub async fn register(
    users: &dyn UserStore,
    name: &str,
    email: &str,
    raw_password: &str,
) -> Result<User, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidInput("Name is required".into()));
    }
    if !is_valid_email(email) {
        return Err(AuthError::InvalidInput("Invalid email".into()));
    }
    if raw_password.is_empty() {
        return Err(AuthError::InvalidInput("Password is required".into()));
    }

    if users.find_by_email(email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let hash = hash_password(raw_password).map_err(AuthError::Hash)?;
    // The unique index still decides a race between two concurrent registrations.
    let user = users.create(name, email, &hash).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn verify(
    users: &dyn UserStore,
    email: &str,
    raw_password: &str,
) -> Result<User, AuthError> {
    let Some(user) = users.find_by_email(email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AuthError::AuthFailure);
    };

    // A stored hash that cannot be parsed is treated like a wrong password.
    let ok = verify_password(raw_password, &user.password_hash).unwrap_or(false);
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::AuthFailure);
    }
    Ok(user)
}

pub async fn get_by_id(users: &dyn UserStore, id: Uuid) -> Result<User, AuthError> {
    users.find_by_id(id).await?.ok_or(AuthError::UserNotFound)
}

/// The only path that mutates a stored credential; always re-hashes.
pub async fn update_password(
    users: &dyn UserStore,
    id: Uuid,
    current_password: &str,
    new_password: &str,
) -> Result<User, AuthError> {
    if new_password.is_empty() {
        return Err(AuthError::InvalidInput("New password is required".into()));
    }
    let user = get_by_id(users, id).await?;
    if !verify_password(current_password, &user.password_hash).unwrap_or(false) {
        warn!(user_id = %id, "password change with wrong current password");
        return Err(AuthError::AuthFailure);
    }
    let hash = hash_password(new_password).map_err(AuthError::Hash)?;
    let user = users.update_password_hash(id, &hash).await?;
    info!(user_id = %id, "password updated");
    Ok(user)
}
