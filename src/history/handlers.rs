use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateHistoryRequest, CreatedHistoryResponse},
    repo_types::HistoryEntry,
    services::validate_new_entry,
};
use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, ApiJson, MessageBody, StoreError},
    state::AppState,
};

pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(list_history).post(add_history))
        .route("/history/:id", get(get_history).delete(delete_history))
}

/// Ids that are not UUIDs can never name a stored entry.
fn parse_entry_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

#[instrument(skip(state, body))]
pub async fn add_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<CreateHistoryRequest>,
) -> Result<
    (
        StatusCode,
        [(header::HeaderName, String); 1],
        Json<CreatedHistoryResponse>,
    ),
    ApiError,
> {
    let new_entry = validate_new_entry(body)?;
    let history = state.history.append(user_id, new_entry).await?;
    info!(%user_id, entry_id = %history.id, mode = %history.mode, "history added");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/history/{}", history.id))],
        Json(CreatedHistoryResponse {
            message: "History added".into(),
            history,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let entries = state.history.list_for(user_id).await?;
    debug!(%user_id, count = entries.len(), "history listed");
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn get_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<HistoryEntry>, ApiError> {
    let entry_id = parse_entry_id(&id).ok_or(StoreError::EntryNotFound)?;
    let entry = state.history.get_one(user_id, entry_id).await?;
    Ok(Json(entry))
}

#[instrument(skip(state))]
pub async fn delete_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    match parse_entry_id(&id) {
        Some(entry_id) => {
            state.history.remove(user_id, entry_id).await?;
            info!(%user_id, %entry_id, "history deleted");
        }
        None => debug!(%user_id, id = %id, "delete of malformed id treated as absent"),
    }
    Ok(Json(MessageBody {
        message: "History item deleted".into(),
    }))
}
