use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::HistoryEntry;

/// Body of `POST /history`. Every field is optional here so that a missing
/// field is reported as a 400 by validation instead of a deserializer error.
#[derive(Debug, Default, Deserialize)]
pub struct CreateHistoryRequest {
    pub title: Option<String>,
    pub jd: Option<String>,
    pub mode: Option<String>,
    pub results: Option<serde_json::Value>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedHistoryResponse {
    pub message: String,
    pub history: HistoryEntry,
}
