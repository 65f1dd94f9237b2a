use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Which pipeline variant produced a set of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Quick,
    Full,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Quick => "quick",
            SearchMode::Full => "full",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mode must be one of: quick, full")]
pub struct UnknownMode;

impl FromStr for SearchMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(SearchMode::Quick),
            "full" => Ok(SearchMode::Full),
            _ => Err(UnknownMode),
        }
    }
}

/// One stored pipeline invocation, as served to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub jd: String,
    pub mode: SearchMode,
    /// Opaque document from the AI collaborator, kept verbatim.
    pub results: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Validated input for `HistoryStore::append`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub title: String,
    pub jd: String,
    pub mode: SearchMode,
    pub results: serde_json::Value,
    /// Defaults to the time of insertion.
    pub timestamp: Option<OffsetDateTime>,
}

impl NewHistoryEntry {
    pub fn into_entry(self, id: Uuid, now: OffsetDateTime) -> HistoryEntry {
        HistoryEntry {
            id,
            title: self.title,
            jd: self.jd,
            mode: self.mode,
            results: self.results,
            timestamp: self.timestamp.unwrap_or(now),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct HistoryRow {
    pub id: Uuid,
    pub title: String,
    pub jd: String,
    pub mode: String,
    pub results: Json<serde_json::Value>,
    pub timestamp: OffsetDateTime,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = UnknownMode;

    fn try_from(r: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            title: r.title,
            jd: r.jd,
            mode: r.mode.parse()?,
            results: r.results.0,
            timestamp: r.timestamp,
        })
    }
}
