use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{HistoryEntry, HistoryRow, NewHistoryEntry};
use crate::error::StoreError;

/// CRUD over one user's history entries. Every call is scoped by the owner id;
/// no operation ever looks at another user's entries.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Assign id and timestamp, append at the end of the owner's collection.
    async fn append(&self, user_id: Uuid, entry: NewHistoryEntry)
        -> Result<HistoryEntry, StoreError>;
    /// All entries of the owner, oldest first.
    async fn list_for(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, StoreError>;
    async fn get_one(&self, user_id: Uuid, entry_id: Uuid) -> Result<HistoryEntry, StoreError>;
    /// Succeeds whether or not the entry was present.
    async fn remove(&self, user_id: Uuid, entry_id: Uuid) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgHistoryStore {
    db: PgPool,
}

impl PgHistoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn ensure_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::UserNotFound)
        }
    }
}

fn into_entry(row: HistoryRow) -> Result<HistoryEntry, StoreError> {
    HistoryEntry::try_from(row).map_err(|e| StoreError::Backend(sqlx::Error::Decode(e.into())))
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(
        &self,
        user_id: Uuid,
        entry: NewHistoryEntry,
    ) -> Result<HistoryEntry, StoreError> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r#"
            INSERT INTO history_entries (id, user_id, title, jd, mode, results, timestamp)
            SELECT $1, u.id, $3, $4, $5, $6, COALESCE($7, now())
              FROM users u
             WHERE u.id = $2
            RETURNING id, title, jd, mode, results, timestamp
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&entry.title)
        .bind(&entry.jd)
        .bind(entry.mode.as_str())
        .bind(Json(&entry.results))
        .bind(entry.timestamp)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::UserNotFound)?;
        into_entry(row)
    }

    async fn list_for(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, StoreError> {
        self.ensure_user(user_id).await?;
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, title, jd, mode, results, timestamp
              FROM history_entries
             WHERE user_id = $1
             ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(into_entry).collect()
    }

    async fn get_one(&self, user_id: Uuid, entry_id: Uuid) -> Result<HistoryEntry, StoreError> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, title, jd, mode, results, timestamp
              FROM history_entries
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        match row {
            Some(row) => into_entry(row),
            None => {
                self.ensure_user(user_id).await?;
                Err(StoreError::EntryNotFound)
            }
        }
    }

    async fn remove(&self, user_id: Uuid, entry_id: Uuid) -> Result<(), StoreError> {
        self.ensure_user(user_id).await?;
        sqlx::query("DELETE FROM history_entries WHERE id = $1 AND user_id = $2")
            .bind(entry_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
