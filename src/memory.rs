//! In-process backend for both stores.
//!
//! Each user is one document that owns its history entries, so the history of a
//! user lives and dies with the user document. Mutations read-modify-write the
//! whole document under the write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{repo::UserStore, repo_types::User},
    error::StoreError,
    history::{
        repo::HistoryStore,
        repo_types::{HistoryEntry, NewHistoryEntry},
    },
};

struct UserDocument {
    user: User,
    history: Vec<HistoryEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, UserDocument>>,
}

impl MemoryStore {
    /// Total number of history entries across all users.
    pub async fn entry_count(&self) -> usize {
        self.users.read().await.values().map(|d| d.history.len()).sum()
    }

    /// Drop a user document together with every entry it owns.
    #[cfg(test)]
    pub async fn remove_user(&self, id: Uuid) -> bool {
        self.users.write().await.remove(&id).is_some()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|d| d.user.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        users.insert(
            user.id,
            UserDocument {
                user: user.clone(),
                history: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|d| d.user.email == email)
            .map(|d| d.user.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).map(|d| d.user.clone()))
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let doc = users.get_mut(&id).ok_or(StoreError::UserNotFound)?;
        doc.user.password_hash = password_hash.to_string();
        doc.user.updated_at = OffsetDateTime::now_utc();
        Ok(doc.user.clone())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(
        &self,
        user_id: Uuid,
        entry: NewHistoryEntry,
    ) -> Result<HistoryEntry, StoreError> {
        let mut users = self.users.write().await;
        let doc = users.get_mut(&user_id).ok_or(StoreError::UserNotFound)?;
        let stored = entry.into_entry(Uuid::new_v4(), OffsetDateTime::now_utc());
        doc.history.push(stored.clone());
        Ok(stored)
    }

    async fn list_for(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, StoreError> {
        let users = self.users.read().await;
        let doc = users.get(&user_id).ok_or(StoreError::UserNotFound)?;
        Ok(doc.history.clone())
    }

    async fn get_one(&self, user_id: Uuid, entry_id: Uuid) -> Result<HistoryEntry, StoreError> {
        let users = self.users.read().await;
        let doc = users.get(&user_id).ok_or(StoreError::UserNotFound)?;
        doc.history
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or(StoreError::EntryNotFound)
    }

    async fn remove(&self, user_id: Uuid, entry_id: Uuid) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let doc = users.get_mut(&user_id).ok_or(StoreError::UserNotFound)?;
        doc.history.retain(|e| e.id != entry_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::repo_types::SearchMode;
    use serde_json::json;

    async fn user(store: &MemoryStore, email: &str) -> Uuid {
        store.create("Tester", email, "hash").await.unwrap().id
    }

    fn new_entry(title: &str, results: serde_json::Value) -> NewHistoryEntry {
        NewHistoryEntry {
            title: title.into(),
            jd: "jd text".into(),
            mode: SearchMode::Quick,
            results,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn append_then_get_returns_input_plus_identity() {
        let store = MemoryStore::default();
        let uid = user(&store, "a@example.com").await;
        let input = new_entry("React Search", json!({ "candidates": [] }));

        let before = OffsetDateTime::now_utc();
        let stored = store.append(uid, input.clone()).await.unwrap();
        let fetched = store.get_one(uid, stored.id).await.unwrap();

        assert_eq!(fetched, stored);
        assert_eq!(fetched.title, input.title);
        assert_eq!(fetched.jd, input.jd);
        assert_eq!(fetched.mode, input.mode);
        assert_eq!(fetched.results, input.results);
        assert!(fetched.timestamp >= before);
    }

    #[tokio::test]
    async fn list_preserves_insertion_order() {
        let store = MemoryStore::default();
        let uid = user(&store, "a@example.com").await;
        let mut ids = Vec::new();
        for i in 0..5 {
            let e = store
                .append(uid, new_entry(&format!("search {i}"), json!([])))
                .await
                .unwrap();
            ids.push(e.id);
        }
        let listed: Vec<Uuid> = store
            .list_for(uid)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn entries_are_isolated_per_owner() {
        let store = MemoryStore::default();
        let alice = user(&store, "alice@example.com").await;
        let bob = user(&store, "bob@example.com").await;
        let entry = store.append(alice, new_entry("mine", json!([]))).await.unwrap();

        assert!(matches!(
            store.get_one(bob, entry.id).await,
            Err(StoreError::EntryNotFound)
        ));
        store.remove(bob, entry.id).await.unwrap();
        assert_eq!(store.get_one(alice, entry.id).await.unwrap(), entry);
        assert!(store.list_for(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = MemoryStore::default();
        let uid = user(&store, "a@example.com").await;
        let entry = store.append(uid, new_entry("once", json!([]))).await.unwrap();

        store.remove(uid, entry.id).await.unwrap();
        store.remove(uid, entry.id).await.unwrap();
        assert!(store.list_for(uid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_round_trip_verbatim() {
        let store = MemoryStore::default();
        let uid = user(&store, "a@example.com").await;
        let results = json!({
            "candidates": [{ "name": "Ada", "education": ["MIT"], "experience_years": 7 }],
            "scored_candidates": [{ "score": 8.25, "breakdown": { "skills": 9, "education": 7 } }],
            "outreach_messages": [{ "candidate": "Ada", "message": "Hello\nAda", "meta": null }],
            "nested": { "a": { "b": { "c": [1, [2, [3]]] } } }
        });
        let stored = store
            .append(uid, new_entry("deep", results.clone()))
            .await
            .unwrap();
        assert_eq!(store.get_one(uid, stored.id).await.unwrap().results, results);
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let store = MemoryStore::default();
        let ghost = Uuid::new_v4();
        assert!(matches!(
            store.append(ghost, new_entry("x", json!([]))).await,
            Err(StoreError::UserNotFound)
        ));
        assert!(matches!(store.list_for(ghost).await, Err(StoreError::UserNotFound)));
        assert!(matches!(
            store.get_one(ghost, Uuid::new_v4()).await,
            Err(StoreError::UserNotFound)
        ));
        assert!(matches!(
            store.remove(ghost, Uuid::new_v4()).await,
            Err(StoreError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn removing_a_user_drops_its_history() {
        let store = MemoryStore::default();
        let uid = user(&store, "a@example.com").await;
        store.append(uid, new_entry("one", json!([]))).await.unwrap();
        store.append(uid, new_entry("two", json!([]))).await.unwrap();
        assert_eq!(store.entry_count().await, 2);

        assert!(store.remove_user(uid).await);
        assert_eq!(store.entry_count().await, 0);
        assert!(matches!(store.list_for(uid).await, Err(StoreError::UserNotFound)));
    }

    #[tokio::test]
    async fn duplicate_email_is_exact_match() {
        let store = MemoryStore::default();
        user(&store, "a@example.com").await;
        assert!(matches!(
            store.create("x", "a@example.com", "h").await,
            Err(StoreError::DuplicateEmail)
        ));
        assert!(store.create("x", "A@example.com", "h").await.is_ok());
    }
}
