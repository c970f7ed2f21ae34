use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::documents::{CloudMeal, MealChanges, MealFields};

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("Meal not found: {0}")]
    NotFound(String),
    #[error("Document store error: {0}")]
    Backend(String),
}

/// Per-user meal collections with server-assigned ids and timestamps.
#[async_trait]
pub trait MealDocumentStore: Send + Sync {
    async fn insert(&self, user_id: &str, fields: MealFields) -> Result<CloudMeal, CloudError>;
    async fn update(&self, user_id: &str, id: &str, changes: MealChanges) -> Result<(), CloudError>;
    async fn delete(&self, user_id: &str, id: &str) -> Result<(), CloudError>;
    async fn get(&self, user_id: &str, id: &str) -> Result<Option<CloudMeal>, CloudError>;
    /// Most recently updated first.
    async fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<CloudMeal>, CloudError>;
    /// Receives the user id of every collection that changes.
    fn changes(&self) -> broadcast::Receiver<String>;
}

struct StoredMeal {
    meal: CloudMeal,
    // write order, breaks ties between equal timestamps
    seq: u64,
}

#[derive(Default)]
struct Collections {
    users: HashMap<String, HashMap<String, StoredMeal>>,
    next_seq: u64,
}

impl Collections {
    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

pub struct InMemoryDocumentStore {
    inner: RwLock<Collections>,
    feed: broadcast::Sender<String>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        let (feed, _) = broadcast::channel(64);
        Self {
            inner: RwLock::new(Collections::default()),
            feed,
        }
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, user_id: &str) {
        // no receivers is fine
        let _ = self.feed.send(user_id.to_string());
    }
}

#[async_trait]
impl MealDocumentStore for InMemoryDocumentStore {
    async fn insert(&self, user_id: &str, fields: MealFields) -> Result<CloudMeal, CloudError> {
        let now = Utc::now();
        let meal = CloudMeal {
            id: Uuid::new_v4().to_string(),
            name: fields.name,
            notes: fields.notes,
            tags: fields.tags,
            macros: fields.macros,
            serving: fields.serving,
            created_at: now,
            updated_at: now,
        };
        {
            let mut inner = self.inner.write().await;
            let seq = inner.bump();
            inner
                .users
                .entry(user_id.to_string())
                .or_default()
                .insert(meal.id.clone(), StoredMeal { meal: meal.clone(), seq });
        }
        self.notify(user_id);
        Ok(meal)
    }

    async fn update(&self, user_id: &str, id: &str, changes: MealChanges) -> Result<(), CloudError> {
        {
            let mut inner = self.inner.write().await;
            let seq = inner.bump();
            let stored = inner
                .users
                .get_mut(user_id)
                .and_then(|meals| meals.get_mut(id))
                .ok_or_else(|| CloudError::NotFound(id.to_string()))?;
            changes.apply_to(&mut stored.meal);
            stored.meal.updated_at = Utc::now();
            stored.seq = seq;
        }
        self.notify(user_id);
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), CloudError> {
        let removed = {
            let mut inner = self.inner.write().await;
            inner
                .users
                .get_mut(user_id)
                .and_then(|meals| meals.remove(id))
                .is_some()
        };
        if removed {
            self.notify(user_id);
        }
        Ok(())
    }

    async fn get(&self, user_id: &str, id: &str) -> Result<Option<CloudMeal>, CloudError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(user_id)
            .and_then(|meals| meals.get(id))
            .map(|stored| stored.meal.clone()))
    }

    async fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<CloudMeal>, CloudError> {
        let inner = self.inner.read().await;
        let Some(meals) = inner.users.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&StoredMeal> = meals.values().collect();
        rows.sort_by(|a, b| {
            b.meal
                .updated_at
                .cmp(&a.meal.updated_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        Ok(rows.into_iter().take(limit).map(|s| s.meal.clone()).collect())
    }

    fn changes(&self) -> broadcast::Receiver<String> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::documents::{CloudMacros, ServingInfo};

    fn fields(name: &str) -> MealFields {
        MealFields {
            name: name.to_string(),
            notes: None,
            tags: vec![],
            macros: CloudMacros::default(),
            serving: ServingInfo::default(),
        }
    }

    #[tokio::test]
    async fn test_collections_are_per_user() {
        let store = InMemoryDocumentStore::new();
        let meal = store.insert("alice", fields("Toast")).await.unwrap();
        assert!(store.get("bob", &meal.id).await.unwrap().is_none());
        assert_eq!(store.get("alice", &meal.id).await.unwrap().unwrap().name, "Toast");
        assert!(store.list_recent("bob", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .update("alice", "nope", MealChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::NotFound(id) if id == "nope"));
        store.delete("alice", "nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_change_feed_announces_writes() {
        let store = InMemoryDocumentStore::new();
        let mut rx = store.changes();
        let meal = store.insert("alice", fields("Soup")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "alice");
        store.delete("alice", &meal.id).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "alice");
    }
}
