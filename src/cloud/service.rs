use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::documents::{CloudMeal, MealChanges, MealFields, MealPatch, NewCloudMeal};
use super::store::{CloudError, MealDocumentStore};

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const DEFAULT_SUBSCRIBE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Case-insensitive substring of the meal name.
    pub search: Option<String>,
    pub take: Option<usize>,
}

/// One user's saved meals, with the calorie rules applied on write.
pub struct CloudMeals<S: MealDocumentStore> {
    store: Arc<S>,
    user_id: String,
}

/// Live listing; dropping it stops the updates.
pub struct MealSubscription {
    handle: JoinHandle<()>,
}

impl Drop for MealSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<S: MealDocumentStore + 'static> CloudMeals<S> {
    pub fn new(store: Arc<S>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }

    #[instrument(skip(self, meal), fields(user = %self.user_id, name = %meal.name))]
    pub async fn create(&self, meal: NewCloudMeal) -> Result<CloudMeal, CloudError> {
        let fields = MealFields {
            name: meal.name,
            notes: meal.notes,
            tags: meal.tags,
            macros: meal.macros.resolve(),
            serving: meal.serving,
        };
        let created = self.store.insert(&self.user_id, fields).await?;
        debug!(id = %created.id, calories = created.macros.calories, "Meal created");
        Ok(created)
    }

    /// Macros in the patch replace the stored ones; calories are recomputed
    /// from them when the patch does not carry calories.
    #[instrument(skip(self, patch), fields(user = %self.user_id))]
    pub async fn update(&self, id: &str, patch: MealPatch) -> Result<(), CloudError> {
        let changes = MealChanges {
            name: patch.name,
            notes: patch.notes,
            tags: patch.tags,
            macros: patch.macros.map(|m| m.resolve()),
            serving: patch.serving,
        };
        self.store.update(&self.user_id, id, changes).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), CloudError> {
        self.store.delete(&self.user_id, id).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<CloudMeal>, CloudError> {
        self.store.get(&self.user_id, id).await
    }

    /// Newest-updated first. The name filter runs after the limit, on the
    /// fetched page only.
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<CloudMeal>, CloudError> {
        let rows = self
            .store
            .list_recent(&self.user_id, options.take.unwrap_or(DEFAULT_LIST_LIMIT))
            .await?;
        Ok(match options.search.as_deref().map(str::to_lowercase) {
            Some(needle) if !needle.is_empty() => rows
                .into_iter()
                .filter(|m| m.name.to_lowercase().contains(&needle))
                .collect(),
            _ => rows,
        })
    }

    /// Calls `callback` with the current list right away and again after
    /// every change to this user's collection.
    pub fn subscribe<F>(&self, take: Option<usize>, callback: F) -> MealSubscription
    where
        F: Fn(Vec<CloudMeal>) + Send + Sync + 'static,
    {
        let store = Arc::clone(&self.store);
        let user_id = self.user_id.clone();
        let take = take.unwrap_or(DEFAULT_SUBSCRIBE_LIMIT);
        let mut changes = store.changes();

        let handle = tokio::spawn(async move {
            loop {
                match store.list_recent(&user_id, take).await {
                    Ok(rows) => callback(rows),
                    Err(e) => warn!(user = %user_id, error = %e, "Meal subscription refresh failed"),
                }
                // wait for the next change to this collection
                loop {
                    match changes.recv().await {
                        Ok(changed) if changed == user_id => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Meal subscription lagged, refreshing");
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    }
                }
            }
        });
        MealSubscription { handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::documents::MacrosInput;
    use crate::cloud::store::InMemoryDocumentStore;
    use tokio::sync::mpsc;

    fn service() -> CloudMeals<InMemoryDocumentStore> {
        CloudMeals::new(Arc::new(InMemoryDocumentStore::new()), "user-1")
    }

    fn new_meal(name: &str, macros: MacrosInput) -> NewCloudMeal {
        NewCloudMeal {
            name: name.to_string(),
            macros,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_fills_calories_and_timestamps() {
        let meals = service();
        let created = meals
            .create(new_meal("Bowl", MacrosInput::new(30.0, 50.0, 10.0)))
            .await
            .unwrap();
        assert_eq!(created.macros.calories, 410.0);
        assert_eq!(created.created_at, created.updated_at);

        let explicit = meals
            .create(new_meal("Bar", MacrosInput::new(30.0, 50.0, 10.0).with_calories(380.0)))
            .await
            .unwrap();
        assert_eq!(explicit.macros.calories, 380.0);
    }

    #[tokio::test]
    async fn test_update_recomputes_calories_from_patch() {
        let meals = service();
        let created = meals
            .create(new_meal("Bowl", MacrosInput::new(30.0, 50.0, 10.0)))
            .await
            .unwrap();
        meals
            .update(
                &created.id,
                MealPatch {
                    macros: Some(MacrosInput {
                        protein: Some(20.0),
                        fat: Some(2.0),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let updated = meals.get(&created.id).await.unwrap().unwrap();
        assert_eq!(updated.macros.calories, 98.0);
        assert_eq!(updated.macros.carbs, 0.0);
        assert_eq!(updated.name, "Bowl");
        assert!(updated.updated_at >= created.updated_at);

        meals
            .update(
                &created.id,
                MealPatch {
                    name: Some("Big bowl".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let renamed = meals.get(&created.id).await.unwrap().unwrap();
        assert_eq!(renamed.name, "Big bowl");
        assert_eq!(renamed.macros.calories, 98.0);
    }

    #[tokio::test]
    async fn test_list_order_limit_and_filter() {
        let meals = service();
        let a = meals.create(new_meal("Apple pie", MacrosInput::default())).await.unwrap();
        meals.create(new_meal("Banana bread", MacrosInput::default())).await.unwrap();
        meals.create(new_meal("Pineapple salsa", MacrosInput::default())).await.unwrap();
        meals
            .update(
                &a.id,
                MealPatch {
                    notes: Some("extra cinnamon".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let all = meals.list(&ListOptions::default()).await.unwrap();
        let names: Vec<&str> = all.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Apple pie", "Pineapple salsa", "Banana bread"]);

        let filtered = meals
            .list(&ListOptions {
                search: Some("APPLE".to_string()),
                take: None,
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);

        let limited = meals
            .list(&ListOptions {
                search: None,
                take: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(limited[0].name, "Apple pie");
        assert_eq!(limited.len(), 1);

        meals.delete(&a.id).await.unwrap();
        assert!(meals.get(&a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_pushes_initial_and_changes_until_dropped() {
        let meals = service();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = meals.subscribe(None, move |rows| {
            let _ = tx.send(rows.len());
        });

        assert_eq!(rx.recv().await, Some(0));
        meals.create(new_meal("Soup", MacrosInput::default())).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));

        // another user's writes are not ours
        let other = CloudMeals::new(Arc::clone(&meals.store), "user-2");
        other.create(new_meal("Stew", MacrosInput::default())).await.unwrap();
        meals.create(new_meal("Salad", MacrosInput::default())).await.unwrap();
        assert_eq!(rx.recv().await, Some(2));

        drop(subscription);
        meals.create(new_meal("Late", MacrosInput::default())).await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
