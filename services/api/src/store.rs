//! Learner Store
//!
//! Users and their append-only progress history. The API depends only on the
//! `LearnerStore` trait; `InMemoryStore` backs development and tests while
//! `crate::db::PgStore` backs production.

use anyhow::Result;
use async_trait::async_trait;
use pathwise_core::profile::CompletedTopic;
use std::collections::{HashMap, hash_map::Entry};
use tokio::sync::RwLock;

use crate::models::{UpdateUserPayload, User};

#[async_trait]
pub trait LearnerStore: Send + Sync {
    /// Inserts a new user atomically. Returns `None` when the id is taken.
    async fn create_user(&self, user: User) -> Result<Option<User>>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Applies a partial update, returning `None` for an unknown user.
    async fn update_user(&self, user_id: &str, update: UpdateUserPayload) -> Result<Option<User>>;

    /// Appends one entry to the user's history.
    async fn add_progress(&self, user_id: &str, entry: &CompletedTopic) -> Result<()>;

    /// The user's history, oldest first.
    async fn list_completed_topics(&self, user_id: &str) -> Result<Vec<CompletedTopic>>;
}

#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, User>>,
    progress: RwLock<HashMap<String, Vec<CompletedTopic>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearnerStore for InMemoryStore {
    async fn create_user(&self, user: User) -> Result<Option<User>> {
        match self.users.write().await.entry(user.id.clone()) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => Ok(Some(slot.insert(user).clone())),
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn update_user(&self, user_id: &str, update: UpdateUserPayload) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(user_id).map(|user| {
            update.apply(user);
            user.clone()
        }))
    }

    async fn add_progress(&self, user_id: &str, entry: &CompletedTopic) -> Result<()> {
        self.progress
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_completed_topics(&self, user_id: &str) -> Result<Vec<CompletedTopic>> {
        let mut history = self
            .progress
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        history.sort_by_key(|h| h.completed_at);
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pathwise_core::profile::SkillLevel;
    use pathwise_core::topic::{Category, Difficulty};

    fn user(id: &str) -> User {
        let now = Utc::now();
        User {
            id: id.to_string(),
            display_name: "Test".to_string(),
            email: None,
            skill_level: SkillLevel::Beginner,
            preferred_topics: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn completed(id: &str, minutes_ago: i64) -> CompletedTopic {
        CompletedTopic {
            topic_id: id.to_string(),
            topic_name: id.to_string(),
            category: Category::Css,
            score: 80.0,
            time_spent_minutes: 30.0,
            difficulty: Difficulty::Beginner,
            completed_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let store = InMemoryStore::new();
        assert!(store.create_user(user("u1")).await.unwrap().is_some());

        assert_eq!(store.get_user("u1").await.unwrap().unwrap().id, "u1");
        assert!(store.get_user("missing").await.unwrap().is_none());
        assert!(store.create_user(user("u1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_create_admits_exactly_one() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create_user(user("u1")).await.unwrap() })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_update_user() {
        let store = InMemoryStore::new();
        store.create_user(user("u1")).await.unwrap();

        let update = UpdateUserPayload {
            preferred_topics: Some(vec!["CSS".to_string()]),
            ..Default::default()
        };
        let updated = store.update_user("u1", update).await.unwrap().unwrap();
        assert_eq!(updated.preferred_topics, vec!["CSS".to_string()]);

        let missing = store
            .update_user("nobody", UpdateUserPayload::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_progress_is_appended_and_ordered() {
        let store = InMemoryStore::new();
        store.add_progress("u1", &completed("css-grid", 5)).await.unwrap();
        store.add_progress("u1", &completed("css-basics", 60)).await.unwrap();
        store.add_progress("u2", &completed("css-flexbox", 1)).await.unwrap();

        let history = store.list_completed_topics("u1").await.unwrap();
        let ids: Vec<&str> = history.iter().map(|h| h.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["css-basics", "css-grid"]);
        assert!(store.list_completed_topics("u3").await.unwrap().is_empty());
    }
}
