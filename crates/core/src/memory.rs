//! Conversation Memory
//!
//! Stores past mentor interactions and retrieves the ones most relevant to a
//! new question. Two stores are provided:
//!
//! - [`LocalMemoryStore`]: in-process, scored by naive topic/category/keyword
//!   overlap. Used on its own or as the fallback of the remote store.
//! - [`RemoteMemoryStore`]: delegates to an external vector-memory service over
//!   HTTP and falls back to its local copy on any failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

const TOPIC_WEIGHT: f64 = 0.5;
const CATEGORY_WEIGHT: f64 = 0.3;
const KEYWORD_WEIGHT: f64 = 0.5;
const MIN_KEYWORD_CHARS: usize = 4;

/// Id of the canned memory returned when a user has no history yet.
pub const PLACEHOLDER_MEMORY_ID: &str = "placeholder-memory";

/// An interaction to remember.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInteraction {
    pub user_id: String,
    pub question: String,
    pub response: String,
    pub topic: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredInteraction {
    pub id: String,
    pub user_id: String,
    pub question: String,
    pub response: String,
    pub topic: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredInteraction {
    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_MEMORY_ID
    }

    fn placeholder(query: &MemoryQuery) -> Self {
        Self {
            id: PLACEHOLDER_MEMORY_ID.to_string(),
            user_id: query.user_id.clone(),
            question: format!("What should I focus on first in {}?", query.topic),
            response: "Start with the fundamentals and practise with small exercises \
                       before moving on to larger projects."
                .to_string(),
            topic: query.topic.clone(),
            category: query.category.clone(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryQuery {
    pub user_id: String,
    pub question: String,
    pub topic: String,
    #[serde(default)]
    pub category: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    #[serde(flatten)]
    pub interaction: StoredInteraction,
    pub score: f64,
}

/// Persistence for mentor interactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn store(&self, interaction: NewInteraction) -> Result<StoredInteraction>;

    /// Returns up to `query.limit` memories, best first.
    async fn retrieve(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>>;
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
        .map(str::to_lowercase)
        .collect()
}

fn same_label(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Relevance of a stored interaction to a query.
///
/// `0.5 * topic match + 0.3 * category match + 0.5 * keyword overlap`, where
/// keyword overlap is the share of the query's words longer than three
/// characters that also appear in the stored question.
pub fn similarity(query: &MemoryQuery, entry: &StoredInteraction) -> f64 {
    let mut score = 0.0;
    if same_label(&query.topic, &entry.topic) {
        score += TOPIC_WEIGHT;
    }
    if let (Some(q), Some(e)) = (&query.category, &entry.category) {
        if same_label(q, e) {
            score += CATEGORY_WEIGHT;
        }
    }

    let query_words = keywords(&query.question);
    if !query_words.is_empty() {
        let entry_words = keywords(&entry.question);
        let shared = query_words.intersection(&entry_words).count();
        score += KEYWORD_WEIGHT * shared as f64 / query_words.len() as f64;
    }
    score
}

/// In-process memory, bounded per user.
pub struct LocalMemoryStore {
    capacity: usize,
    entries: RwLock<HashMap<String, VecDeque<StoredInteraction>>>,
}

impl LocalMemoryStore {
    /// Keeps at most `capacity` interactions per user, evicting the oldest.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn insert(&self, stored: StoredInteraction) {
        let mut entries = self.entries.write().await;
        let user_entries = entries.entry(stored.user_id.clone()).or_default();
        if user_entries.len() == self.capacity {
            user_entries.pop_front();
        }
        user_entries.push_back(stored);
    }
}

#[async_trait]
impl MemoryStore for LocalMemoryStore {
    async fn store(&self, interaction: NewInteraction) -> Result<StoredInteraction> {
        let stored = StoredInteraction {
            id: Uuid::new_v4().to_string(),
            user_id: interaction.user_id,
            question: interaction.question,
            response: interaction.response,
            topic: interaction.topic,
            category: interaction.category,
            created_at: Utc::now(),
        };
        self.insert(stored.clone()).await;
        Ok(stored)
    }

    async fn retrieve(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>> {
        let entries = self.entries.read().await;
        let Some(user_entries) = entries.get(&query.user_id).filter(|e| !e.is_empty()) else {
            debug!(user_id = %query.user_id, "No stored memories, returning placeholder");
            return Ok(placeholder_memories(query));
        };

        let mut scored: Vec<ScoredMemory> = user_entries
            .iter()
            .map(|entry| ScoredMemory {
                score: similarity(query, entry),
                interaction: entry.clone(),
            })
            .filter(|m| m.score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(query.limit);
        Ok(scored)
    }
}

/// What a user with no history at all gets back from any store.
fn placeholder_memories(query: &MemoryQuery) -> Vec<ScoredMemory> {
    vec![ScoredMemory {
        interaction: StoredInteraction::placeholder(query),
        score: 0.0,
    }]
}

#[derive(Debug, Deserialize)]
struct RemoteRetrieveResponse {
    #[serde(default)]
    memories: Vec<RemoteMemory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteMemory {
    #[serde(default)]
    id: Option<String>,
    question: String,
    response: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl RemoteMemory {
    fn into_scored(self, query: &MemoryQuery) -> ScoredMemory {
        ScoredMemory {
            interaction: StoredInteraction {
                id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                user_id: query.user_id.clone(),
                question: self.question,
                response: self.response,
                topic: self.topic.unwrap_or_else(|| query.topic.clone()),
                category: self.category,
                created_at: self.created_at.unwrap_or_else(Utc::now),
            },
            score: self.score,
        }
    }
}

/// Client for an external vector-memory service exposing `POST /store` and
/// `POST /retrieve`. Every interaction is mirrored into a local store that
/// serves reads whenever the service is unreachable or misbehaves.
pub struct RemoteMemoryStore {
    client: reqwest::Client,
    base_url: String,
    local: LocalMemoryStore,
}

impl RemoteMemoryStore {
    pub fn new(base_url: &str, timeout: Duration, local: LocalMemoryStore) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build memory service HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            local,
        })
    }

    async fn remote_store(&self, interaction: &NewInteraction) -> Result<()> {
        self.client
            .post(format!("{}/store", self.base_url))
            .json(interaction)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn remote_retrieve(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>> {
        let body: RemoteRetrieveResponse = self
            .client
            .post(format!("{}/retrieve", self.base_url))
            .json(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let mut memories: Vec<ScoredMemory> = body
            .memories
            .into_iter()
            .map(|m| m.into_scored(query))
            .collect();
        memories.truncate(query.limit);
        Ok(memories)
    }
}

#[async_trait]
impl MemoryStore for RemoteMemoryStore {
    async fn store(&self, interaction: NewInteraction) -> Result<StoredInteraction> {
        if let Err(e) = self.remote_store(&interaction).await {
            warn!(error = %e, "Memory service store failed, keeping local copy only");
        }
        self.local.store(interaction).await
    }

    async fn retrieve(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>> {
        match self.remote_retrieve(query).await {
            Ok(memories) if memories.is_empty() => {
                debug!(user_id = %query.user_id, "Memory service has nothing, returning placeholder");
                Ok(placeholder_memories(query))
            }
            Ok(memories) => Ok(memories),
            Err(e) => {
                warn!(error = %e, "Memory service retrieve failed, using local memories");
                self.local.retrieve(query).await
            }
        }
    }
}
