//! API and Storage Models
//!
//! This module defines the request/response bodies of the REST API and the
//! learner records kept by the store. Domain types from `pathwise-core` are
//! embedded where they already have a stable JSON shape; `utoipa` sees them
//! as opaque objects.

use chrono::{DateTime, Utc};
use pathwise_core::{
    llm_client::ChatTurn,
    memory::{MemoryQuery, NewInteraction, ScoredMemory, StoredInteraction},
    mentor::{MentorReply, MentorRequest},
    profile::{CompletedTopic, HistoryEntry, SkillLevel},
    recommend::{Recommendation, RecommendationRequest},
    topic::{Category, Difficulty},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const DEFAULT_MEMORY_LIMIT: usize = 3;

/// A learner account.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[schema(example = "learner-42")]
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    #[schema(value_type = String, example = "beginner")]
    pub skill_level: SkillLevel,
    #[schema(example = json!(["JavaScript", "React"]))]
    pub preferred_topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[schema(example = "learner-42")]
    pub id: String,
    #[schema(example = "Ada")]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "beginner")]
    pub skill_level: Option<SkillLevel>,
    #[serde(default)]
    pub preferred_topics: Vec<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Deserialize, ToSchema, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "intermediate")]
    pub skill_level: Option<SkillLevel>,
    #[serde(default)]
    pub preferred_topics: Option<Vec<String>>,
}

impl UpdateUserPayload {
    /// Applies the present fields to `user` and bumps `updated_at`.
    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.display_name {
            user.display_name = name;
        }
        if let Some(email) = self.email {
            user.email = Some(email);
        }
        if let Some(level) = self.skill_level {
            user.skill_level = level;
        }
        if let Some(topics) = self.preferred_topics {
            user.preferred_topics = topics;
        }
        user.updated_at = Utc::now();
    }
}

/// A completed topic to append to a learner's history.
#[derive(Deserialize, ToSchema, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    #[schema(example = "javascript-basics")]
    pub topic_id: Option<String>,
    pub topic_name: Option<String>,
    #[schema(value_type = Option<String>, example = "javascript")]
    pub category: Option<Category>,
    #[schema(example = 90.0)]
    pub score: f64,
    pub time_spent_minutes: Option<f64>,
    #[schema(value_type = Option<String>, example = "beginner")]
    pub difficulty: Option<Difficulty>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ProgressPayload> for HistoryEntry {
    fn from(p: ProgressPayload) -> Self {
        HistoryEntry {
            topic_id: p.topic_id,
            topic_name: p.topic_name,
            category: p.category,
            score: p.score,
            time_spent_minutes: p.time_spent_minutes,
            difficulty: p.difficulty,
            completed_at: p.completed_at,
        }
    }
}

/// A stored history entry as returned by the progress endpoints.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub topic_id: String,
    pub topic_name: String,
    #[schema(value_type = String, example = "javascript")]
    pub category: Category,
    pub score: f64,
    pub time_spent_minutes: f64,
    #[schema(value_type = String, example = "beginner")]
    pub difficulty: Difficulty,
    pub completed_at: DateTime<Utc>,
}

impl From<CompletedTopic> for ProgressEntry {
    fn from(c: CompletedTopic) -> Self {
        ProgressEntry {
            topic_id: c.topic_id,
            topic_name: c.topic_name,
            category: c.category,
            score: c.score,
            time_spent_minutes: c.time_spent_minutes,
            difficulty: c.difficulty,
            completed_at: c.completed_at,
        }
    }
}

#[derive(Deserialize, IntoParams, Debug, Default)]
pub struct RecommendationParams {
    /// Maximum number of recommendations to return.
    pub limit: Option<usize>,
}

/// Stateless recommendation request. `topicHistory` is validated by the
/// recommender so that a wrong shape yields 400 rather than 422.
#[derive(Deserialize, ToSchema, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationPayload {
    #[serde(default)]
    #[schema(example = "learner-42")]
    pub user_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub topic_history: Option<serde_json::Value>,
    #[serde(default)]
    #[schema(example = "beginner")]
    pub skill_level: Option<String>,
    #[serde(default)]
    pub preferred_topics: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl From<RecommendationPayload> for RecommendationRequest {
    fn from(p: RecommendationPayload) -> Self {
        RecommendationRequest {
            user_id: p.user_id,
            topic_history: p.topic_history,
            skill_level: p.skill_level,
            preferred_topics: p.preferred_topics,
            limit: p.limit,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct RecommendationResponse {
    pub success: bool,
    /// True when the static list was served because live scoring failed.
    pub fallback: bool,
    #[schema(value_type = Vec<Object>)]
    pub recommendations: Vec<Recommendation>,
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoreMemoryPayload {
    pub user_id: String,
    pub question: String,
    pub response: String,
    #[schema(example = "React")]
    pub topic: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl From<StoreMemoryPayload> for NewInteraction {
    fn from(p: StoreMemoryPayload) -> Self {
        NewInteraction {
            user_id: p.user_id,
            question: p.question,
            response: p.response,
            topic: p.topic,
            category: p.category,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveMemoryPayload {
    pub user_id: String,
    pub question: String,
    pub topic: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl From<RetrieveMemoryPayload> for MemoryQuery {
    fn from(p: RetrieveMemoryPayload) -> Self {
        MemoryQuery {
            user_id: p.user_id,
            question: p.question,
            topic: p.topic,
            category: p.category,
            limit: p.limit.unwrap_or(DEFAULT_MEMORY_LIMIT),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct StoredMemoryResponse {
    #[schema(value_type = Object)]
    pub memory: StoredInteraction,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct MemoriesResponse {
    #[schema(value_type = Vec<Object>)]
    pub memories: Vec<ScoredMemory>,
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MentorChatPayload {
    pub user_id: String,
    #[schema(example = "Why does useEffect run twice?")]
    pub question: String,
    #[serde(default)]
    #[schema(example = "React")]
    pub topic: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Earlier turns as `{role, content}` objects, oldest first.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<ChatTurn>,
}

impl From<MentorChatPayload> for MentorRequest {
    fn from(p: MentorChatPayload) -> Self {
        MentorRequest {
            user_id: p.user_id,
            question: p.question,
            topic: p.topic,
            category: p.category,
            history: p.history,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MentorChatResponse {
    pub answer: String,
    /// True when the canned answer was served.
    pub fallback: bool,
    #[schema(value_type = Vec<Object>)]
    pub memories_used: Vec<ScoredMemory>,
}

impl From<MentorReply> for MentorChatResponse {
    fn from(r: MentorReply) -> Self {
        MentorChatResponse {
            answer: r.answer,
            fallback: r.fallback,
            memories_used: r.memories_used,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub topics: usize,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
