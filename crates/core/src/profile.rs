//! Learner history and the derived learning profile.

use crate::topic::{Category, Difficulty, KnowledgeGraph, ParseEnumError, TopicId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Self-reported skill level of a learner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }

    /// The difficulty slot this level lines up with in embeddings.
    pub fn as_difficulty(self) -> Difficulty {
        match self {
            SkillLevel::Beginner => Difficulty::Beginner,
            SkillLevel::Intermediate => Difficulty::Intermediate,
            SkillLevel::Advanced => Difficulty::Advanced,
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            _ => Err(ParseEnumError {
                kind: "skill level",
                value: s.to_string(),
            }),
        }
    }
}

/// A finished topic in a learner's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTopic {
    pub topic_id: TopicId,
    pub topic_name: String,
    pub category: Category,
    /// Score in `[0, 100]`.
    pub score: f64,
    pub time_spent_minutes: f64,
    pub difficulty: Difficulty,
    pub completed_at: DateTime<Utc>,
}

/// Loosely-typed history entry as sent by clients. Missing fields are filled
/// in from the knowledge graph by [`HistoryEntry::into_completed`].
///
/// Every field parses leniently: a value of the wrong shape (an unknown
/// category, a `null` or textual score) reads as absent instead of failing
/// the whole entry, so a known `topicId` always survives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub topic_id: Option<TopicId>,
    #[serde(default, deserialize_with = "lenient")]
    pub topic_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub time_spent_minutes: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, deserialize_with = "lenient")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number_from(&Value::deserialize(deserializer)?))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_number(deserializer)?.unwrap_or(0.0))
}

impl HistoryEntry {
    /// Normalizes the entry against the graph. Returns `None` when the entry
    /// names no resolvable topic and carries no category of its own.
    pub fn into_completed(self, graph: &KnowledgeGraph) -> Option<CompletedTopic> {
        let node = self
            .topic_id
            .as_deref()
            .and_then(|id| graph.get(id))
            .or_else(|| self.topic_name.as_deref().and_then(|name| graph.resolve(name)));

        let topic_id = node
            .map(|n| n.id.clone())
            .or(self.topic_id)
            .filter(|id| !id.trim().is_empty())?;
        let category = self.category.or(node.map(|n| n.category))?;
        let difficulty = self
            .difficulty
            .or(node.map(|n| n.difficulty))
            .unwrap_or(Difficulty::Beginner);
        let topic_name = self
            .topic_name
            .or(node.map(|n| n.name.clone()))
            .unwrap_or_else(|| topic_id.clone());
        let time_spent_minutes = self
            .time_spent_minutes
            .or(node.map(|n| n.estimated_minutes as f64))
            .unwrap_or(0.0)
            .max(0.0);

        Some(CompletedTopic {
            topic_id,
            topic_name,
            category,
            score: clamp_score(self.score),
            time_spent_minutes,
            difficulty,
            completed_at: self.completed_at.unwrap_or_else(Utc::now),
        })
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Per-request view of a learner, rebuilt for every recommendation.
#[derive(Debug, Clone, Default)]
pub struct UserLearningProfile {
    pub skill_level: SkillLevel,
    pub preferred_topics: Vec<String>,
    pub history: Vec<CompletedTopic>,
}

impl UserLearningProfile {
    pub fn new(
        skill_level: SkillLevel,
        preferred_topics: Vec<String>,
        history: Vec<CompletedTopic>,
    ) -> Self {
        Self {
            skill_level,
            preferred_topics,
            history,
        }
    }

    pub fn completed_ids(&self) -> HashSet<TopicId> {
        self.history.iter().map(|h| h.topic_id.clone()).collect()
    }

    /// Average score of the history entries in `category`, if there are any.
    pub fn category_average(&self, category: Category) -> Option<f64> {
        category_average(&self.history, category)
    }
}

pub(crate) fn category_average(history: &[CompletedTopic], category: Category) -> Option<f64> {
    let scores: Vec<f64> = history
        .iter()
        .filter(|h| h.category == category)
        .map(|h| h.score)
        .collect();
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}
