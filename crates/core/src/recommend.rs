//! Topic Recommendation Scorer
//!
//! Ranks the topics a learner may study next by cosine similarity between the
//! learner's profile embedding and each eligible topic's embedding. A topic is
//! eligible when it is not yet completed and all of its prerequisites are.
//!
//! [`Recommender::respond`] wraps scoring in the request contract: malformed
//! input is rejected, internal failures degrade to a static list, and nothing
//! is ever raised to the caller.

use crate::embedding::{JitterSource, MAX_JITTER, profile_embedding, topic_embedding};
use crate::fallback::fallback_recommendations;
use crate::profile::{HistoryEntry, SkillLevel, UserLearningProfile};
use crate::reasoning::explain;
use crate::similarity::cosine_similarity;
use crate::topic::{Category, Difficulty, KnowledgeGraph, TopicId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_TOP_N: usize = 3;

/// A ranked suggestion for the next topic to study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub topic_id: TopicId,
    pub topic_name: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub estimated_minutes: u32,
    /// Relative ranking signal in `[0, 1]`; not a calibrated probability.
    pub confidence: f64,
    pub reasoning: String,
    pub prerequisites: Vec<TopicId>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("similarity for topic '{0}' is not a finite number")]
    NonFiniteScore(TopicId),
}

/// Raw recommendation request, validated by [`Recommender::respond`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub topic_history: Option<serde_json::Value>,
    #[serde(default)]
    pub skill_level: Option<String>,
    #[serde(default)]
    pub preferred_topics: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Every way a recommendation request can end.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationOutcome {
    /// Live scoring succeeded. May be empty.
    Ranked(Vec<Recommendation>),
    /// Live scoring failed; the static list is served instead.
    Fallback {
        recommendations: Vec<Recommendation>,
        reason: String,
    },
    /// The request itself was malformed.
    Rejected(String),
}

pub struct Recommender {
    graph: Arc<KnowledgeGraph>,
    jitter: Arc<dyn JitterSource>,
    amplitude: f64,
}

impl Recommender {
    /// `amplitude` bounds both the embedding jitter and the exploration bonus
    /// and is capped at [`MAX_JITTER`].
    pub fn new(graph: Arc<KnowledgeGraph>, jitter: Arc<dyn JitterSource>, amplitude: f64) -> Self {
        Self {
            graph,
            jitter,
            amplitude: amplitude.clamp(0.0, MAX_JITTER),
        }
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Scores every eligible topic and returns the best `top_n`.
    ///
    /// Topics in `completed` or in the profile history are excluded, as are
    /// topics with an unmet prerequisite.
    pub fn recommend(
        &self,
        profile: &UserLearningProfile,
        completed: &HashSet<TopicId>,
        top_n: usize,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let mut done = profile.completed_ids();
        done.extend(completed.iter().cloned());

        let user_vec = profile_embedding(profile);
        let mut scored = Vec::new();
        for node in self.graph.nodes() {
            if done.contains(&node.id) {
                continue;
            }
            if !node.prerequisites.iter().all(|p| done.contains(p)) {
                continue;
            }

            let topic_vec = topic_embedding(node, self.jitter.as_ref(), self.amplitude);
            let similarity = cosine_similarity(user_vec.as_slice(), topic_vec.as_slice());
            let exploration = self.jitter.sample(self.amplitude);
            let confidence = similarity + exploration;
            if !confidence.is_finite() {
                return Err(RecommendError::NonFiniteScore(node.id.clone()));
            }
            scored.push((node, confidence.clamp(0.0, 1.0)));
        }

        // Stable sort keeps graph order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_n);
        debug!(eligible = scored.len(), top_n, "Scored candidate topics");

        Ok(scored
            .into_iter()
            .map(|(node, confidence)| Recommendation {
                topic_id: node.id.clone(),
                topic_name: node.name.clone(),
                category: node.category,
                difficulty: node.difficulty,
                estimated_minutes: node.estimated_minutes,
                confidence,
                reasoning: explain(node, &profile.history, confidence),
                prerequisites: node.prerequisites.clone(),
            })
            .collect())
    }

    /// Like [`Recommender::recommend`] but degrades to the static list on failure.
    pub fn recommend_or_fallback(
        &self,
        profile: &UserLearningProfile,
        completed: &HashSet<TopicId>,
        top_n: usize,
    ) -> RecommendationOutcome {
        match self.recommend(profile, completed, top_n) {
            Ok(recommendations) => RecommendationOutcome::Ranked(recommendations),
            Err(e) => {
                warn!(error = %e, "Recommendation scoring failed, serving fallback list");
                RecommendationOutcome::Fallback {
                    recommendations: fallback_recommendations(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Validates a raw request and produces recommendations for it.
    pub fn respond(&self, request: RecommendationRequest, default_top_n: usize) -> RecommendationOutcome {
        let has_user = request
            .user_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if !has_user {
            return RecommendationOutcome::Rejected("userId is required".to_string());
        }

        let Some(serde_json::Value::Array(items)) = request.topic_history else {
            return RecommendationOutcome::Rejected("topicHistory must be an array".to_string());
        };

        let history = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<HistoryEntry>(item) {
                Ok(entry) => {
                    let completed = entry.into_completed(&self.graph);
                    if completed.is_none() {
                        warn!("Skipping history entry that names no known topic or category");
                    }
                    completed
                }
                Err(e) => {
                    warn!(error = %e, "Skipping malformed history entry");
                    None
                }
            })
            .collect();

        let skill_level = match request.skill_level.as_deref() {
            None => SkillLevel::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Unknown skill level, assuming beginner");
                SkillLevel::default()
            }),
        };

        let profile = UserLearningProfile::new(skill_level, request.preferred_topics, history);
        let top_n = request.limit.unwrap_or(default_top_n);
        self.recommend_or_fallback(&profile, &HashSet::new(), top_n)
    }
}
