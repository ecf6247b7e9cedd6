//! Human-readable justifications for recommendations.

use crate::profile::{CompletedTopic, category_average};
use crate::topic::TopicNode;

const STRONG_CATEGORY_AVERAGE: f64 = 80.0;
const WEAK_CATEGORY_AVERAGE: f64 = 60.0;
const HIGH_CONFIDENCE: f64 = 0.8;
const MEDIUM_CONFIDENCE: f64 = 0.5;

/// Generates the reasoning string for recommending `topic`.
pub fn explain(topic: &TopicNode, history: &[CompletedTopic], confidence: f64) -> String {
    let category = topic.category.display_name();
    let mut parts = Vec::with_capacity(3);

    parts.push(match category_average(history, topic.category) {
        Some(avg) if avg >= STRONG_CATEGORY_AVERAGE => format!(
            "You averaged {:.0}% in {} topics, so you are ready for {}.",
            avg, category, topic.name
        ),
        Some(avg) if avg < WEAK_CATEGORY_AVERAGE => format!(
            "Strengthens your {} foundations before you move on.",
            category
        ),
        Some(_) => format!("Builds on your progress in {}.", category),
        None => format!("Expands your skills into {}.", category),
    });

    if !topic.prerequisites.is_empty() {
        parts.push("You have completed all of its prerequisites.".to_string());
    }

    parts.push(
        if confidence >= HIGH_CONFIDENCE {
            "Strong match for your learning profile."
        } else if confidence >= MEDIUM_CONFIDENCE {
            "Good fit for your current level."
        } else {
            "Broadens your learning path."
        }
        .to_string(),
    );

    parts.join(" ")
}
