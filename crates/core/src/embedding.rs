//! Feature vectors for topics and learner profiles.
//!
//! Both builders produce an [`Embedding`] of the same fixed length so the
//! scorer can compare them slot by slot:
//!
//! | slots        | topic                         | profile                          |
//! |--------------|-------------------------------|----------------------------------|
//! | `0..C`       | one-hot category              | average score / 100 per category |
//! | `C..C+3`     | one-hot difficulty            | one-hot skill level              |
//! | `C+3`        | minutes / 200 (+ jitter)      | average time spent / 120         |
//! | `C+4`        | prerequisite count / 5        | 1.0 if any history               |
//! | `C+5`        | successor count / 5           | preferred topic count / 5        |

use crate::profile::UserLearningProfile;
use crate::topic::{Category, Difficulty, TopicNode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

const CATEGORY_SLOTS: usize = Category::ALL.len();
const DIFFICULTY_OFFSET: usize = CATEGORY_SLOTS;
const DURATION_SLOT: usize = DIFFICULTY_OFFSET + Difficulty::ALL.len();
const PREREQ_SLOT: usize = DURATION_SLOT + 1;
const SUCCESSOR_SLOT: usize = PREREQ_SLOT + 1;

/// Length of every topic and profile embedding.
pub const EMBEDDING_DIM: usize = SUCCESSOR_SLOT + 1;

/// Upper bound for any jitter amplitude.
pub const MAX_JITTER: f64 = 0.1;

const DURATION_NORM: f64 = 200.0;
const TIME_SPENT_NORM: f64 = 120.0;
const COUNT_NORM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Embedding(pub [f64; EMBEDDING_DIM]);

impl Embedding {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Source of the small random terms added for tie-breaking and exploration.
pub trait JitterSource: Send + Sync {
    /// Returns a value in `[0, amplitude)`, or 0 when `amplitude <= 0`.
    fn sample(&self, amplitude: f64) -> f64;
}

/// Always returns 0; makes scoring fully deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self, _amplitude: f64) -> f64 {
        0.0
    }
}

/// Reproducible jitter from a seeded generator.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn sample(&self, amplitude: f64) -> f64 {
        let amplitude = amplitude.min(MAX_JITTER);
        if amplitude <= 0.0 {
            return 0.0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_range(0.0..amplitude)
    }
}

/// Jitter from the thread-local generator, used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadJitter;

impl JitterSource for ThreadJitter {
    fn sample(&self, amplitude: f64) -> f64 {
        let amplitude = amplitude.min(MAX_JITTER);
        if amplitude <= 0.0 {
            return 0.0;
        }
        rand::rng().random_range(0.0..amplitude)
    }
}

/// Builds the feature vector of a topic.
pub fn topic_embedding(topic: &TopicNode, jitter: &dyn JitterSource, amplitude: f64) -> Embedding {
    let mut v = [0.0; EMBEDDING_DIM];
    v[topic.category.index()] = 1.0;
    v[DIFFICULTY_OFFSET + topic.difficulty.index()] = 1.0;
    v[DURATION_SLOT] = topic.estimated_minutes as f64 / DURATION_NORM + jitter.sample(amplitude);
    v[PREREQ_SLOT] = topic.prerequisites.len() as f64 / COUNT_NORM;
    v[SUCCESSOR_SLOT] = topic.successors.len() as f64 / COUNT_NORM;
    Embedding(v)
}

/// Builds the feature vector of a learner.
pub fn profile_embedding(profile: &UserLearningProfile) -> Embedding {
    let mut v = [0.0; EMBEDDING_DIM];
    for category in Category::ALL {
        if let Some(avg) = profile.category_average(category) {
            v[category.index()] = avg / 100.0;
        }
    }
    v[DIFFICULTY_OFFSET + profile.skill_level.as_difficulty().index()] = 1.0;

    if !profile.history.is_empty() {
        let total: f64 = profile.history.iter().map(|h| h.time_spent_minutes).sum();
        v[DURATION_SLOT] = total / profile.history.len() as f64 / TIME_SPENT_NORM;
        v[PREREQ_SLOT] = 1.0;
    }
    v[SUCCESSOR_SLOT] = profile.preferred_topics.len() as f64 / COUNT_NORM;
    Embedding(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{HistoryEntry, SkillLevel};
    use crate::topic::KnowledgeGraph;
    use approx::assert_relative_eq;

    #[test]
    fn test_topic_embedding_layout() {
        let graph = KnowledgeGraph::builtin();
        let node = graph.get("javascript-basics").unwrap();
        let e = topic_embedding(node, &NoJitter, MAX_JITTER);

        assert_eq!(e.0[Category::Javascript.index()], 1.0);
        assert_eq!(e.0[..CATEGORY_SLOTS].iter().sum::<f64>(), 1.0);
        assert_eq!(e.0[DIFFICULTY_OFFSET + Difficulty::Beginner.index()], 1.0);
        assert_relative_eq!(e.0[DURATION_SLOT], 0.6);
        assert_eq!(e.0[PREREQ_SLOT], 0.0);
        assert_relative_eq!(e.0[SUCCESSOR_SLOT], 0.6);
    }

    #[test]
    fn test_topic_embedding_jitter_is_bounded() {
        let graph = KnowledgeGraph::builtin();
        let node = graph.get("css-grid").unwrap();
        let base = topic_embedding(node, &NoJitter, 0.0);
        let jitter = SeededJitter::new(7);
        for _ in 0..100 {
            let e = topic_embedding(node, &jitter, MAX_JITTER);
            let delta = e.0[DURATION_SLOT] - base.0[DURATION_SLOT];
            assert!(delta >= 0.0 && delta <= MAX_JITTER + 1e-9);
        }
    }

    #[test]
    fn test_amplitude_is_capped() {
        let jitter = SeededJitter::new(1);
        for _ in 0..100 {
            assert!(jitter.sample(5.0) < MAX_JITTER);
            assert!(ThreadJitter.sample(5.0) < MAX_JITTER);
        }
        assert_eq!(jitter.sample(0.0), 0.0);
        assert_eq!(ThreadJitter.sample(-1.0), 0.0);
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        for _ in 0..10 {
            assert_eq!(a.sample(0.1), b.sample(0.1));
        }
    }

    #[test]
    fn test_profile_embedding_without_history() {
        let profile = UserLearningProfile::new(SkillLevel::Intermediate, vec![], vec![]);
        let e = profile_embedding(&profile);

        assert!(e.0[..CATEGORY_SLOTS].iter().all(|&x| x == 0.0));
        assert_eq!(e.0[DIFFICULTY_OFFSET + Difficulty::Intermediate.index()], 1.0);
        assert_eq!(e.0[DURATION_SLOT], 0.0);
        assert_eq!(e.0[PREREQ_SLOT], 0.0);
        assert_eq!(e.0[SUCCESSOR_SLOT], 0.0);
    }

    #[test]
    fn test_profile_embedding_with_history() {
        let graph = KnowledgeGraph::builtin();
        let history = vec![
            HistoryEntry {
                topic_id: Some("javascript-basics".into()),
                score: 90.0,
                time_spent_minutes: Some(60.0),
                ..Default::default()
            }
            .into_completed(&graph)
            .unwrap(),
        ];
        let profile = UserLearningProfile::new(
            SkillLevel::Beginner,
            vec!["JavaScript".into()],
            history,
        );
        let e = profile_embedding(&profile);

        assert_relative_eq!(e.0[Category::Javascript.index()], 0.9);
        assert_eq!(e.0[Category::Css.index()], 0.0);
        assert_relative_eq!(e.0[DURATION_SLOT], 0.5);
        assert_eq!(e.0[PREREQ_SLOT], 1.0);
        assert_relative_eq!(e.0[SUCCESSOR_SLOT], 0.2);
    }
}
