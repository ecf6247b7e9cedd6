use crate::recommend::Recommendation;
use crate::topic::{Category, Difficulty};

const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Static recommendations served when live scoring is unavailable.
pub fn fallback_recommendations() -> Vec<Recommendation> {
    vec![
        Recommendation {
            topic_id: "javascript-basics".to_string(),
            topic_name: "JavaScript Basics".to_string(),
            category: Category::Javascript,
            difficulty: Difficulty::Beginner,
            estimated_minutes: 120,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: "A solid foundation for every web development path.".to_string(),
            prerequisites: vec![],
        },
        Recommendation {
            topic_id: "css-basics".to_string(),
            topic_name: "CSS Fundamentals".to_string(),
            category: Category::Css,
            difficulty: Difficulty::Beginner,
            estimated_minutes: 90,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: "Styling skills pair well with any front-end topic.".to_string(),
            prerequisites: vec![],
        },
        Recommendation {
            topic_id: "javascript-es6".to_string(),
            topic_name: "Modern JavaScript (ES6+)".to_string(),
            category: Category::Javascript,
            difficulty: Difficulty::Intermediate,
            estimated_minutes: 90,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: "Modern syntax used throughout current frameworks.".to_string(),
            prerequisites: vec!["javascript-basics".to_string()],
        },
    ]
}
