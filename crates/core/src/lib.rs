//! Pathwise Core
//!
//! Domain logic of the learning platform: the topic knowledge graph, the
//! embedding-based recommendation scorer, conversation memory, and the AI
//! mentor. Nothing in this crate knows about HTTP or databases.

pub mod embedding;
pub mod fallback;
pub mod llm_client;
pub mod memory;
pub mod mentor;
pub mod profile;
pub mod reasoning;
pub mod recommend;
pub mod similarity;
pub mod topic;
