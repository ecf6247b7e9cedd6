//! AI Mentor Chat
//!
//! Answers a learner's question with an LLM, grounding the prompt in the most
//! relevant past interactions. The mentor never fails: any upstream error or
//! timeout yields a canned answer flagged as a fallback.

use crate::llm_client::{ChatTurn, LLMClient};
use crate::memory::{MemoryQuery, MemoryStore, NewInteraction, ScoredMemory};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly programming mentor on a web development \
learning platform. Explain concepts step by step, prefer short code examples, and suggest a \
small exercise when it helps the learner practise.";

pub const FALLBACK_ANSWER: &str = "I can't reach the mentor service right now. Please try again \
in a moment; in the meantime, reviewing your latest topic's exercises is a great use of time.";

const GENERAL_TOPIC: &str = "general";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorRequest {
    pub user_id: String,
    pub question: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Earlier turns of the same conversation, oldest first.
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorReply {
    pub answer: String,
    pub fallback: bool,
    pub memories_used: Vec<ScoredMemory>,
}

pub struct MentorService {
    llm: Arc<dyn LLMClient>,
    memory: Arc<dyn MemoryStore>,
    system_prompt: String,
    timeout: Duration,
    memory_limit: usize,
}

impl MentorService {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        memory: Arc<dyn MemoryStore>,
        system_prompt: String,
        timeout: Duration,
        memory_limit: usize,
    ) -> Self {
        Self {
            llm,
            memory,
            system_prompt,
            timeout,
            memory_limit,
        }
    }

    #[instrument(name = "mentor_ask", skip_all, fields(user_id = %request.user_id))]
    pub async fn ask(&self, request: MentorRequest) -> MentorReply {
        let topic = request
            .topic
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| GENERAL_TOPIC.to_string());

        let query = MemoryQuery {
            user_id: request.user_id.clone(),
            question: request.question.clone(),
            topic: topic.clone(),
            category: request.category.clone(),
            limit: self.memory_limit,
        };
        let memories: Vec<ScoredMemory> = match self.memory.retrieve(&query).await {
            Ok(found) => found
                .into_iter()
                .filter(|m| !m.interaction.is_placeholder())
                .collect(),
            Err(e) => {
                warn!(error = %e, "Memory retrieval failed, answering without context");
                Vec::new()
            }
        };

        let prompt = compose_system_prompt(&self.system_prompt, &topic, &memories);
        let mut turns = request.history;
        turns.push(ChatTurn::user(request.question.clone()));

        let answer = match tokio::time::timeout(self.timeout, self.llm.complete(&prompt, turns)).await {
            Ok(Ok(answer)) if !answer.trim().is_empty() => answer,
            Ok(Ok(_)) => {
                warn!("LLM returned an empty answer");
                return fallback_reply();
            }
            Ok(Err(e)) => {
                warn!(error = %e, "LLM call failed");
                return fallback_reply();
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "LLM call timed out");
                return fallback_reply();
            }
        };

        let interaction = NewInteraction {
            user_id: request.user_id,
            question: request.question,
            response: answer.clone(),
            topic,
            category: request.category,
        };
        if let Err(e) = self.memory.store(interaction).await {
            warn!(error = %e, "Failed to remember mentor interaction");
        }

        info!(memories = memories.len(), "Mentor answered");
        MentorReply {
            answer,
            fallback: false,
            memories_used: memories,
        }
    }
}

fn fallback_reply() -> MentorReply {
    MentorReply {
        answer: FALLBACK_ANSWER.to_string(),
        fallback: true,
        memories_used: Vec::new(),
    }
}

fn compose_system_prompt(base: &str, topic: &str, memories: &[ScoredMemory]) -> String {
    let mut prompt = format!("{}\n\nCurrent topic: {}", base.trim(), topic);
    if !memories.is_empty() {
        prompt.push_str("\n\nRelevant earlier conversations with this learner:");
        for memory in memories {
            let _ = write!(
                prompt,
                "\n- Q: {}\n  A: {}",
                memory.interaction.question, memory.interaction.response
            );
        }
    }
    prompt
}
