//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the learner store and the domain services.

use crate::{config::Config, store::LearnerStore};
use pathwise_core::{memory::MemoryStore, mentor::MentorService, recommend::Recommender};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LearnerStore>,
    pub recommender: Arc<Recommender>,
    pub memory: Arc<dyn MemoryStore>,
    pub mentor: Arc<MentorService>,
    pub config: Arc<Config>,
}
