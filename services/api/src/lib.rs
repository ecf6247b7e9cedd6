//! Pathwise API Library Crate
//!
//! This library contains the web service around `pathwise-core`: configuration,
//! learner storage, API handlers and routing. The `api` binary is a thin
//! wrapper around this library.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod store;
