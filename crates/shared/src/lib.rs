//! Shared library for the adaptive web knowledge acquisition engine.
//!
//! This crate provides common functionality used across all binary crates:
//! - Configuration management
//! - Database plumbing and the TTL analysis cache
//! - Core data models (characteristics, strategies, jobs, knowledge nodes)
//! - Collaborator interfaces (keyword expansion, corpus writer)
//! - Logging infrastructure

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use cache::{AnalysisCache, CacheKeyspace, CacheStats};
pub use collaborators::{CorpusRecord, CorpusWriter, KeywordExpander};
pub use config::Config;
pub use db::Database;
pub use logging::LogConfig;
pub use models::*;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
