//! # School Assistant - website-backed chatbot for a school
//!
//! This crate keeps a corpus of a school's public website current and answers
//! questions from families and students over it.
//!
//! ## Features
//!
//! - Bounded breadth-first crawling of a single site:
//!   - URL normalization and deduplication
//!   - Link extraction with a denylist and relevance ordering
//!   - Main-content extraction with text cleanup
//!   - Per-URL failures that never abort a crawl
//! - Content-hash change detection and incremental reconciliation
//!   against a stored corpus (LibSQL)
//! - Knowledge store adapters (in-memory or a hosted vector store)
//! - Persona answer generation with rate-limited completion models
//! - Periodic background refresh
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use school_assistant::{assistant::Assistant, config::AppConfig, refresh};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env()?;
//!     let assistant = Arc::new(Assistant::from_config(&config).await?);
//!     assistant.initialize().await?;
//!
//!     let _refresh = refresh::spawn_periodic_refresh(assistant.clone(), config.update_interval);
//!
//!     let reply = assistant.reply("family-42", "¿Cuándo abren las inscripciones?").await;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

mod error;

pub mod assistant;
pub mod config;
pub mod model;
pub mod poll;
pub mod refresh;

// Corpus acquisition and storage
pub mod crawler;
pub mod index;
pub mod knowledge;
pub mod reconcile;

pub use error::{Error, Result};

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::assistant::{Assistant, HealthStatus};
    pub use crate::config::AppConfig;
    pub use crate::crawler::{Crawler, CrawlerConfig, PageRecord};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::reconcile::ReconciliationResult;
}
