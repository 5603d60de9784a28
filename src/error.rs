//! Error types for the school assistant crate

use thiserror::Error;

/// Result type for school assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for school assistant operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Web crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Knowledge store error
    #[error("Knowledge store error: {0}")]
    Knowledge(String),

    /// Corpus reconciliation error
    #[error("Reconcile error: {0}")]
    Reconcile(String),

    /// Answer generation error
    #[error("Generation error: {0}")]
    Generation(String),
}
