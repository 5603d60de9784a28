//! # Website Crawler Module
//!
//! This module turns a school website into a deduplicated list of
//! [`PageRecord`]s. It is the first stage of the pipeline: the pages it
//! produces are reconciled against the stored corpus and then handed to the
//! answer generator.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: budgets, politeness delay and extraction selectors
//! - `normalize`: canonical URL identity used for dedup
//! - `extract_links`: same-domain candidate discovery with a denylist and
//!   keyword heuristics
//! - `extract_content`: title and cleaned plain-text body
//! - `HttpFetcher`: one GET per URL with timeout, User-Agent and content-type
//!   gating
//! - `Crawler`: breadth-first driver over depth levels
//!
//! ## Usage
//!
//! ```rust,no_run
//! use school_assistant::crawler::{crawl_website, CrawlerConfig};
//!
//! # async fn run() -> Result<(), school_assistant::crawler::CrawlError> {
//! let config = CrawlerConfig::builder().max_pages(20).max_depth(3).build();
//! let pages = crawl_website("https://example.edu/", config).await?;
//! println!("crawled {} pages", pages.len());
//! # Ok(())
//! # }
//! ```

mod config;
mod content_extraction;
mod error;
mod fetcher;
mod links;
mod normalize;
mod scheduler;
#[cfg(test)]
pub(crate) mod test_support;

pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use content_extraction::{clean_text, extract_content, ExtractedContent};
pub use error::{CrawlError, FetchError};
pub use fetcher::{FetchedPage, HttpFetcher, PageFetcher};
pub use links::{extract_links, is_denied};
pub use normalize::normalize;
pub use scheduler::{crawl_website, CrawlReport, CrawlState, Crawler, PageOutcome};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One crawled unit of knowledge, keyed by its canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Canonical URL of the page
    pub url: String,

    /// Best-effort human-readable label
    pub title: String,

    /// Cleaned plain-text content
    pub body: String,

    /// SHA-256 hex digest of `body`
    pub content_hash: String,

    /// Time of the crawl that created or last changed this record
    pub last_updated: DateTime<Utc>,
}

impl PageRecord {
    /// Build a record stamped with the current time; the hash is always
    /// derived from `body`.
    pub fn new(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_timestamp(url, title, body, Utc::now())
    }

    /// Build a record with an explicit timestamp
    pub fn with_timestamp(
        url: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let body = body.into();
        Self {
            url: url.into(),
            title: title.into(),
            content_hash: content_hash(&body),
            body,
            last_updated,
        }
    }
}

/// Digest of an extracted body, the only change-detection signal.
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = content_hash("Inscripciones abiertas");
        let b = content_hash("Inscripciones abiertas");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash("Inscripciones cerradas"));
    }

    #[test]
    fn test_page_record_hash_follows_body() {
        let page = PageRecord::new("https://example.edu/admisiones", "Admisiones", "Texto");
        assert_eq!(page.content_hash, content_hash("Texto"));
        assert_eq!(page.url, "https://example.edu/admisiones");
        assert_eq!(page.title, "Admisiones");
    }
}
