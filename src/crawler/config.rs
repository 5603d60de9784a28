//! # Crawler Configuration Module
//!
//! Budgets, politeness and extraction settings for the crawler, with a
//! builder for fluent construction.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: The main configuration struct with crawler parameters
//! - `CrawlerConfigBuilder`: Builder pattern implementation for easier configuration
//!
//! ## Features
//!
//! - Defaults sized for small-to-medium informational sites
//! - Depth, page and fan-out budgets that bound a run's cost
//! - Content selection via CSS selectors
//! - Exclusion selectors for boilerplate (navigation, headers, footers, forms)
//! - Education-domain keywords that prioritise likely-relevant links

use std::time::Duration;

/// Browser-like User-Agent; some school sites reject unidentified clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Number of depth levels to visit (level 0 is the seed)
    pub max_depth: u32,

    /// Maximum number of pages to collect
    pub max_pages: u32,

    /// Delay in milliseconds between fetches
    pub rate_limit_ms: u64,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User agent to use for requests
    pub user_agent: String,

    /// Maximum number of new links enqueued from a single page
    pub max_links_per_page: usize,

    /// Maximum number of URLs queued for one depth level
    pub max_frontier_per_level: usize,

    /// Minimum body length (in characters) for a page to be kept
    pub min_content_chars: usize,

    /// CSS selectors tried, in order, for the main content region
    pub content_selectors: Vec<String>,

    /// CSS selectors for elements removed before text extraction
    pub exclude_selectors: Vec<String>,

    /// Keywords that mark a link as likely relevant
    pub relevance_keywords: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 20,
            rate_limit_ms: 1000,
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_links_per_page: 5,
            max_frontier_per_level: 50,
            min_content_chars: 200,
            content_selectors: [
                "main",
                "article",
                "[role='main']",
                "#content",
                ".content",
                "#main",
                ".main-content",
                ".entry-content",
                ".post-content",
                "body",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_selectors: [
                "script", "style", "noscript", "template", "nav", "header", "footer", "form",
                "iframe", "frame", "object", "embed", "svg",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            relevance_keywords: [
                "curso",
                "course",
                "programa",
                "program",
                "inscripcion",
                "inscripción",
                "enrollment",
                "enrolment",
                "admision",
                "admisión",
                "admission",
                "nivel",
                "inicial",
                "primaria",
                "secundaria",
                "academic",
                "academico",
                "académico",
                "arancel",
                "tuition",
                "calendario",
                "calendar",
                "horario",
                "schedule",
                "contacto",
                "contact",
                "institucional",
                "about",
                "niveles",
                "talleres",
                "actividades",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the number of depth levels to crawl
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Set the maximum number of pages to collect
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the delay in milliseconds between fetches
    pub fn rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.config.rate_limit_ms = rate_limit_ms;
        self
    }

    /// Set the per-request timeout in seconds
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the per-page link fan-out
    pub fn max_links_per_page(mut self, max_links_per_page: usize) -> Self {
        self.config.max_links_per_page = max_links_per_page;
        self
    }

    /// Set the per-level frontier cap
    pub fn max_frontier_per_level(mut self, max_frontier_per_level: usize) -> Self {
        self.config.max_frontier_per_level = max_frontier_per_level;
        self
    }

    /// Set the minimum body length for a page to be kept
    pub fn min_content_chars(mut self, min_content_chars: usize) -> Self {
        self.config.min_content_chars = min_content_chars;
        self
    }

    /// Set the CSS selectors for content to include
    pub fn content_selectors(mut self, content_selectors: Vec<String>) -> Self {
        self.config.content_selectors = content_selectors;
        self
    }

    /// Set the CSS selectors for elements to exclude
    pub fn exclude_selectors(mut self, exclude_selectors: Vec<String>) -> Self {
        self.config.exclude_selectors = exclude_selectors;
        self
    }

    /// Set the relevance keywords used to prioritise links
    pub fn relevance_keywords(mut self, relevance_keywords: Vec<String>) -> Self {
        self.config.relevance_keywords = relevance_keywords;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the rate limit as a Duration
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
