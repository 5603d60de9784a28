//! Error types for the crawler module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for crawler operations that abort a whole run
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The seed URL has no host to restrict the crawl to
    #[error("Seed URL has no host: {0}")]
    InvalidSeed(String),
}

/// Failure to fetch one URL; recorded against that URL, never fatal to a run
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the timeout
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// The server answered with a non-2xx status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The response is not an HTML document
    #[error("unsupported content type '{content_type}' for {url}")]
    ContentType { url: String, content_type: String },

    /// DNS, connection or body read failure
    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The URL could not be requested at all
    #[error("invalid URL {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// URL the failure belongs to
    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url }
            | FetchError::Status { url, .. }
            | FetchError::ContentType { url, .. }
            | FetchError::Network { url, .. }
            | FetchError::InvalidUrl { url } => url,
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_builder() {
            FetchError::InvalidUrl {
                url: url.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Http(e) => CrateError::Http(e),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}
