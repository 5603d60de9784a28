//! # Knowledge Store Module
//!
//! Adapters that hold the corpus in a form the answer generator can use.
//!
//! ## Key Components
//!
//! - `KnowledgeStore`: save / list / delete-by-key seam used by the reconciler
//! - `MemoryKnowledgeStore`: in-process store
//! - `HostedKnowledgeStore`: OpenAI-compatible files and vector store API
//!
//! A store key identifies one stored artifact. Several artifacts may briefly
//! reference the same URL while a page is being replaced; the reconciler
//! removes the superseded ones.

mod hosted;
mod memory;
#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use thiserror::Error;

use crate::crawler::PageRecord;
use crate::error::Error as CrateError;

pub use hosted::{HostedKnowledgeStore, HostedStoreConfig};
pub use memory::MemoryKnowledgeStore;

/// What a store reports about one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    /// Store-assigned key
    pub key: String,

    /// Canonical URL of the page the artifact was built from
    pub url: String,

    /// Hash of the body it was built from, when the store keeps it
    pub content_hash: Option<String>,
}

/// Error type for knowledge store operations
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with an error status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The store's response could not be understood
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Asynchronous ingestion finished unsuccessfully
    #[error("Ingestion of {url} ended with status '{status}'")]
    Ingestion { url: String, status: String },

    /// Asynchronous ingestion did not finish within the wait budget
    #[error("Ingestion of {url} did not finish within {waited_secs}s")]
    Timeout { url: String, waited_secs: u64 },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<KnowledgeError> for CrateError {
    fn from(err: KnowledgeError) -> Self {
        CrateError::Knowledge(err.to_string())
    }
}

/// Retrieval backend holding page artifacts
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Store `page` and return the key of the artifact now representing it.
    ///
    /// A store may reuse the key of an earlier artifact for the same URL or
    /// issue a new one; artifacts with other keys for that URL are stale.
    async fn save_or_replace(&self, page: &PageRecord) -> Result<String, KnowledgeError>;

    /// Every artifact in the store
    async fn list_all(&self) -> Result<Vec<StoreRecord>, KnowledgeError>;

    /// Remove one artifact; removing an unknown key is not an error
    async fn delete_by_key(&self, key: &str) -> Result<(), KnowledgeError>;
}
