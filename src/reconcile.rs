//! # Corpus Reconciliation
//!
//! Diffs a fresh crawl against the stored corpus by URL and content hash and
//! applies the minimal set of updates.
//!
//! New and changed pages are written to the knowledge store first, then any
//! artifact the store still holds for the same URL under a different key is
//! removed, and only then is the corpus row overwritten. A failure at any of
//! these steps is recorded against that page and leaves its corpus row as it
//! was. Unchanged pages leave the corpus alone; when a knowledge store is
//! given and holds no artifact matching an unchanged page, the artifact is
//! re-saved. Reconciling the same crawl twice performs no mutation the second
//! time.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::crawler::PageRecord;
use crate::error::Error as CrateError;
use crate::index::{CorpusStore, DbError};
use crate::knowledge::{KnowledgeError, KnowledgeStore, StoreRecord};

/// How a fresh page relates to the stored corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    New,
    Changed,
    Unchanged,
}

/// A page whose update could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub url: String,
    pub error: String,
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    /// Classification of every fresh page, in input order
    pub classifications: Vec<(String, Classification)>,

    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,

    /// Number of fresh candidate pages
    pub total: usize,

    /// Pages written to the corpus
    pub applied: usize,

    /// Stale knowledge artifacts removed
    pub removed_artifacts: usize,

    /// Unchanged pages whose missing or outdated artifact was re-saved
    pub repaired: usize,

    /// Pages whose update failed; their stored state is unchanged
    pub failures: Vec<PageFailure>,
}

impl ReconciliationResult {
    /// Whether the corpus content changed
    pub fn has_updates(&self) -> bool {
        self.applied > 0
    }

    /// Classification recorded for `url`
    pub fn classification(&self, url: &str) -> Option<Classification> {
        self.classifications
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, c)| *c)
    }

    fn record(&mut self, url: &str, classification: Classification) {
        match classification {
            Classification::New => self.new += 1,
            Classification::Changed => self.changed += 1,
            Classification::Unchanged => self.unchanged += 1,
        }
        self.classifications.push((url.to_string(), classification));
    }
}

/// Failures that stop a reconciliation as a whole
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The stored corpus could not be read
    #[error("Failed to load corpus: {0}")]
    LoadCorpus(#[source] DbError),

    /// The knowledge store could not be enumerated
    #[error("Failed to list knowledge store: {0}")]
    ListKnowledge(#[source] KnowledgeError),
}

impl From<ReconcileError> for CrateError {
    fn from(err: ReconcileError) -> Self {
        CrateError::Reconcile(err.to_string())
    }
}

/// Classify one fresh page against the stored lookup
pub fn classify(fresh: &PageRecord, stored: &HashMap<String, String>) -> Classification {
    match stored.get(&fresh.url) {
        None => Classification::New,
        Some(hash) if *hash != fresh.content_hash => Classification::Changed,
        Some(_) => Classification::Unchanged,
    }
}

#[derive(Debug, Error)]
enum ApplyError {
    #[error("knowledge store: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("corpus: {0}")]
    Corpus(#[from] DbError),
}

/// Reconcile `fresh` against `corpus`, updating `knowledge` when given.
#[instrument(skip_all, fields(fresh = fresh.len()))]
pub async fn reconcile(
    fresh: &[PageRecord],
    corpus: &dyn CorpusStore,
    knowledge: Option<&dyn KnowledgeStore>,
) -> Result<ReconciliationResult, ReconcileError> {
    let mut stored: HashMap<String, String> = corpus
        .load_pages()
        .await
        .map_err(ReconcileError::LoadCorpus)?
        .into_iter()
        .map(|p| (p.url, p.content_hash))
        .collect();

    // Artifacts per URL, so superseded ones can be removed
    let mut artifacts: HashMap<String, Vec<StoreRecord>> = HashMap::new();
    if let Some(store) = knowledge {
        for record in store.list_all().await.map_err(ReconcileError::ListKnowledge)? {
            artifacts.entry(record.url.clone()).or_default().push(record);
        }
    }

    let mut result = ReconciliationResult {
        total: fresh.len(),
        ..Default::default()
    };

    for page in fresh {
        let classification = classify(page, &stored);
        result.record(&page.url, classification);

        if classification == Classification::Unchanged {
            let Some(store) = knowledge else {
                continue;
            };
            if has_current_artifact(page, &artifacts) {
                continue;
            }

            debug!(url = %page.url, "Re-saving missing knowledge artifact");
            match sync_artifact(page, store, &mut artifacts).await {
                Ok(removed) => {
                    result.repaired += 1;
                    result.removed_artifacts += removed;
                }
                Err(e) => {
                    warn!(url = %page.url, error = %e, "Failed to repair knowledge artifact");
                    result.failures.push(PageFailure {
                        url: page.url.clone(),
                        error: ApplyError::from(e).to_string(),
                    });
                }
            }
            continue;
        }

        debug!(url = %page.url, ?classification, "Applying page update");
        match apply(page, corpus, knowledge, &mut artifacts).await {
            Ok(removed) => {
                result.applied += 1;
                result.removed_artifacts += removed;
                stored.insert(page.url.clone(), page.content_hash.clone());
            }
            Err(e) => {
                warn!(url = %page.url, error = %e, "Failed to apply page update");
                result.failures.push(PageFailure {
                    url: page.url.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Reconciled {} pages: {} new, {} changed, {} unchanged, {} repaired, {} failed",
        result.total,
        result.new,
        result.changed,
        result.unchanged,
        result.repaired,
        result.failures.len()
    );
    Ok(result)
}

/// Whether the store holds an artifact for `page` that was not built from
/// different content. Stores that do not report hashes count as current.
fn has_current_artifact(page: &PageRecord, artifacts: &HashMap<String, Vec<StoreRecord>>) -> bool {
    artifacts.get(&page.url).is_some_and(|records| {
        records.iter().any(|r| {
            r.content_hash
                .as_deref()
                .is_none_or(|hash| hash == page.content_hash)
        })
    })
}

/// Save `page` to the store and delete every other artifact for its URL
async fn sync_artifact(
    page: &PageRecord,
    store: &dyn KnowledgeStore,
    artifacts: &mut HashMap<String, Vec<StoreRecord>>,
) -> Result<usize, KnowledgeError> {
    let key = store.save_or_replace(page).await?;

    let records = artifacts.entry(page.url.clone()).or_default();
    let stale: Vec<String> = records
        .iter()
        .filter(|r| r.key != key)
        .map(|r| r.key.clone())
        .collect();
    let mut removed = 0;
    for old in &stale {
        store.delete_by_key(old).await?;
        records.retain(|r| &r.key != old);
        removed += 1;
    }

    records.retain(|r| r.key != key);
    records.push(StoreRecord {
        key,
        url: page.url.clone(),
        content_hash: Some(page.content_hash.clone()),
    });
    Ok(removed)
}

async fn apply(
    page: &PageRecord,
    corpus: &dyn CorpusStore,
    knowledge: Option<&dyn KnowledgeStore>,
    artifacts: &mut HashMap<String, Vec<StoreRecord>>,
) -> Result<usize, ApplyError> {
    let removed = match knowledge {
        Some(store) => sync_artifact(page, store, artifacts).await?,
        None => 0,
    };

    corpus.save_page(page).await?;
    Ok(removed)
}
