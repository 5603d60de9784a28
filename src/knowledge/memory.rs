//! In-process knowledge store

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::crawler::PageRecord;
use crate::knowledge::{KnowledgeError, KnowledgeStore, StoreRecord};

#[derive(Debug, Clone)]
struct Artifact {
    url: String,
    content_hash: String,
    body: String,
}

/// Knowledge store kept in memory; replacing a page keeps its key
#[derive(Debug, Default)]
pub struct MemoryKnowledgeStore {
    artifacts: Mutex<BTreeMap<String, Artifact>>,
    next_key: AtomicU64,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts
    pub fn len(&self) -> usize {
        self.lock().map(|a| a.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored body for `url`, if any
    pub fn body_for(&self, url: &str) -> Option<String> {
        self.lock()
            .ok()?
            .values()
            .find(|a| a.url == url)
            .map(|a| a.body.clone())
    }

    /// Add an artifact under a new key, leaving any other artifact for `url` in place
    pub fn insert_detached(&self, url: &str, content_hash: &str) -> Result<String, KnowledgeError> {
        let key = self.issue_key();
        self.lock()?.insert(
            key.clone(),
            Artifact {
                url: url.to_string(),
                content_hash: content_hash.to_string(),
                body: String::new(),
            },
        );
        Ok(key)
    }

    fn issue_key(&self) -> String {
        format!("mem-{}", self.next_key.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Artifact>>, KnowledgeError> {
        self.artifacts
            .lock()
            .map_err(|_| KnowledgeError::Other("knowledge store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KnowledgeStore for MemoryKnowledgeStore {
    async fn save_or_replace(&self, page: &PageRecord) -> Result<String, KnowledgeError> {
        let mut artifacts = self.lock()?;
        let existing = artifacts
            .iter()
            .find(|(_, a)| a.url == page.url)
            .map(|(key, _)| key.clone());
        let key = existing.unwrap_or_else(|| self.issue_key());

        artifacts.insert(
            key.clone(),
            Artifact {
                url: page.url.clone(),
                content_hash: page.content_hash.clone(),
                body: page.body.clone(),
            },
        );
        Ok(key)
    }

    async fn list_all(&self) -> Result<Vec<StoreRecord>, KnowledgeError> {
        Ok(self
            .lock()?
            .iter()
            .map(|(key, a)| StoreRecord {
                key: key.clone(),
                url: a.url.clone(),
                content_hash: Some(a.content_hash.clone()),
            })
            .collect())
    }

    async fn delete_by_key(&self, key: &str) -> Result<(), KnowledgeError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
