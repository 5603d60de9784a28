//! Knowledge store with switchable failures

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::crawler::PageRecord;
use crate::knowledge::{KnowledgeError, KnowledgeStore, MemoryKnowledgeStore, StoreRecord};

/// Delegates to a [`MemoryKnowledgeStore`] unless a failure is switched on
#[derive(Debug, Default)]
pub(crate) struct FaultyKnowledgeStore {
    inner: Arc<MemoryKnowledgeStore>,
    fail_list: AtomicBool,
    fail_delete: AtomicBool,
}

impl FaultyKnowledgeStore {
    pub(crate) fn new(inner: Arc<MemoryKnowledgeStore>) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub(crate) fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    fn unavailable() -> KnowledgeError {
        KnowledgeError::Api {
            status: 503,
            message: "store unavailable".to_string(),
        }
    }
}

#[async_trait]
impl KnowledgeStore for FaultyKnowledgeStore {
    async fn save_or_replace(&self, page: &PageRecord) -> Result<String, KnowledgeError> {
        self.inner.save_or_replace(page).await
    }

    async fn list_all(&self) -> Result<Vec<StoreRecord>, KnowledgeError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.list_all().await
    }

    async fn delete_by_key(&self, key: &str) -> Result<(), KnowledgeError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.delete_by_key(key).await
    }
}
