//! The assistant service object wired by the host application

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};

use crate::assistant::generator::{AnswerGenerator, PromptAnswerGenerator};
use crate::assistant::prompt::{Persona, APOLOGY_MESSAGE};
use crate::config::AppConfig;
use crate::crawler::{Crawler, PageRecord};
use crate::error::{Error, Result};
use crate::index::Database;
use crate::knowledge::{HostedKnowledgeStore, HostedStoreConfig, KnowledgeStore};
use crate::model::Client;
use crate::reconcile::{reconcile, ReconciliationResult};

/// Snapshot reported by [`Assistant::health`]
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// `healthy`, `degraded` or `initializing`
    pub status: &'static str,
    pub initialized: bool,
    pub pages: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
    pub website_url: String,
    pub openai_configured: bool,
    /// `hosted` or `prompt`
    pub knowledge_store: &'static str,
    pub last_update: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// Crawls the school website, keeps the corpus current and answers questions
pub struct Assistant {
    config: AppConfig,
    db: Database,
    crawler: Crawler,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    generator: Arc<dyn AnswerGenerator>,
    /// Held for the whole of a crawl + reconcile, and for a corpus reset
    crawl_lock: Mutex<()>,
    /// Serializes `initialize` and `reinitialize`
    init_lock: Mutex<()>,
    /// Set once an initialization has completed; readable without waiting
    initialized: AtomicBool,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

impl Assistant {
    /// Build the production service from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let db = Database::new_from_path(&config.database_path).await?;
        let crawler = Crawler::new(config.crawler_config())?;

        let knowledge: Option<Arc<dyn KnowledgeStore>> = match &config.vector_store_id {
            Some(id) => {
                let store_config =
                    HostedStoreConfig::new(&config.api_base_url, &config.openai_api_key, id);
                Some(Arc::new(HostedKnowledgeStore::new(store_config)?))
            }
            None => None,
        };

        let persona = Persona {
            school_name: config.school_name.clone(),
            assistant_name: config.assistant_name.clone(),
        };
        let model = Client::new_openai_from_config(config).into_completion();
        let generator = Arc::new(PromptAnswerGenerator::new(model, db.clone(), persona));

        Ok(Self::with_parts(
            config.clone(),
            db,
            crawler,
            knowledge,
            generator,
        ))
    }

    /// Assemble a service from already built collaborators
    pub fn with_parts(
        config: AppConfig,
        db: Database,
        crawler: Crawler,
        knowledge: Option<Arc<dyn KnowledgeStore>>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            config,
            db,
            crawler,
            knowledge,
            generator,
            crawl_lock: Mutex::new(()),
            init_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
            last_update: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn crawler(&self) -> &Crawler {
        &self.crawler
    }

    /// Load the stored corpus into the generator and run the first crawl.
    ///
    /// Returns `false` without doing anything when already initialized. A
    /// failed initialization leaves the service uninitialized so it can be
    /// retried.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<bool> {
        let _init = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(false);
        }
        self.run_initialization().await?;
        Ok(true)
    }

    /// Force a fresh initialization
    pub async fn reinitialize(&self) -> Result<bool> {
        let _init = self.init_lock.lock().await;
        self.initialized.store(false, Ordering::SeqCst);
        self.run_initialization().await?;
        Ok(true)
    }

    async fn run_initialization(&self) -> Result<()> {
        self.load_knowledge().await?;
        self.update_content().await?;
        self.initialized.store(true, Ordering::SeqCst);
        info!("Assistant initialized");
        Ok(())
    }

    /// Hand the stored corpus to the answer generator without crawling
    pub async fn load_knowledge(&self) -> Result<usize> {
        let pages = self.db.list_pages().await?;
        info!("Loaded {} stored pages", pages.len());
        self.generator.refresh_knowledge(&pages).await;
        Ok(pages.len())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Crawl `seed`, reconcile the result and refresh the generator when
    /// anything changed. Never overlaps with another crawl or reset.
    #[instrument(skip(self))]
    pub async fn run_crawl(
        &self,
        seed: &str,
        max_pages: u32,
        max_depth: u32,
    ) -> Result<ReconciliationResult> {
        let _guard = self.crawl_lock.lock().await;

        let report = self.crawler.crawl(seed, max_pages, max_depth).await?;
        let result = reconcile(&report.pages, &self.db, self.knowledge.as_deref()).await?;

        if result.has_updates() {
            let pages = self.db.list_pages().await?;
            self.generator.refresh_knowledge(&pages).await;
            info!("Content updated: {} pages", result.applied);
        } else {
            info!("No content changes");
        }
        if !result.failures.is_empty() {
            warn!("{} page updates failed", result.failures.len());
        }

        *self.last_update.write().await = Some(Utc::now());
        Ok(result)
    }

    /// Run a crawl with the configured seed and budgets
    pub async fn update_content(&self) -> Result<ReconciliationResult> {
        let config = &self.config;
        self.run_crawl(&config.website_url, config.max_pages, config.max_depth)
            .await
    }

    /// Answer a message, exposing generation errors
    pub async fn ask(&self, session_id: &str, message: &str) -> Result<String> {
        Ok(self.generator.ask(session_id, message, None).await?)
    }

    /// Answer a message; failures become an apology
    pub async fn reply(&self, session_id: &str, message: &str) -> String {
        match self.ask(session_id, message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(session_id, error = %e, "Failed to generate reply");
                APOLOGY_MESSAGE.to_string()
            }
        }
    }

    pub async fn reset_session(&self, session_id: &str) -> Result<()> {
        Ok(self.generator.reset_session(session_id).await?)
    }

    /// Stored corpus pages
    pub async fn pages(&self) -> Result<Vec<PageRecord>> {
        Ok(self.db.list_pages().await?)
    }

    /// Delete the whole corpus and every knowledge artifact.
    ///
    /// The corpus is cleared first. If deleting artifacts then fails, the
    /// leftovers are superseded by the next crawl, which sees every page as new.
    #[instrument(skip(self))]
    pub async fn reset_corpus(&self) -> Result<u64> {
        let _guard = self.crawl_lock.lock().await;

        let removed = self.db.reset_pages().await?;
        self.generator.refresh_knowledge(&[]).await;
        info!("Corpus reset: {} pages removed", removed);

        if let Some(store) = &self.knowledge {
            let records = store.list_all().await?;
            for record in &records {
                store.delete_by_key(&record.key).await?;
            }
            info!("Removed {} knowledge artifacts", records.len());
        }

        Ok(removed)
    }

    /// Report service state without failing
    pub async fn health(&self) -> HealthStatus {
        let initialized = self.is_initialized();
        let (pages, database_error) = match self.db.count_pages().await {
            Ok(count) => (Some(count), None),
            Err(e) => (None, Some(Error::from(e).to_string())),
        };

        let status = match (&database_error, initialized) {
            (Some(_), _) => "degraded",
            (None, false) => "initializing",
            (None, true) => "healthy",
        };

        HealthStatus {
            status,
            initialized,
            pages,
            database_error,
            website_url: self.config.website_url.clone(),
            openai_configured: !self.config.openai_api_key.is_empty(),
            knowledge_store: if self.knowledge.is_some() { "hosted" } else { "prompt" },
            last_update: *self.last_update.read().await,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::test_support::fixture;
    use crate::crawler::test_support::{html_page, small_school_site, StaticSite};
    use std::time::Duration;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let f = fixture(small_school_site()).await;

        assert!(f.assistant.initialize().await.unwrap());
        assert!(!f.assistant.initialize().await.unwrap());
        assert!(f.assistant.is_initialized());
        assert_eq!(f.site.requested().len(), 4);
        assert_eq!(f.assistant.pages().await.unwrap().len(), 4);
        assert_eq!(f.knowledge.len(), 4);

        assert!(f.assistant.reinitialize().await.unwrap());
        assert_eq!(f.site.requested().len(), 8);
    }

    #[tokio::test]
    async fn test_repeated_update_applies_nothing() {
        let f = fixture(small_school_site()).await;

        let first = f.assistant.update_content().await.unwrap();
        assert_eq!(first.new, 4);

        let second = f.assistant.update_content().await.unwrap();
        assert_eq!(second.unchanged, 4);
        assert!(!second.has_updates());
        assert!(f.assistant.health().await.last_update.is_some());
    }

    #[tokio::test]
    async fn test_crawls_never_overlap() {
        let site = small_school_site().slow(Duration::from_millis(5));
        let f = fixture(site).await;

        let (a, b) = tokio::join!(
            f.assistant.update_content(),
            f.assistant.run_crawl("https://example.edu/", 20, 2)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(f.site.max_in_flight(), 1);
        assert_eq!(a.new + b.new, 4);
        assert_eq!(f.assistant.pages().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_reply_apologizes_on_failure() {
        let f = fixture(small_school_site()).await;
        f.model.set_failure("boom").await;

        assert_eq!(f.assistant.reply("chat-1", "hola").await, APOLOGY_MESSAGE);
        assert!(f.assistant.ask("chat-1", "hola").await.is_err());
    }

    #[tokio::test]
    async fn test_reply_uses_crawled_content() {
        let site = StaticSite::default().page(
            "https://example.edu/",
            html_page("Inscripciones abiertas", &[]),
        );
        let f = fixture(site).await;
        f.model.set_text_response("Sí, están abiertas.").await;
        f.assistant.initialize().await.unwrap();

        let reply = f.assistant.reply("chat-1", "¿Están abiertas las inscripciones?").await;
        assert_eq!(reply, "Sí, están abiertas.");

        let preamble = f.model.requests().await[0].preamble.clone().unwrap();
        assert!(preamble.contains("### Inscripciones abiertas"));
        assert!(preamble.contains("Colegio San Agustín"));
    }

    #[tokio::test]
    async fn test_reset_corpus_clears_both_stores() {
        let f = fixture(small_school_site()).await;
        f.assistant.update_content().await.unwrap();

        assert_eq!(f.assistant.reset_corpus().await.unwrap(), 4);
        assert!(f.assistant.pages().await.unwrap().is_empty());
        assert!(f.knowledge.is_empty());

        let again = f.assistant.update_content().await.unwrap();
        assert_eq!(again.new, 4);
    }

    #[tokio::test]
    async fn test_failed_artifact_cleanup_still_clears_corpus() {
        let f = fixture(small_school_site()).await;
        f.assistant.update_content().await.unwrap();

        f.faults.fail_delete(true);
        assert!(f.assistant.reset_corpus().await.is_err());
        assert!(f.assistant.pages().await.unwrap().is_empty());
        assert_eq!(f.knowledge.len(), 4);

        // The next crawl re-saves every page over its leftover artifact
        f.faults.fail_delete(false);
        let again = f.assistant.update_content().await.unwrap();
        assert_eq!(again.new, 4);
        assert_eq!(f.knowledge.len(), 4);
        assert_eq!(f.assistant.pages().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_health_answers_during_initial_crawl() {
        let f = fixture(small_school_site().slow(Duration::from_millis(100))).await;
        let assistant = Arc::new(f.assistant);

        let init = tokio::spawn({
            let assistant = assistant.clone();
            async move { assistant.initialize().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let health = tokio::time::timeout(Duration::from_millis(100), assistant.health())
            .await
            .expect("health must not wait for the crawl");
        assert_eq!(health.status, "initializing");
        assert!(!health.initialized);

        assert!(init.await.unwrap().unwrap());
        assert_eq!(assistant.health().await.status, "healthy");
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture(small_school_site()).await;
        let health = f.assistant.health().await;
        assert_eq!(health.status, "initializing");
        assert_eq!(health.pages, Some(0));
        assert_eq!(health.knowledge_store, "hosted");

        f.assistant.initialize().await.unwrap();
        let json = serde_json::to_value(f.assistant.health().await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["pages"], 4);
        assert!(json.get("database_error").is_none());
    }
}
