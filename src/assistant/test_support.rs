//! An assistant wired to in-memory collaborators

use std::sync::Arc;

use tempfile::TempDir;

use crate::assistant::generator::PromptAnswerGenerator;
use crate::assistant::prompt::Persona;
use crate::assistant::service::Assistant;
use crate::config::AppConfig;
use crate::crawler::test_support::StaticSite;
use crate::crawler::{Crawler, CrawlerConfig};
use crate::index::Database;
use crate::knowledge::test_support::FaultyKnowledgeStore;
use crate::knowledge::{KnowledgeStore, MemoryKnowledgeStore};
use crate::model::mock_model::MockCompletionModel;

pub(crate) struct Fixture {
    pub(crate) assistant: Assistant,
    pub(crate) site: Arc<StaticSite>,
    /// Contents of the store the assistant writes to
    pub(crate) knowledge: Arc<MemoryKnowledgeStore>,
    /// Failure switches for that store
    pub(crate) faults: Arc<FaultyKnowledgeStore>,
    pub(crate) model: MockCompletionModel,
    _dir: TempDir,
}

/// Assistant seeded at `https://example.edu/` crawling `site`
pub(crate) async fn fixture(site: StaticSite) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("corpus.db").to_string_lossy().to_string();
    let config = AppConfig::from_lookup(|key| match key {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "WEBSITE_URL" => Some("https://example.edu/".to_string()),
        "SCHOOL_NAME" => Some("Colegio San Agustín".to_string()),
        "DATABASE_PATH" => Some(db_path.clone()),
        "CRAWL_MAX_DEPTH" => Some("2".to_string()),
        _ => None,
    })
    .unwrap();

    let db = Database::new_from_path(&config.database_path).await.unwrap();
    let site = Arc::new(site);
    let crawler = Crawler::with_fetcher(
        site.clone(),
        CrawlerConfig::builder().rate_limit_ms(0).build(),
    );
    let knowledge = Arc::new(MemoryKnowledgeStore::new());
    let faults = Arc::new(FaultyKnowledgeStore::new(knowledge.clone()));
    let model = MockCompletionModel::new();
    let persona = Persona {
        school_name: config.school_name.clone(),
        assistant_name: config.assistant_name.clone(),
    };
    let generator = Arc::new(PromptAnswerGenerator::new(model.clone(), db.clone(), persona));

    let assistant = Assistant::with_parts(
        config,
        db,
        crawler,
        Some(faults.clone() as Arc<dyn KnowledgeStore>),
        generator,
    );
    Fixture {
        assistant,
        site,
        knowledge,
        faults,
        model,
        _dir: dir,
    }
}
