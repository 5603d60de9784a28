//! Knowledge store backed by an OpenAI-compatible files + vector store API

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::crawler::PageRecord;
use crate::knowledge::{KnowledgeError, KnowledgeStore, StoreRecord};
use crate::poll::{poll_until, PollConfig, PollError, PollStatus};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Files listed per page when enumerating the vector store
const LIST_PAGE_SIZE: u32 = 100;

/// Connection settings for a hosted vector store
#[derive(Debug, Clone)]
pub struct HostedStoreConfig {
    /// API base, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    pub api_key: String,

    pub vector_store_id: String,

    /// Cadence and budget for waiting on ingestion
    pub poll: PollConfig,

    /// Per-request timeout
    pub timeout: Duration,
}

impl HostedStoreConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        vector_store_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            vector_store_id: vector_store_id.into(),
            poll: PollConfig::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileBatch {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct VectorStoreFile {
    id: String,
    #[serde(default)]
    attributes: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    data: Vec<VectorStoreFile>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

fn attribute(file: &VectorStoreFile, name: &str) -> Option<String> {
    file.attributes
        .as_ref()?
        .get(name)?
        .as_str()
        .map(str::to_string)
}

/// Document text uploaded for a page
fn document_text(page: &PageRecord) -> String {
    format!("Título: {}\nURL: {}\n\n{}", page.title, page.url, page.body)
}

/// Hosted knowledge store; every save uploads a new file with a new key
#[derive(Clone)]
pub struct HostedKnowledgeStore {
    client: Client,
    config: HostedStoreConfig,
}

impl HostedKnowledgeStore {
    /// Create a store client
    pub fn new(config: HostedStoreConfig) -> Result<Self, KnowledgeError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Execute an HTTP request and handle the response
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, KnowledgeError> {
        let response = self.authorized(request).send().await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&response_text).map_err(|e| {
                error!("Failed to parse response: {}", e);
                KnowledgeError::UnexpectedResponse(format!("Failed to parse response: {}", e))
            })
        } else {
            error!("API error: {} - {}", status, response_text);
            Err(KnowledgeError::Api {
                status: status.as_u16(),
                message: response_text,
            })
        }
    }

    /// Send a DELETE; a missing resource counts as deleted
    async fn delete_tolerant(&self, path: &str) -> Result<(), KnowledgeError> {
        let response = self
            .authorized(self.client.delete(self.endpoint(path)))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(KnowledgeError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn upload_file(&self, page: &PageRecord) -> Result<String, KnowledgeError> {
        let file_name = format!("page-{}.txt", &page.content_hash[..page.content_hash.len().min(16)]);
        let part = Part::text(document_text(page))
            .file_name(file_name)
            .mime_str("text/plain")?;
        let form = Form::new().text("purpose", "assistants").part("file", part);

        let file: FileObject = self
            .execute(self.client.post(self.endpoint("files")).multipart(form))
            .await?;
        debug!("Uploaded {} as file {}", page.url, file.id);
        Ok(file.id)
    }

    async fn attach(&self, file_id: &str, page: &PageRecord) -> Result<FileBatch, KnowledgeError> {
        let path = format!("vector_stores/{}/file_batches", self.config.vector_store_id);
        let body = json!({
            "file_ids": [file_id],
            "attributes": {
                "url": page.url,
                "content_hash": page.content_hash,
            },
        });
        self.execute(self.client.post(self.endpoint(&path)).json(&body))
            .await
    }

    async fn batch_status(&self, batch_id: &str, url: &str) -> Result<PollStatus<()>, KnowledgeError> {
        let path = format!(
            "vector_stores/{}/file_batches/{}",
            self.config.vector_store_id, batch_id
        );
        let batch: FileBatch = self.execute(self.client.get(self.endpoint(&path))).await?;
        interpret_batch_status(&batch.status, url)
    }

    async fn wait_for_batch(&self, batch: FileBatch, url: &str) -> Result<(), KnowledgeError> {
        if let PollStatus::Ready(()) = interpret_batch_status(&batch.status, url)? {
            return Ok(());
        }

        poll_until(self.config.poll, || self.batch_status(&batch.id, url))
            .await
            .map_err(|e| match e {
                PollError::TimedOut { waited } => KnowledgeError::Timeout {
                    url: url.to_string(),
                    waited_secs: waited.as_secs(),
                },
                PollError::Failed(e) => e,
            })
    }
}

fn interpret_batch_status(status: &str, url: &str) -> Result<PollStatus<()>, KnowledgeError> {
    match status {
        "completed" => Ok(PollStatus::Ready(())),
        "in_progress" | "queued" => Ok(PollStatus::Pending),
        other => Err(KnowledgeError::Ingestion {
            url: url.to_string(),
            status: other.to_string(),
        }),
    }
}

#[async_trait]
impl KnowledgeStore for HostedKnowledgeStore {
    #[instrument(skip(self, page), fields(url = %page.url))]
    async fn save_or_replace(&self, page: &PageRecord) -> Result<String, KnowledgeError> {
        let file_id = self.upload_file(page).await?;

        let ingested = match self.attach(&file_id, page).await {
            Ok(batch) => self.wait_for_batch(batch, &page.url).await,
            Err(e) => Err(e),
        };

        if let Err(e) = ingested {
            // Do not leave a half-ingested file behind
            if let Err(cleanup) = self.delete_by_key(&file_id).await {
                warn!("Failed to remove file {} after failed ingestion: {}", file_id, cleanup);
            }
            return Err(e);
        }

        info!("Ingested {} as {}", page.url, file_id);
        Ok(file_id)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<StoreRecord>, KnowledgeError> {
        let path = format!("vector_stores/{}/files", self.config.vector_store_id);
        let limit = LIST_PAGE_SIZE.to_string();
        let mut records = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![("limit", limit.clone())];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }
            let page: FileList = self
                .execute(self.client.get(self.endpoint(&path)).query(&query))
                .await?;

            records.extend(page.data.iter().map(|file| StoreRecord {
                key: file.id.clone(),
                url: attribute(file, "url").unwrap_or_default(),
                content_hash: attribute(file, "content_hash"),
            }));

            let cursor = page
                .last_id
                .clone()
                .or_else(|| page.data.last().map(|f| f.id.clone()));
            match cursor {
                Some(cursor) if page.has_more => after = Some(cursor),
                _ => break,
            }
        }

        debug!("Vector store holds {} files", records.len());
        Ok(records)
    }

    async fn delete_by_key(&self, key: &str) -> Result<(), KnowledgeError> {
        self.delete_tolerant(&format!(
            "vector_stores/{}/files/{}",
            self.config.vector_store_id, key
        ))
        .await?;
        self.delete_tolerant(&format!("files/{}", key)).await
    }
}
