//! Database operations for the index module

use crate::crawler::PageRecord;
use crate::index::error::DbError;
use crate::index::schema;
use crate::index::{ChatMessage, Conversation, CorpusStore, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};
use tracing::{debug, instrument};

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::Data(format!("Timestamp out of range: {}", millis)))
}

/// Database manager for the page corpus and conversation history
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database manager
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection) -> Result<Self, DbError> {
        // Initialize schema
        schema::initialize_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Create a new database manager from a path
    pub async fn new_from_path(path: &str) -> Result<Self, DbError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbError::Connection(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| DbError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Insert a page, or overwrite every field of the page with the same URL
    #[instrument(skip(self, page), fields(url = %page.url))]
    pub async fn upsert_page(&self, page: &PageRecord) -> Result<(), DbError> {
        self.conn
            .execute(
                "INSERT INTO pages (url, title, body, content_hash, last_updated)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(url) DO UPDATE SET
                 title = excluded.title,
                 body = excluded.body,
                 content_hash = excluded.content_hash,
                 last_updated = excluded.last_updated",
                params![
                    page.url.as_str(),
                    page.title.as_str(),
                    page.body.as_str(),
                    page.content_hash.as_str(),
                    to_millis(page.last_updated),
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to save page: {}", e)))?;

        debug!("Saved page {}", page.url);
        Ok(())
    }

    /// Get all pages in insertion order
    #[instrument(skip(self))]
    pub async fn list_pages(&self) -> Result<Vec<PageRecord>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, title, body, content_hash, last_updated FROM pages ORDER BY id",
                params![],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get pages: {}", e)))?;

        let mut pages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DbError::Data(format!("Failed to read page: {}", e)))?
        {
            pages.push(self.row_to_page(&row)?);
        }

        Ok(pages)
    }

    /// Get a page by canonical URL
    pub async fn get_page(&self, url: &str) -> Result<Option<PageRecord>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, title, body, content_hash, last_updated FROM pages WHERE url = ?",
                params![url],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get page: {}", e)))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(self.row_to_page(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DbError::Data(format!("Failed to get page: {}", e))),
        }
    }

    /// Number of pages in the corpus
    pub async fn count_pages(&self) -> Result<u64, DbError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pages", params![])
            .await
            .map_err(|e| DbError::Query(format!("Failed to count pages: {}", e)))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(0),
            Err(e) => return Err(DbError::Data(format!("Failed to count pages: {}", e))),
        };

        let count: i64 = row
            .get(0)
            .map_err(|e| DbError::Data(format!("Failed to get count: {}", e)))?;
        Ok(count as u64)
    }

    /// Delete every page; returns the number removed
    #[instrument(skip(self))]
    pub async fn reset_pages(&self) -> Result<u64, DbError> {
        self.conn
            .execute("DELETE FROM pages", params![])
            .await
            .map_err(|e| DbError::Query(format!("Failed to reset pages: {}", e)))
    }

    /// Register a conversation; an existing one is left as is
    pub async fn create_conversation(&self, chat_id: &str, user_id: &str) -> Result<(), DbError> {
        let now = to_millis(Utc::now());
        self.conn
            .execute(
                "INSERT OR IGNORE INTO conversations (chat_id, user_id, created_at, last_activity)
                 VALUES (?, ?, ?, ?)",
                params![chat_id, user_id, now, now],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to create conversation: {}", e)))?;
        Ok(())
    }

    /// Get a conversation by chat ID
    pub async fn get_conversation(&self, chat_id: &str) -> Result<Option<Conversation>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT chat_id, user_id, created_at, last_activity FROM conversations WHERE chat_id = ?",
                params![chat_id],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get conversation: {}", e)))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DbError::Data(format!("Failed to get conversation: {}", e))),
        };

        Ok(Some(Conversation {
            chat_id: row
                .get(0)
                .map_err(|e| DbError::Data(format!("Failed to get chat_id: {}", e)))?,
            user_id: row
                .get(1)
                .map_err(|e| DbError::Data(format!("Failed to get user_id: {}", e)))?,
            created_at: from_millis(
                row.get(2)
                    .map_err(|e| DbError::Data(format!("Failed to get created_at: {}", e)))?,
            )?,
            last_activity: from_millis(
                row.get(3)
                    .map_err(|e| DbError::Data(format!("Failed to get last_activity: {}", e)))?,
            )?,
        }))
    }

    /// Append a message to a conversation and bump its activity time
    pub async fn save_message(&self, chat_id: &str, role: Role, content: &str) -> Result<(), DbError> {
        let now = to_millis(Utc::now());

        // Both statements run on one connection shared by all sessions, so no
        // explicit transaction is opened here
        self.conn
            .execute(
                "INSERT INTO messages (chat_id, role, content, timestamp) VALUES (?, ?, ?, ?)",
                params![chat_id, role.as_str(), content, now],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to save message: {}", e)))?;

        self.conn
            .execute(
                "UPDATE conversations SET last_activity = ? WHERE chat_id = ?",
                params![now, chat_id],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to update conversation: {}", e)))?;

        Ok(())
    }

    /// The last `limit` messages of a conversation, oldest first
    pub async fn conversation_history(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT role, content, timestamp FROM (
                    SELECT id, role, content, timestamp FROM messages
                    WHERE chat_id = ? ORDER BY id DESC LIMIT ?
                 ) ORDER BY id ASC",
                params![chat_id, limit as i64],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get history: {}", e)))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DbError::Data(format!("Failed to read message: {}", e)))?
        {
            let role: String = row
                .get(0)
                .map_err(|e| DbError::Data(format!("Failed to get role: {}", e)))?;
            messages.push(ChatMessage {
                role: role.parse()?,
                content: row
                    .get(1)
                    .map_err(|e| DbError::Data(format!("Failed to get content: {}", e)))?,
                timestamp: from_millis(
                    row.get(2)
                        .map_err(|e| DbError::Data(format!("Failed to get timestamp: {}", e)))?,
                )?,
            });
        }

        Ok(messages)
    }

    /// Delete a conversation and its messages
    pub async fn delete_conversation(&self, chat_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM messages WHERE chat_id = ?", params![chat_id])
            .await
            .map_err(|e| DbError::Query(format!("Failed to delete messages: {}", e)))?;

        self.conn
            .execute("DELETE FROM conversations WHERE chat_id = ?", params![chat_id])
            .await
            .map_err(|e| DbError::Query(format!("Failed to delete conversation: {}", e)))?;

        Ok(())
    }

    /// Convert a database row to a PageRecord
    fn row_to_page(&self, row: &Row) -> Result<PageRecord, DbError> {
        Ok(PageRecord {
            url: row
                .get(0)
                .map_err(|e| DbError::Data(format!("Failed to get url: {}", e)))?,
            title: row
                .get(1)
                .map_err(|e| DbError::Data(format!("Failed to get title: {}", e)))?,
            body: row
                .get(2)
                .map_err(|e| DbError::Data(format!("Failed to get body: {}", e)))?,
            content_hash: row
                .get(3)
                .map_err(|e| DbError::Data(format!("Failed to get content_hash: {}", e)))?,
            last_updated: from_millis(
                row.get(4)
                    .map_err(|e| DbError::Data(format!("Failed to get last_updated: {}", e)))?,
            )?,
        })
    }
}

#[async_trait]
impl CorpusStore for Database {
    async fn load_pages(&self) -> Result<Vec<PageRecord>, DbError> {
        self.list_pages().await
    }

    async fn save_page(&self, page: &PageRecord) -> Result<(), DbError> {
        self.upsert_page(page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    async fn setup_test_db() -> Result<(Database, tempfile::TempDir), DbError> {
        // Create a temporary directory for the database
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();

        // Create a new database
        let db = Database::new_from_path(&db_path).await?;

        Ok((db, temp_dir))
    }

    fn page(url: &str, body: &str) -> PageRecord {
        let ts = DateTime::from_timestamp_millis(1_717_200_000_000).unwrap();
        PageRecord::with_timestamp(url, "Título", body, ts)
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        // Verify that the tables were created
        let mut result = db
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('pages', 'conversations', 'messages')",
                params![],
            )
            .await
            .unwrap();

        let mut tables = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            let table_name: String = row.get(0).unwrap();
            tables.push(table_name);
        }

        assert_eq!(tables.len(), 3);
        assert!(tables.contains(&"pages".to_string()));
        assert!(tables.contains(&"messages".to_string()));
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directory() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested/dir/corpus.db");
        let db = Database::new_from_path(&db_path.to_string_lossy()).await.unwrap();
        assert_eq!(db.count_pages().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_round_trip_and_overwrite() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        let original = page("https://example.edu/a", "cuerpo original");
        db.upsert_page(&original).await.unwrap();
        assert_eq!(db.get_page("https://example.edu/a").await.unwrap(), Some(original));

        let later = DateTime::from_timestamp_millis(1_717_300_000_000).unwrap();
        let changed = PageRecord::with_timestamp("https://example.edu/a", "Nuevo", "cuerpo nuevo", later);
        db.upsert_page(&changed).await.unwrap();

        let stored = db.get_page("https://example.edu/a").await.unwrap().unwrap();
        assert_eq!(stored, changed);
        assert_eq!(db.count_pages().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_and_reset_pages() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        db.upsert_page(&page("https://example.edu/a", "a")).await.unwrap();
        db.upsert_page(&page("https://example.edu/b", "b")).await.unwrap();

        let pages = db.list_pages().await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].url, "https://example.edu/a");
        assert_eq!(pages[1].url, "https://example.edu/b");
        assert!(db.get_page("https://example.edu/c").await.unwrap().is_none());

        assert_eq!(db.reset_pages().await.unwrap(), 2);
        assert_eq!(db.count_pages().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_conversation_history_is_bounded_and_ordered() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        db.create_conversation("chat-1", "user-1").await.unwrap();
        db.create_conversation("chat-1", "someone-else").await.unwrap();
        for i in 0..5 {
            db.save_message("chat-1", Role::User, &format!("pregunta {i}")).await.unwrap();
            db.save_message("chat-1", Role::Assistant, &format!("respuesta {i}")).await.unwrap();
        }

        let conversation = db.get_conversation("chat-1").await.unwrap().unwrap();
        assert_eq!(conversation.user_id, "user-1");
        assert!(conversation.last_activity >= conversation.created_at);

        let history = db.conversation_history("chat-1", 3).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["respuesta 3", "pregunta 4", "respuesta 4"]);
        assert_eq!(history[1].role, Role::User);
    }

    #[tokio::test]
    async fn test_delete_conversation() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        db.create_conversation("chat-1", "user-1").await.unwrap();
        db.save_message("chat-1", Role::User, "hola").await.unwrap();
        db.delete_conversation("chat-1").await.unwrap();

        assert!(db.get_conversation("chat-1").await.unwrap().is_none());
        assert!(db.conversation_history("chat-1", 8).await.unwrap().is_empty());
    }
}
