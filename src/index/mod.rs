//! Corpus and conversation storage
//!
//! This module persists the crawled page corpus and the per-session chat
//! history in libsql, and defines the `CorpusStore` seam the reconciler
//! works against.

mod database;
pub mod error;
mod schema;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::crawler::PageRecord;
pub use database::Database;
pub use error::DbError;

/// Persistent corpus keyed by canonical URL
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Every stored page
    async fn load_pages(&self) -> Result<Vec<PageRecord>, DbError>;

    /// Insert or overwrite the page with the same URL
    async fn save_page(&self, page: &PageRecord) -> Result<(), DbError>;
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(DbError::Data(format!("Unknown message role: {}", other))),
        }
    }
}

/// One stored turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Session identifier
    pub chat_id: String,

    /// External user identity that owns the session
    pub user_id: String,

    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
