//! # Database Schema Module
//!
//! Creates the tables backing the page corpus and the conversation history.
//!
//! ## Schema Design
//!
//! 1. `pages` - one row per canonical URL with the extracted body and its hash
//! 2. `conversations` - one row per chat session
//! 3. `messages` - the turns of each session, ordered by insertion
//!
//! Timestamps are stored as Unix milliseconds.

use crate::index::error::DbError;
use libsql::{params, Connection};

/// Initialize the database schema
pub async fn initialize_schema(conn: &Connection) -> Result<(), DbError> {
    // Create pages table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            last_updated INTEGER NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create pages table: {}", e)))?;

    // Create conversations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            last_activity INTEGER NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create conversations table: {}", e)))?;

    // Create messages table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            FOREIGN KEY (chat_id) REFERENCES conversations(chat_id) ON DELETE CASCADE
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create messages table: {}", e)))?;

    // Create index on chat_id for history lookups
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id)",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create index on messages: {}", e)))?;

    Ok(())
}
