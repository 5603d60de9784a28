//! # Database Error Types Module
//!
//! Error types for the libsql-backed corpus and conversation store.
//!
//! ## Key Components
//!
//! - `DbError`: Enum representing different types of database operation failures
//!
//! A `DbError` returned while loading the corpus is a systemic failure and is
//! propagated to the caller of a crawl; one returned while saving a single
//! page is recorded against that page.

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// LibSQL error
    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// SQL query error
    #[error("SQL query error: {0}")]
    Query(String),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Data error
    #[error("Data error: {0}")]
    Data(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<DbError> for CrateError {
    fn from(err: DbError) -> Self {
        CrateError::Database(err.to_string())
    }
}
