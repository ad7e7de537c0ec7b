//! Error types for the SQLite backend

use thiserror::Error;
use tutorgraph_core::GraphError;

/// SQLite backend error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(String),

    /// Schema/migration error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<SqliteError> for GraphError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Connection(msg) => Self::StorageConnection(msg),
            SqliteError::Query(msg) => Self::Storage(msg),
            SqliteError::Schema(msg) => Self::Storage(msg),
            SqliteError::NotFound(msg) => Self::NotFound(msg),
            SqliteError::Serialization(msg) => Self::Serialization(msg),
            SqliteError::Rusqlite(e) => {
                let text = e.to_string();
                match &e {
                    rusqlite::Error::SqliteFailure(code, _)
                        if code.code == rusqlite::ErrorCode::CannotOpen
                            || code.code == rusqlite::ErrorCode::DatabaseBusy =>
                    {
                        Self::StorageConnection(text)
                    }
                    _ => Self::Storage(text),
                }
            }
        }
    }
}
