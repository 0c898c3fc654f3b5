use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgoraError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),
    #[error("Data integrity violation: {0}")]
    DataIntegrityError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgoraError {
    /// Folds SQLITE_BUSY/SQLITE_LOCKED (writer-lock contention that outlived
    /// the busy timeout) into the retryable `TransactionConflict` kind.
    pub fn from_sql(err: rusqlite::Error, op: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::DatabaseBusy
                    || code.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                AgoraError::TransactionConflict(format!("{op}: {err}"))
            }
            _ => AgoraError::RusqliteError(err),
        }
    }
}
