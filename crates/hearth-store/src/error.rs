use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database could not be opened or upgraded. Latched: every later
    /// operation on the same store reports this again.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A schema upgrade step failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// SQLite error raised inside a transaction (including commit/abort).
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Event content or a meta value failed to (de)serialize.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be mapped back to its model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The blocking task running a transaction panicked or was cancelled.
    #[error("Storage task failed: {0}")]
    Task(String),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification callers use to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The handle never opened. Not recoverable without reconstructing the store.
    StorageUnavailable,
    /// A single read or write failed. The caller may retry.
    StorageFailure,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_)
            | StoreError::Migration(_)
            | StoreError::NoDataDir
            | StoreError::Io(_) => ErrorKind::StorageUnavailable,
            StoreError::Sqlite(_)
            | StoreError::Serialization(_)
            | StoreError::Corrupt(_)
            | StoreError::Task(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.kind() == ErrorKind::StorageUnavailable
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert_eq!(
            StoreError::Unavailable("boom".into()).kind(),
            ErrorKind::StorageUnavailable
        );
        assert_eq!(
            StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows).kind(),
            ErrorKind::StorageFailure
        );
        assert!(!StoreError::Corrupt("bad row".into()).is_unavailable());
    }
}
