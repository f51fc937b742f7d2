//! Storage error handling
//!
//! Typed errors for schema setup and revision queries. A missing record is
//! never an error; these variants cover genuine storage failures only.

use std::io;
use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create the directory holding the database
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to open the database file
    #[error("Failed to open database '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Schema statement could not be applied
    #[error("Failed to apply schema for table '{table}': {source}")]
    Schema {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// An existing table has a shape this store cannot use
    #[error("Table '{table}' exists with an incompatible shape: {details}")]
    IncompatibleSchema { table: &'static str, details: String },

    /// Read or write against the revision table failed
    #[error("{operation} failed for {context}: {source}")]
    Query {
        operation: &'static str,
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Revisions start at 1
    #[error("Invalid revision {revision}: revisions must be at least 1")]
    InvalidRevision { revision: i64 },

    /// In-memory store lock was poisoned by a panicking writer
    #[error("Store lock poisoned: {0}")]
    Poisoned(String),
}

impl StorageError {
    /// Schema creation or verification failed
    ///
    /// Unreachable storage counts too: a database that cannot be opened, or
    /// whose directory cannot be created, never gets a schema.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            StorageError::Schema { .. }
                | StorageError::IncompatibleSchema { .. }
                | StorageError::Open { .. }
                | StorageError::CreateDirectory { .. }
        )
    }

    /// Storage access failed during a read or write
    pub fn is_query_error(&self) -> bool {
        matches!(self, StorageError::Query { .. })
    }

    /// Check if retrying the same call may succeed
    ///
    /// Only lock contention qualifies; the store itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Query { source, .. } => matches!(
                source.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StorageError::IncompatibleSchema { .. } => {
                Some("Point the store at a fresh database or migrate the existing table to (model_id, user_email, last_revision).")
            }
            StorageError::Query { .. } if self.is_retryable() => {
                Some("The database is busy. Retry the request or raise busy_timeout_ms.")
            }
            StorageError::InvalidRevision { .. } => {
                Some("Pass a revision of 1 or greater.")
            }
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_error() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )
    }

    #[test]
    fn test_query_error_display_includes_key() {
        let err = StorageError::Query {
            operation: "get_last_revision",
            context: "model-A/a@example.com".to_string(),
            source: rusqlite::Error::InvalidQuery,
        };

        let msg = err.to_string();
        assert!(msg.contains("get_last_revision"));
        assert!(msg.contains("model-A/a@example.com"));
        assert!(err.is_query_error());
        assert!(!err.is_schema_error());
    }

    #[test]
    fn test_schema_classification() {
        let err = StorageError::IncompatibleSchema {
            table: "last_revisions",
            details: "missing column 'last_revision'".to_string(),
        };

        assert!(err.is_schema_error());
        assert!(!err.is_retryable());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_busy_is_retryable() {
        let err = StorageError::Query {
            operation: "save_last_revision",
            context: "m/u".to_string(),
            source: busy_error(),
        };

        assert!(err.is_retryable());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_other_query_failure_not_retryable() {
        let err = StorageError::Query {
            operation: "save_last_revision",
            context: "m/u".to_string(),
            source: rusqlite::Error::InvalidQuery,
        };

        assert!(!err.is_retryable());
        assert!(err.recovery_suggestion().is_none());
    }

    #[test]
    fn test_unreachable_storage_is_schema_error() {
        let open = StorageError::Open {
            path: PathBuf::from("/no/such/dir/lastrev.db"),
            source: rusqlite::Error::InvalidPath(PathBuf::from("/no/such/dir/lastrev.db")),
        };
        assert!(open.is_schema_error());
        assert!(!open.is_query_error());

        let mkdir = StorageError::CreateDirectory {
            path: PathBuf::from("/readonly/lastrev"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(mkdir.is_schema_error());
    }
}
