//! Revision store interface
//!
//! Tracks the last assertion revision issued per `(model_id, user_email)`.
//! Callers read the last revision before issuing an assertion and save the
//! new one afterwards; computing the next value is the caller's job.
//!
//! ## Semantics
//!
//! - A key that was never saved reads as [`DEFAULT_REVISION`] with no error.
//! - `save_last_revision` is an unconditional upsert: last writer wins, and a
//!   smaller value silently regresses the counter.
//! - `save_last_revision_if_current` is the compare-and-swap path for callers
//!   that may race on the same key.
//!
//! ## Implementations
//!
//! - [`SqliteRevisionStore`]: SQLite storage over an injected connection
//! - [`InMemoryRevisionStore`]: `HashMap` storage for tests

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryRevisionStore;
pub use sqlite::SqliteRevisionStore;

use crate::models::{RevisionRecord, DEFAULT_REVISION};
use crate::storage::{StorageError, StorageResult};

/// Interface for last-revision tracking
pub trait RevisionStore {
    /// Create the backing schema if it does not exist yet
    fn ensure_schema(&self) -> StorageResult<()>;

    /// Get the last revision recorded for a key
    ///
    /// Returns [`DEFAULT_REVISION`] if no revision has been recorded.
    fn get_last_revision(&self, model_id: &str, user_email: &str) -> StorageResult<i64>;

    /// Store the last revision for a key
    ///
    /// Creates the record if it doesn't exist, overwrites it if it does.
    fn save_last_revision(&self, model_id: &str, user_email: &str, revision: i64)
        -> StorageResult<()>;

    /// Store `revision` only if the current value still equals `expected_previous`
    ///
    /// An absent record counts as [`DEFAULT_REVISION`]. Returns `false`
    /// without writing when another writer got there first.
    fn save_last_revision_if_current(
        &self,
        model_id: &str,
        user_email: &str,
        expected_previous: i64,
        revision: i64,
    ) -> StorageResult<bool>;

    /// All records, ordered by model then user
    fn records(&self) -> StorageResult<Vec<RevisionRecord>>;

    /// Number of recorded keys
    fn record_count(&self) -> StorageResult<i64> {
        Ok(self.records()?.len() as i64)
    }
}

/// Reject revisions below the first valid one
fn check_revision(revision: i64) -> StorageResult<()> {
    if revision < DEFAULT_REVISION {
        return Err(StorageError::InvalidRevision { revision });
    }
    Ok(())
}

/// Map an optional stored value to the revision callers see
fn last_revision_or_default(stored: Option<i64>) -> i64 {
    stored.unwrap_or(DEFAULT_REVISION)
}
