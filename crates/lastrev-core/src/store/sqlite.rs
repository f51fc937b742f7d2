//! SQLite-backed revision store

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{check_revision, last_revision_or_default, RevisionStore};
use crate::config::Config;
use crate::models::{RevisionKey, RevisionRecord, DEFAULT_REVISION};
use crate::storage::{self, StorageError, StorageResult};

const GET_LAST_REVISION_SQL: &str = r#"
    SELECT last_revision
    FROM last_revisions
    WHERE model_id = ?1 AND user_email = ?2
"#;

const UPSERT_LAST_REVISION_SQL: &str = r#"
    INSERT INTO last_revisions (model_id, user_email, last_revision)
    VALUES (?1, ?2, ?3)
    ON CONFLICT (model_id, user_email) DO UPDATE SET last_revision = excluded.last_revision
"#;

const UPDATE_IF_CURRENT_SQL: &str = r#"
    UPDATE last_revisions
    SET last_revision = ?4
    WHERE model_id = ?1 AND user_email = ?2 AND last_revision = ?3
"#;

const INSERT_IF_ABSENT_SQL: &str = r#"
    INSERT INTO last_revisions (model_id, user_email, last_revision)
    VALUES (?1, ?2, ?3)
    ON CONFLICT (model_id, user_email) DO NOTHING
"#;

const LIST_RECORDS_SQL: &str = r#"
    SELECT model_id, user_email, last_revision
    FROM last_revisions
    ORDER BY model_id, user_email
"#;

/// Revision store over a caller-supplied SQLite connection
///
/// Every operation is a single autocommit statement (or, for the
/// compare-and-swap path, a pair of individually atomic ones), so several
/// stores on separate connections can share one database file.
pub struct SqliteRevisionStore {
    conn: Connection,
}

impl SqliteRevisionStore {
    /// Wrap an existing connection
    ///
    /// The schema is not touched; call [`RevisionStore::ensure_schema`] at startup.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open the configured database and ensure the schema exists
    ///
    /// Unreachable storage surfaces as `Open` or `CreateDirectory`, both of
    /// which report [`StorageError::is_schema_error`].
    pub fn open(config: &Config) -> StorageResult<Self> {
        let store = Self::connect(config)?;
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open the configured database without touching the schema
    pub fn connect(config: &Config) -> StorageResult<Self> {
        Ok(Self::new(storage::open_connection(config)?))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let path = std::path::PathBuf::from(":memory:");
        let conn = Connection::open_in_memory()
            .map_err(|source| StorageError::Open { path, source })?;
        let store = Self::new(conn);
        store.ensure_schema()?;
        Ok(store)
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Give the connection back to the caller
    pub fn into_inner(self) -> Connection {
        self.conn
    }

    /// Current schema version, `None` if never initialized
    pub fn schema_version(&self) -> StorageResult<Option<i32>> {
        storage::schema_version(&self.conn)
    }
}

fn query_error<'a>(
    operation: &'static str,
    model_id: &'a str,
    user_email: &'a str,
) -> impl FnOnce(rusqlite::Error) -> StorageError + 'a {
    move |source| {
        let context = RevisionKey::new(model_id, user_email).to_string();
        warn!(operation, key = %context, error = %source, "Revision query failed");
        StorageError::Query {
            operation,
            context,
            source,
        }
    }
}

impl RevisionStore for SqliteRevisionStore {
    fn ensure_schema(&self) -> StorageResult<()> {
        storage::ensure_schema(&self.conn)
    }

    fn get_last_revision(&self, model_id: &str, user_email: &str) -> StorageResult<i64> {
        let stored: Option<i64> = self
            .conn
            .query_row(GET_LAST_REVISION_SQL, params![model_id, user_email], |row| {
                row.get(0)
            })
            .optional()
            .map_err(query_error("get_last_revision", model_id, user_email))?;

        let revision = last_revision_or_default(stored);
        debug!(model_id, user_email, revision, found = stored.is_some(), "Read last revision");
        Ok(revision)
    }

    fn save_last_revision(
        &self,
        model_id: &str,
        user_email: &str,
        revision: i64,
    ) -> StorageResult<()> {
        check_revision(revision)?;

        self.conn
            .execute(
                UPSERT_LAST_REVISION_SQL,
                params![model_id, user_email, revision],
            )
            .map_err(query_error("save_last_revision", model_id, user_email))?;

        debug!(model_id, user_email, revision, "Saved last revision");
        Ok(())
    }

    fn save_last_revision_if_current(
        &self,
        model_id: &str,
        user_email: &str,
        expected_previous: i64,
        revision: i64,
    ) -> StorageResult<bool> {
        check_revision(revision)?;

        let updated = self
            .conn
            .execute(
                UPDATE_IF_CURRENT_SQL,
                params![model_id, user_email, expected_previous, revision],
            )
            .map_err(query_error("save_last_revision_if_current", model_id, user_email))?;

        // An absent key reads as the default, so it matches that expectation.
        // DO NOTHING leaves a row that appeared in between untouched.
        let swapped = if updated == 1 {
            true
        } else if expected_previous == DEFAULT_REVISION {
            let inserted = self
                .conn
                .execute(INSERT_IF_ABSENT_SQL, params![model_id, user_email, revision])
                .map_err(query_error("save_last_revision_if_current", model_id, user_email))?;
            inserted == 1
        } else {
            false
        };

        if swapped {
            debug!(model_id, user_email, expected_previous, revision, "Swapped last revision");
        } else {
            debug!(model_id, user_email, expected_previous, revision, "Stale revision, swap rejected");
        }
        Ok(swapped)
    }

    fn records(&self) -> StorageResult<Vec<RevisionRecord>> {
        let scan_error = |source| StorageError::Query {
            operation: "records",
            context: "all records".to_string(),
            source,
        };

        let mut stmt = self.conn.prepare(LIST_RECORDS_SQL).map_err(scan_error)?;
        let records = stmt
            .query_map([], |row| {
                Ok(RevisionRecord {
                    model_id: row.get(0)?,
                    user_email: row.get(1)?,
                    last_revision: row.get(2)?,
                })
            })
            .map_err(scan_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(scan_error)?;

        Ok(records)
    }

    fn record_count(&self) -> StorageResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM last_revisions", [], |row| row.get(0))
            .map_err(|source| StorageError::Query {
                operation: "record_count",
                context: "all records".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::store::contract;

    fn store() -> SqliteRevisionStore {
        SqliteRevisionStore::open_in_memory().unwrap()
    }

    fn file_config(dir: &tempfile::TempDir) -> Config {
        Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn test_store_contract() {
        contract::run_all(|| Box::new(store()));
    }

    #[test]
    fn test_injected_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let store = SqliteRevisionStore::new(conn);
        assert_eq!(store.schema_version().unwrap(), None);

        store.ensure_schema().unwrap();
        store.save_last_revision("m", "u", 3).unwrap();

        let conn = store.into_inner();
        let stored: i64 = conn
            .query_row(
                "SELECT last_revision FROM last_revisions WHERE model_id = 'm' AND user_email = 'u'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, 3);
    }

    #[test]
    fn test_save_without_schema_is_query_error() {
        let store = SqliteRevisionStore::new(Connection::open_in_memory().unwrap());

        let err = store.save_last_revision("m", "u", 2).unwrap_err();
        assert!(err.is_query_error());
        assert!(err.to_string().contains("m/u"));

        let err = store.get_last_revision("m", "u").unwrap_err();
        assert!(err.is_query_error());
    }

    #[test]
    fn test_stored_default_matches_absent() {
        let store = store();
        store.save_last_revision("m", "u", 1).unwrap();
        assert_eq!(store.get_last_revision("m", "u").unwrap(), 1);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn test_connect_leaves_schema_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);

        let store = SqliteRevisionStore::connect(&config).unwrap();
        assert_eq!(store.schema_version().unwrap(), None);

        store.ensure_schema().unwrap();
        assert_eq!(
            store.schema_version().unwrap(),
            Some(storage::SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_read_only_database_serves_reads() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        SqliteRevisionStore::open(&config)
            .unwrap()
            .save_last_revision("model-A", "a@example.com", 9)
            .unwrap();

        let conn = Connection::open_with_flags(
            config.database_path(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .unwrap();
        let store = SqliteRevisionStore::new(conn);
        store.ensure_schema().unwrap();

        assert_eq!(
            store.get_last_revision("model-A", "a@example.com").unwrap(),
            9
        );
        assert_eq!(
            store.get_last_revision("model-B", "x@example.com").unwrap(),
            DEFAULT_REVISION
        );

        let err = store
            .save_last_revision("model-A", "a@example.com", 10)
            .unwrap_err();
        assert!(err.is_query_error());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);

        {
            let store = SqliteRevisionStore::open(&config).unwrap();
            store
                .save_last_revision("model-A", "a@example.com", 5)
                .unwrap();
        }

        let store = SqliteRevisionStore::open(&config).unwrap();
        assert_eq!(
            store.get_last_revision("model-A", "a@example.com").unwrap(),
            5
        );
    }

    #[test]
    fn test_write_visible_to_other_connection() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);

        let writer = SqliteRevisionStore::open(&config).unwrap();
        let reader = SqliteRevisionStore::open(&config).unwrap();

        writer.save_last_revision("m", "u", 11).unwrap();
        assert_eq!(reader.get_last_revision("m", "u").unwrap(), 11);
    }

    #[test]
    fn test_concurrent_cas_increments_lose_nothing() {
        const WRITERS: usize = 4;
        const INCREMENTS: i64 = 25;

        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        SqliteRevisionStore::open(&config).unwrap();

        let barrier = Arc::new(Barrier::new(WRITERS));
        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let config = config.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let conn = storage::open_connection(&config).unwrap();
                    let store = SqliteRevisionStore::new(conn);
                    barrier.wait();
                    for _ in 0..INCREMENTS {
                        loop {
                            let current = store.get_last_revision("m", "u").unwrap();
                            if store
                                .save_last_revision_if_current("m", "u", current, current + 1)
                                .unwrap()
                            {
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let store = SqliteRevisionStore::open(&config).unwrap();
        assert_eq!(
            store.get_last_revision("m", "u").unwrap(),
            DEFAULT_REVISION + WRITERS as i64 * INCREMENTS
        );
    }
}
