//! Storage layer
//!
//! Connection setup, schema initialization and typed storage errors.
//! Connections are opened here and handed to a store explicitly; nothing in
//! this crate holds a global handle.

pub mod error;
pub mod schema;

use rusqlite::Connection;
use tracing::debug;

use crate::config::Config;

pub use error::{StorageError, StorageResult};
pub use schema::{ensure_schema, needs_init, schema_version, REVISIONS_TABLE, SCHEMA_VERSION};

/// Open the configured SQLite database, creating its directory if needed
///
/// The returned connection has the configured busy timeout applied. The
/// schema is not touched; call [`ensure_schema`] once at startup.
pub fn open_connection(config: &Config) -> StorageResult<Connection> {
    let path = config.database_path();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let conn = Connection::open(&path).map_err(|source| StorageError::Open {
        path: path.clone(),
        source,
    })?;
    conn.busy_timeout(config.busy_timeout())
        .map_err(|source| StorageError::Open {
            path: path.clone(),
            source,
        })?;

    debug!(path = %path.display(), "Opened revision database");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_connection_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("a").join("b"),
            ..Config::default()
        };

        let conn = open_connection(&config).unwrap();
        ensure_schema(&conn).unwrap();

        assert!(config.database_path().exists());
    }

    #[test]
    fn test_schema_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: Some(dir.path().join("revisions.db")),
            ..Config::default()
        };

        {
            let conn = open_connection(&config).unwrap();
            ensure_schema(&conn).unwrap();
        }

        let conn = open_connection(&config).unwrap();
        assert!(!needs_init(&conn));
        assert_eq!(schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }
}
