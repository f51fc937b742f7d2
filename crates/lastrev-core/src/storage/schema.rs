//! SQLite schema for last-revision records
//!
//! One table keyed by `(model_id, user_email)`, plus a small `schema_info`
//! table tracking the schema version. Initialization is idempotent and
//! verifies the shape of a pre-existing table before accepting it.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use super::error::{StorageError, StorageResult};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Table holding one row per (model, user) key
pub const REVISIONS_TABLE: &str = "last_revisions";

const SCHEMA_INFO_TABLE: &str = "schema_info";

const CREATE_SCHEMA_INFO_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_info (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

const CREATE_REVISIONS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS last_revisions (
        model_id TEXT NOT NULL,
        user_email TEXT NOT NULL,
        last_revision INTEGER NOT NULL,
        PRIMARY KEY (model_id, user_email)
    );
"#;

/// Primary key columns in key order
const KEY_COLUMNS: [&str; 2] = ["model_id", "user_email"];

/// Ensure the revision table exists with the expected shape
///
/// Safe to call any number of times; existing rows are untouched. Once the
/// database is initialized the call only reads, so it also succeeds on a
/// read-only connection.
pub fn ensure_schema(conn: &Connection) -> StorageResult<()> {
    let version = schema_version(conn)?;
    if let Some(version) = version {
        if version > SCHEMA_VERSION {
            return Err(StorageError::IncompatibleSchema {
                table: SCHEMA_INFO_TABLE,
                details: format!(
                    "database is at schema version {}, this build supports up to {}",
                    version, SCHEMA_VERSION
                ),
            });
        }
    }

    if !table_exists(conn, REVISIONS_TABLE)? {
        conn.execute_batch(CREATE_REVISIONS_SQL)
            .map_err(|source| StorageError::Schema {
                table: REVISIONS_TABLE,
                source,
            })?;
    }

    verify_revisions_table(conn)?;

    if version == Some(SCHEMA_VERSION) {
        debug!(version = SCHEMA_VERSION, "Revision schema already current");
        return Ok(());
    }

    let schema_info_err = |source| StorageError::Schema {
        table: SCHEMA_INFO_TABLE,
        source,
    };
    conn.execute_batch(CREATE_SCHEMA_INFO_SQL)
        .map_err(schema_info_err)?;
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )
    .map_err(schema_info_err)?;

    info!(version = SCHEMA_VERSION, "Revision schema ready");
    Ok(())
}

/// Get the current schema version from the database
///
/// Returns `None` before the first successful `ensure_schema`.
pub fn schema_version(conn: &Connection) -> StorageResult<Option<i32>> {
    if !table_exists(conn, SCHEMA_INFO_TABLE)? {
        return Ok(None);
    }

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| StorageError::Schema {
            table: SCHEMA_INFO_TABLE,
            source,
        })?;

    Ok(value.and_then(|v| v.parse().ok()))
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    match schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

fn table_exists(conn: &Connection, table: &'static str) -> StorageResult<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
        .and_then(|mut stmt| stmt.exists([table]))
        .map_err(|source| StorageError::Schema { table, source })
}

/// One row of `PRAGMA table_info`
struct ColumnInfo {
    name: String,
    declared_type: String,
    not_null: bool,
    has_default: bool,
    pk_position: i64,
}

fn verify_revisions_table(conn: &Connection) -> StorageResult<()> {
    let schema_err = |source| StorageError::Schema {
        table: REVISIONS_TABLE,
        source,
    };

    let mut stmt = conn
        .prepare("SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?)")
        .map_err(schema_err)?;
    let columns = stmt
        .query_map([REVISIONS_TABLE], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                declared_type: row.get(1)?,
                not_null: row.get::<_, i64>(2)? != 0,
                has_default: row.get::<_, Option<String>>(3)?.is_some(),
                pk_position: row.get(4)?,
            })
        })
        .map_err(schema_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(schema_err)?;

    let incompatible = |details: String| StorageError::IncompatibleSchema {
        table: REVISIONS_TABLE,
        details,
    };

    for required in ["model_id", "user_email", "last_revision"] {
        let Some(column) = columns.iter().find(|c| c.name == required) else {
            return Err(incompatible(format!("missing column '{}'", required)));
        };
        if !column.not_null {
            return Err(incompatible(format!(
                "column '{}' must be NOT NULL",
                required
            )));
        }
    }

    // SQLite integer affinity: any declared type containing "INT"
    if let Some(revision) = columns.iter().find(|c| c.name == "last_revision") {
        if !revision.declared_type.to_ascii_uppercase().contains("INT") {
            return Err(incompatible(format!(
                "column 'last_revision' has type '{}', expected INTEGER",
                revision.declared_type
            )));
        }
    }

    let mut key: Vec<&ColumnInfo> = columns.iter().filter(|c| c.pk_position > 0).collect();
    key.sort_by_key(|c| c.pk_position);
    let key: Vec<&str> = key.iter().map(|c| c.name.as_str()).collect();
    if key != KEY_COLUMNS {
        return Err(incompatible(format!(
            "primary key is ({}), expected ({})",
            key.join(", "),
            KEY_COLUMNS.join(", ")
        )));
    }

    // Any other required column would make every upsert fail
    if let Some(extra) = columns.iter().find(|c| {
        !matches!(c.name.as_str(), "model_id" | "user_email" | "last_revision")
            && c.not_null
            && !c.has_default
    }) {
        return Err(incompatible(format!(
            "column '{}' is NOT NULL without a default",
            extra.name
        )));
    }

    debug!(table = REVISIONS_TABLE, "Verified table shape");
    Ok(())
}
