//! Status command handler

use anyhow::{Context, Result};

use lastrev_core::{Config, RevisionStore, SqliteRevisionStore};

use crate::output::{Output, OutputFormat};

/// Show database location, schema version and record count
pub fn show(store: &SqliteRevisionStore, config: &Config, output: &Output) -> Result<()> {
    let version = store
        .schema_version()
        .context("Failed to read schema version")?;
    // No table to count before init
    let count = match version {
        Some(_) => store
            .record_count()
            .context("Failed to count revision records")?,
        None => 0,
    };
    let database = config.database_path();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "database": database,
                    "schema_version": version,
                    "records": count,
                    "busy_timeout_ms": config.busy_timeout_ms
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", count);
        }
        OutputFormat::Human => {
            println!("lastrev Status");
            println!("==============");
            println!();
            println!("Database:");
            println!("  Path:           {}", database.display());
            println!(
                "  Schema version: {}",
                version
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "(not initialized)".to_string())
            );
            println!("  Busy timeout:   {} ms", config.busy_timeout_ms);
            println!();
            println!("Contents:");
            println!("  Records: {}", count);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> Config {
        Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn test_status_does_not_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let store = SqliteRevisionStore::connect(&config).unwrap();

        show(&store, &config, &Output::new(OutputFormat::Quiet)).unwrap();

        assert_eq!(store.schema_version().unwrap(), None);
    }

    #[test]
    fn test_status_after_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let store = SqliteRevisionStore::connect(&config).unwrap();
        store.ensure_schema().unwrap();
        store.save_last_revision("m", "u", 2).unwrap();

        show(&store, &config, &Output::new(OutputFormat::Json)).unwrap();

        assert_eq!(store.record_count().unwrap(), 1);
    }
}
