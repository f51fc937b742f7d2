//! lastrev CLI
//!
//! Command-line interface for inspecting and maintaining last assertion
//! revisions.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lastrev_core::{Config, SqliteRevisionStore, StorageResult};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "lastrev")]
#[command(about = "lastrev - Last assertion revision per model and user")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the revision table if it does not exist
    Init,
    /// Show the last revision for a model and user
    Get {
        /// Model identifier
        model_id: String,
        /// User email
        user_email: String,
    },
    /// Record a revision, overwriting whatever is stored
    Save {
        /// Model identifier
        model_id: String,
        /// User email
        user_email: String,
        /// Revision to store (1 or greater)
        revision: i64,
    },
    /// Record a revision only if the stored one matches
    Cas {
        /// Model identifier
        model_id: String,
        /// User email
        user_email: String,
        /// Revision expected to be stored now
        expected: i64,
        /// Revision to store
        revision: i64,
    },
    /// List all recorded revisions
    #[command(alias = "ls")]
    List,
    /// Show database status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, database_path, busy_timeout_ms, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work without a database
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);

    // init and status report on the schema instead of creating it
    let open: fn(&Config) -> StorageResult<SqliteRevisionStore> = match cli.command {
        Commands::Init | Commands::Status => SqliteRevisionStore::connect,
        _ => SqliteRevisionStore::open,
    };
    let store = open(&config).with_context(|| {
        format!(
            "Failed to open revision database at {}",
            config.database_path().display()
        )
    })?;
    debug!(database = %config.database_path().display(), "Store ready");

    match cli.command {
        Commands::Init => commands::revision::init(&store, &output),
        Commands::Get {
            model_id,
            user_email,
        } => commands::revision::get(&store, model_id, user_email, &output),
        Commands::Save {
            model_id,
            user_email,
            revision,
        } => commands::revision::save(&store, model_id, user_email, revision, &output),
        Commands::Cas {
            model_id,
            user_email,
            expected,
            revision,
        } => commands::revision::compare_and_swap(
            &store, model_id, user_email, expected, revision, &output,
        ),
        Commands::List => commands::revision::list(&store, &output),
        Commands::Status => commands::status::show(&store, &config, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// Only initializes if LASTREV_LOG environment variable is set.
/// Logs to config.log_file when set, otherwise stderr.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("LASTREV_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!(
        "lastrev_core={},lastrev_cli={}",
        log_level, log_level
    ));

    match &config.log_file {
        Some(log_path) => {
            let log_file = match File::create(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                    return;
                }
            };

            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cas() {
        let cli = Cli::try_parse_from([
            "lastrev",
            "--json",
            "cas",
            "model-A",
            "a@example.com",
            "5",
            "6",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Cas {
                model_id,
                user_email,
                expected,
                revision,
            } => {
                assert_eq!(model_id, "model-A");
                assert_eq!(user_email, "a@example.com");
                assert_eq!(expected, 5);
                assert_eq!(revision, 6);
            }
            _ => panic!("expected cas command"),
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_revision() {
        assert!(Cli::try_parse_from(["lastrev", "save", "m", "u", "next"]).is_err());
    }
}
