//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use lastrev_core::RevisionRecord;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the revision for one key
    ///
    /// Quiet mode prints only the number, for use in scripts.
    pub fn print_revision(&self, record: &RevisionRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("Model:    {}", record.model_id);
                println!("User:     {}", record.user_email);
                println!("Revision: {}", record.last_revision);
            }
            OutputFormat::Json => {
                println!("{}", to_json(record));
            }
            OutputFormat::Quiet => {
                println!("{}", record.last_revision);
            }
        }
    }

    /// Print a list of records
    pub fn print_records(&self, records: &[RevisionRecord]) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No revisions recorded.");
                    return;
                }
                let model_width = column_width(records.iter().map(|r| r.model_id.as_str()), "MODEL");
                let user_width = column_width(records.iter().map(|r| r.user_email.as_str()), "USER");
                println!(
                    "{:<mw$}  {:<uw$}  REVISION",
                    "MODEL",
                    "USER",
                    mw = model_width,
                    uw = user_width
                );
                for record in records {
                    println!(
                        "{:<mw$}  {:<uw$}  {}",
                        record.model_id,
                        record.user_email,
                        record.last_revision,
                        mw = model_width,
                        uw = user_width
                    );
                }
                println!("\n{} record(s)", records.len());
            }
            OutputFormat::Json => {
                println!("{}", to_json(&records));
            }
            OutputFormat::Quiet => {
                for record in records {
                    println!(
                        "{}\t{}\t{}",
                        record.model_id, record.user_email, record.last_revision
                    );
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Widest value in a column, never narrower than its header
fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values
        .map(|v| v.chars().count())
        .max()
        .unwrap_or(0)
        .max(header.len())
}
