//! lastrev Core Library
//!
//! Tracks the last assertion revision issued for each (model, user) pair so
//! an issuing service can derive the next revision before signing a new
//! assertion.
//!
//! # Quick Start
//!
//! ```text
//! let store = SqliteRevisionStore::open(&Config::load()?)?;
//!
//! let current = store.get_last_revision("model-A", "a@example.com")?; // 1 if never saved
//! if !store.save_last_revision_if_current("model-A", "a@example.com", current, current + 1)? {
//!     // another issuer won the race, read again
//! }
//! ```
//!
//! # Modules
//!
//! - `store`: `RevisionStore` trait with SQLite and in-memory implementations
//! - `models`: Revision keys and records
//! - `storage`: Connection setup, schema and storage errors
//! - `config`: Application configuration

pub mod config;
pub mod models;
pub mod storage;
pub mod store;

pub use config::Config;
pub use models::{RevisionKey, RevisionRecord, DEFAULT_REVISION};
pub use storage::{StorageError, StorageResult};
pub use store::{InMemoryRevisionStore, RevisionStore, SqliteRevisionStore};
