//! Data models for lastrev
//!
//! A revision record maps a (model, user) key to the last assertion
//! revision issued for it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Revision reported for a key that has never been saved
///
/// Assertions issued before revisions were tracked all carried this value.
pub const DEFAULT_REVISION: i64 = 1;

/// Composite key identifying one record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionKey {
    /// Model identifier
    pub model_id: String,
    /// User email
    pub user_email: String,
}

impl RevisionKey {
    pub fn new(model_id: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            user_email: user_email.into(),
        }
    }
}

impl fmt::Display for RevisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model_id, self.user_email)
    }
}

/// The last revision recorded for a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    /// Model identifier
    pub model_id: String,
    /// User email
    pub user_email: String,
    /// Last revision issued, always at least [`DEFAULT_REVISION`]
    pub last_revision: i64,
}

impl RevisionRecord {
    pub fn new(key: RevisionKey, last_revision: i64) -> Self {
        Self {
            model_id: key.model_id,
            user_email: key.user_email,
            last_revision,
        }
    }

    /// The record's composite key
    pub fn key(&self) -> RevisionKey {
        RevisionKey::new(self.model_id.clone(), self.user_email.clone())
    }
}
