//! In-memory revision store

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{check_revision, last_revision_or_default, RevisionStore};
use crate::models::{RevisionKey, RevisionRecord, DEFAULT_REVISION};
use crate::storage::{StorageError, StorageResult};

/// In-memory revision store backed by `Mutex<HashMap>`.
///
/// Same semantics as the SQLite store, for callers that want a test double
/// without a database. Contents are lost when the store is dropped.
#[derive(Default)]
pub struct InMemoryRevisionStore {
    revisions: Mutex<HashMap<RevisionKey, i64>>,
}

impl InMemoryRevisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<RevisionKey, i64>>> {
        self.revisions
            .lock()
            .map_err(|e| StorageError::Poisoned(e.to_string()))
    }
}

impl RevisionStore for InMemoryRevisionStore {
    fn ensure_schema(&self) -> StorageResult<()> {
        Ok(())
    }

    fn get_last_revision(&self, model_id: &str, user_email: &str) -> StorageResult<i64> {
        let revisions = self.lock()?;
        let stored = revisions
            .get(&RevisionKey::new(model_id, user_email))
            .copied();
        Ok(last_revision_or_default(stored))
    }

    fn save_last_revision(
        &self,
        model_id: &str,
        user_email: &str,
        revision: i64,
    ) -> StorageResult<()> {
        check_revision(revision)?;
        self.lock()?
            .insert(RevisionKey::new(model_id, user_email), revision);
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

        let mut revisions = self.lock()?;
        let key = RevisionKey::new(model_id, user_email);
        let matches = match revisions.get(&key) {
            Some(&current) => current == expected_previous,
            None => expected_previous == DEFAULT_REVISION,
        };
        if matches {
            revisions.insert(key, revision);
        }
        Ok(matches)
    }

    fn records(&self) -> StorageResult<Vec<RevisionRecord>> {
        let revisions = self.lock()?;
        let mut records: Vec<RevisionRecord> = revisions
            .iter()
            .map(|(key, &revision)| RevisionRecord::new(key.clone(), revision))
            .collect();
        records.sort_by(|a, b| {
            (&a.model_id, &a.user_email).cmp(&(&b.model_id, &b.user_email))
        });
        Ok(records)
    }

    fn record_count(&self) -> StorageResult<i64> {
        Ok(self.lock()?.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::store::contract;

    #[test]
    fn test_store_contract() {
        contract::run_all(|| Box::new(InMemoryRevisionStore::new()));
    }

    #[test]
    fn test_unguarded_increments_can_collide() {
        // Two callers that both read before either writes compute the same
        // next value; the second save lands on top of the first.
        let store = InMemoryRevisionStore::new();
        let first = store.get_last_revision("m", "u").unwrap();
        let second = store.get_last_revision("m", "u").unwrap();

        store.save_last_revision("m", "u", first + 1).unwrap();
        store.save_last_revision("m", "u", second + 1).unwrap();

        assert_eq!(store.get_last_revision("m", "u").unwrap(), 2);
    }

    #[test]
    fn test_concurrent_cas_increments() {
        let store = Arc::new(InMemoryRevisionStore::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..50 {
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

        assert_eq!(store.get_last_revision("m", "u").unwrap(), 1 + 8 * 50);
    }
}
