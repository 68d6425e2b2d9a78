//! In-memory checkpoint store.

use super::{CheckpointKind, CheckpointRecords, CheckpointStore};
use crate::errors::CheckpointError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Checkpoint store that keeps records in memory. Clones share storage.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCheckpointStore {
    entries: Arc<Mutex<HashMap<CheckpointKind, CheckpointRecords>>>,
}

impl InMemoryCheckpointStore {
    /// Creates a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing has been saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns true if a checkpoint of this kind was saved.
    #[must_use]
    pub fn contains(&self, kind: CheckpointKind) -> bool {
        self.entries.lock().contains_key(&kind)
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, records: &CheckpointRecords) -> Result<(), CheckpointError> {
        self.entries.lock().insert(records.kind(), records.clone());
        Ok(())
    }

    fn load(&self, kind: CheckpointKind) -> Result<Option<CheckpointRecords>, CheckpointError> {
        Ok(self
            .entries
            .lock()
            .get(&kind)
            .filter(|records| !records.is_empty())
            .cloned())
    }

    fn clear(&self, kind: CheckpointKind) -> Result<(), CheckpointError> {
        self.entries.lock().remove(&kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobPosting;

    #[test]
    fn test_save_and_load() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.is_empty());

        store
            .save_jobs(&[JobPosting::new("Analyst", "Acme", "https://x/1", "")])
            .unwrap();

        assert!(store.contains(CheckpointKind::Jobs));
        assert_eq!(store.load_jobs().unwrap().unwrap().len(), 1);
        assert!(store.load_cover_letters().unwrap().is_none());
    }

    #[test]
    fn test_empty_checkpoint_loads_as_none() {
        let store = InMemoryCheckpointStore::new();
        store.save_jobs(&[]).unwrap();
        assert!(store.contains(CheckpointKind::Jobs));
        assert!(store.load_jobs().unwrap().is_none());
    }

    #[test]
    fn test_clones_share_storage() {
        let store = InMemoryCheckpointStore::new();
        let clone = store.clone();
        clone
            .save_jobs(&[JobPosting::new("Analyst", "Acme", "https://x/1", "")])
            .unwrap();
        assert_eq!(store.len(), 1);

        store.clear_all().unwrap();
        assert!(clone.is_empty());
    }
}
