//! In-process store.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::Result;
use crate::store::{KeyValueStore, StoredValue};

/// A [`KeyValueStore`] that lives only as long as the process.
///
/// Clones share nothing; wrap it in an `Arc` to share one instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: StoredValue) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}
