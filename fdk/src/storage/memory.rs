//! In-memory store, used by tests and short-lived runtimes

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use super::{KeyValueStore, StorageError};

/// Process-local key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        debug!(%key, len = value.len(), "MemoryStore::set: called");
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        debug!(%key, "MemoryStore::remove: called");
        self.values.lock().remove(key);
        Ok(())
    }
}
