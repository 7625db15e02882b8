//! Persisted sink: bounded, newest-first list of entries in key-value storage

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use super::{Level, LevelCell, LogEntry, Logger, child_context};
use crate::storage::{SharedStore, StorageError, read_json, write_json};

/// Logger appending [`LogEntry`] records to storage
///
/// Entries are kept newest-first under `storage_key` and truncated to
/// `max_log_size`. Storage failures are reported to the console only; a
/// logging call never fails.
pub struct StorageLogger {
    context: String,
    level: LevelCell,
    store: SharedStore,
    storage_key: String,
    max_log_size: usize,
    /// Serializes read-modify-write across this logger and its children
    write_lock: Arc<Mutex<()>>,
}

impl StorageLogger {
    pub fn new(context: &str, level: Level, store: SharedStore, storage_key: &str, max_log_size: usize) -> Self {
        Self {
            context: context.to_string(),
            level: LevelCell::new(level),
            store,
            storage_key: storage_key.to_string(),
            max_log_size,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn max_log_size(&self) -> usize {
        self.max_log_size
    }

    /// Persisted entries, newest first; unreadable storage yields an empty list
    pub fn entries(&self) -> Vec<LogEntry> {
        match read_json::<Vec<LogEntry>>(self.store.as_ref(), &self.storage_key) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "StorageLogger::entries: unreadable log storage");
                Vec::new()
            }
        }
    }

    /// Drop every persisted entry
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        if let Err(e) = self.store.remove(&self.storage_key) {
            warn!(key = %self.storage_key, error = %e, "StorageLogger::clear: failed to clear logs");
        }
    }

    fn append(&self, entry: LogEntry) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut entries = match read_json::<Vec<LogEntry>>(self.store.as_ref(), &self.storage_key) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(StorageError::Json(e)) => {
                warn!(key = %self.storage_key, error = %e, "StorageLogger: discarding corrupt log storage");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        entries.insert(0, entry);
        entries.truncate(self.max_log_size);
        write_json(self.store.as_ref(), &self.storage_key, &entries)
    }
}

impl Logger for StorageLogger {
    fn log(&self, level: Level, message: &str, details: Option<&Value>) {
        if !self.is_enabled(level) {
            return;
        }
        let entry = LogEntry::new(level, &self.context, message, details);
        if let Err(e) = self.append(entry) {
            warn!(key = %self.storage_key, error = %e, "StorageLogger: failed to persist log entry");
        }
    }

    fn set_level(&self, level: Level) {
        self.level.set(level);
    }

    fn level(&self) -> Level {
        self.level.get()
    }

    fn context(&self) -> &str {
        &self.context
    }

    fn child(&self, context: &str) -> Arc<dyn Logger> {
        Arc::new(StorageLogger {
            context: child_context(&self.context, context),
            level: LevelCell::new(self.level()),
            store: self.store.clone(),
            storage_key: self.storage_key.clone(),
            max_log_size: self.max_log_size,
            write_lock: self.write_lock.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use proptest::prelude::*;

    fn logger(max: usize) -> (StorageLogger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let logger = StorageLogger::new("app", Level::Trace, store.clone(), "app_logs", max);
        (logger, store)
    }

    #[test]
    fn test_entries_newest_first() {
        let (logger, _) = logger(10);
        logger.info("first");
        logger.warn("second");

        let entries = logger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[0].level, Level::Warn);
        assert_eq!(entries[1].message, "first");
    }

    #[test]
    fn test_evicts_oldest_first() {
        let (logger, _) = logger(3);
        for i in 0..5 {
            logger.info(&format!("msg-{}", i));
        }

        let messages: Vec<_> = logger.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["msg-4", "msg-3", "msg-2"]);
    }

    #[test]
    fn test_filters_below_threshold() {
        let (logger, store) = logger(10);
        logger.set_level(Level::Error);
        logger.info("dropped");
        assert!(store.get("app_logs").unwrap().is_none());

        logger.error("kept");
        assert_eq!(logger.entries().len(), 1);
    }

    #[test]
    fn test_details_are_persisted() {
        let (logger, _) = logger(10);
        let details = serde_json::json!({"status": 503});
        logger.log(Level::Error, "load failed", Some(&details));

        let entries = logger.entries();
        assert_eq!(entries[0].details, Some(details));
        assert_eq!(entries[0].context, "app");
    }

    #[test]
    fn test_corrupt_storage_is_replaced() {
        let (logger, store) = logger(10);
        store.set("app_logs", "not json").unwrap();

        logger.info("after corruption");
        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "after corruption");
    }

    #[test]
    fn test_child_shares_storage_and_copies_level() {
        let (parent, _) = logger(10);
        parent.set_level(Level::Info);
        let child = parent.child("auth");

        child.info("from child");
        parent.info("from parent");

        let entries = parent.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].context, "app:auth");

        child.set_level(Level::Off);
        assert_eq!(parent.level(), Level::Info);
    }

    #[test]
    fn test_clear() {
        let (logger, _) = logger(10);
        logger.info("x");
        logger.clear();
        assert!(logger.entries().is_empty());
    }

    /// Store whose writes always fail
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn test_write_failure_never_escapes() {
        let logger = StorageLogger::new("app", Level::Trace, Arc::new(FailingStore), "app_logs", 10);
        logger.error("cannot be stored");
        logger.clear();
        assert!(logger.entries().is_empty());
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_max_log_size(max in 1usize..20, writes in 0usize..60) {
            let (logger, _) = logger(max);
            for i in 0..writes {
                logger.info(&format!("entry-{}", i));
            }
            let entries = logger.entries();
            prop_assert_eq!(entries.len(), writes.min(max));
            if writes > 0 {
                let newest = format!("entry-{}", writes - 1);
                prop_assert_eq!(&entries[0].message, &newest);
            }
        }
    }
}
