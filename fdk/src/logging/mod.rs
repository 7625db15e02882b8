//! Domain logger family
//!
//! Services log through the [`Logger`] trait, which has three interchangeable
//! implementations:
//!
//! - [`ConsoleLogger`] - forwards to the process `tracing` subscriber
//! - [`StorageLogger`] - prepends [`LogEntry`] records to a bounded list in storage
//! - [`CompositeLogger`] - fans every call out to a list of loggers
//!
//! Every logger filters by a [`Level`] threshold and can produce a scoped
//! `child(ctx)` whose context is `"{parent}:{ctx}"`. A child copies the
//! parent's level at creation; later level changes on either side do not
//! propagate to the other.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod composite;
mod console;
mod storage;

pub use composite::CompositeLogger;
pub use console::ConsoleLogger;
pub use storage::StorageLogger;

use crate::config::LoggingConfig;
use crate::storage::SharedStore;

/// Log severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
    /// Threshold only: disables every message
    Off = 6,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
        Level::Off,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Off => "OFF",
        }
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL.get(value as usize).copied().unwrap_or(Level::Off)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            "OFF" | "NONE" => Ok(Level::Off),
            other => Err(format!("Unknown log level: '{}'", other)),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_string()
    }
}

/// A single structured log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub context: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl LogEntry {
    /// Create a new entry with the current timestamp
    pub fn new(level: Level, context: &str, message: &str, details: Option<&Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            context: context.to_string(),
            message: message.to_string(),
            details: details.cloned(),
        }
    }
}

/// Leveled logger with context scoping
pub trait Logger: Send + Sync {
    /// Record a message; dropped when below the current threshold
    fn log(&self, level: Level, message: &str, details: Option<&Value>);

    fn set_level(&self, level: Level);

    fn level(&self) -> Level;

    fn context(&self) -> &str;

    /// New logger scoped to `"{context}:{child}"`; the parent is untouched
    fn child(&self, context: &str) -> Arc<dyn Logger>;

    fn is_enabled(&self, level: Level) -> bool {
        level != Level::Off && level >= self.level()
    }

    fn trace(&self, message: &str) {
        self.log(Level::Trace, message, None);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message, None);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message, None);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message, None);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message, None);
    }

    fn fatal(&self, message: &str) {
        self.log(Level::Fatal, message, None);
    }
}

/// Shared handle used by every service
pub type SharedLogger = Arc<dyn Logger>;

/// Threshold cell shared by the logger implementations
#[derive(Debug)]
pub(crate) struct LevelCell(AtomicU8);

impl LevelCell {
    pub(crate) fn new(level: Level) -> Self {
        Self(AtomicU8::new(level as u8))
    }

    pub(crate) fn get(&self) -> Level {
        Level::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, level: Level) {
        self.0.store(level as u8, Ordering::Relaxed);
    }
}

/// Context string of a child logger
pub(crate) fn child_context(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}:{}", parent, child)
    }
}

/// Build the configured logger topology
///
/// Console only, or console + storage behind a composite when persistence is
/// enabled and a store is available.
pub fn from_config(config: &LoggingConfig, store: Option<SharedStore>) -> SharedLogger {
    let console: SharedLogger = Arc::new(ConsoleLogger::new(&config.context, config.level));
    match store {
        Some(store) if config.persist => {
            let persisted: SharedLogger = Arc::new(StorageLogger::new(
                &config.context,
                config.level,
                store,
                &config.storage_key,
                config.max_log_size,
            ));
            Arc::new(CompositeLogger::new(&config.context, vec![console, persisted]))
        }
        _ => console,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
        assert!(Level::Fatal < Level::Off);
    }

    #[test]
    fn test_level_parse_and_display() {
        assert_eq!("debug".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!("WARNING".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!(" off ".parse::<Level>().unwrap(), Level::Off);
        assert!("loud".parse::<Level>().is_err());
        assert_eq!(Level::Fatal.to_string(), "FATAL");
    }

    #[test]
    fn test_level_try_from_string() {
        assert_eq!(Level::try_from("error".to_string()), Ok(Level::Error));
        assert_eq!(
            Level::try_from("loud".to_string()),
            Err("Unknown log level: 'LOUD'".to_string())
        );
        let level: Level = serde_yaml::from_str("Warn").unwrap();
        assert_eq!(level, Level::Warn);
    }

    #[test]
    fn test_level_cell_roundtrip() {
        let cell = LevelCell::new(Level::Info);
        for level in Level::ALL {
            cell.set(level);
            assert_eq!(cell.get(), level);
        }
    }

    #[test]
    fn test_log_entry_serialization() {
        let entry = LogEntry::new(Level::Warn, "app:auth", "token expired", None);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "WARN");
        assert_eq!(json["context"], "app:auth");
        assert!(json.get("details").is_none());

        let back: LogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_child_context() {
        assert_eq!(child_context("app", "auth"), "app:auth");
        assert_eq!(child_context("", "auth"), "auth");
    }

    #[test]
    fn test_from_config_topology() {
        let mut config = LoggingConfig::default();
        let store: SharedStore = Arc::new(MemoryStore::new());

        let logger = from_config(&config, Some(store.clone()));
        logger.info("persisted");
        assert!(store.get("app_logs").unwrap().is_some());

        config.persist = false;
        let store2: SharedStore = Arc::new(MemoryStore::new());
        let logger = from_config(&config, Some(store2.clone()));
        logger.info("console only");
        assert!(store2.get("app_logs").unwrap().is_none());
    }
}
