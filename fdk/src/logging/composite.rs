//! Composite sink: fans every call out to its members

use std::sync::Arc;

use serde_json::Value;

use super::{Level, LevelCell, Logger, child_context};

/// Logger forwarding each call, including level changes, to all members
///
/// A call must pass the composite's own threshold before any member sees it,
/// and members then apply theirs. `child(ctx)` builds a composite of
/// each member's own child, so the fan-out shape is preserved at every depth.
pub struct CompositeLogger {
    context: String,
    level: LevelCell,
    members: Vec<Arc<dyn Logger>>,
}

impl CompositeLogger {
    /// The composite starts at the lowest member level (Info when empty)
    pub fn new(context: &str, members: Vec<Arc<dyn Logger>>) -> Self {
        let level = members.iter().map(|m| m.level()).min().unwrap_or(Level::Info);
        Self {
            context: context.to_string(),
            level: LevelCell::new(level),
            members,
        }
    }

    pub fn members(&self) -> &[Arc<dyn Logger>] {
        &self.members
    }
}

impl Logger for CompositeLogger {
    fn log(&self, level: Level, message: &str, details: Option<&Value>) {
        if !self.is_enabled(level) {
            return;
        }
        for member in &self.members {
            member.log(level, message, details);
        }
    }

    fn set_level(&self, level: Level) {
        self.level.set(level);
        for member in &self.members {
            member.set_level(level);
        }
    }

    fn level(&self) -> Level {
        self.level.get()
    }

    fn context(&self) -> &str {
        &self.context
    }

    fn child(&self, context: &str) -> Arc<dyn Logger> {
        let members = self.members.iter().map(|m| m.child(context)).collect();
        let child = CompositeLogger {
            context: child_context(&self.context, context),
            level: LevelCell::new(self.level()),
            members,
        };
        Arc::new(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{ConsoleLogger, StorageLogger};
    use crate::storage::MemoryStore;

    fn composite() -> (CompositeLogger, Arc<StorageLogger>) {
        let store = Arc::new(MemoryStore::new());
        let persisted = Arc::new(StorageLogger::new("app", Level::Debug, store, "app_logs", 100));
        let console: Arc<dyn Logger> = Arc::new(ConsoleLogger::new("app", Level::Debug));
        let logger = CompositeLogger::new("app", vec![console, persisted.clone() as Arc<dyn Logger>]);
        (logger, persisted)
    }

    #[test]
    fn test_fans_out_calls() {
        let (logger, persisted) = composite();
        logger.info("hello");
        logger.debug("details");
        assert_eq!(persisted.entries().len(), 2);
    }

    #[test]
    fn test_set_level_propagates_to_members() {
        let (logger, persisted) = composite();
        logger.set_level(Level::Error);

        assert_eq!(logger.level(), Level::Error);
        for member in logger.members() {
            assert_eq!(member.level(), Level::Error);
        }

        logger.warn("filtered by members");
        assert!(persisted.entries().is_empty());
    }

    #[test]
    fn test_own_threshold_gates_members() {
        let (logger, persisted) = composite();
        logger.set_level(Level::Warn);
        persisted.set_level(Level::Trace);

        logger.info("below the composite threshold");
        assert!(persisted.entries().is_empty());

        logger.warn("passes both");
        assert_eq!(persisted.entries().len(), 1);
    }

    #[test]
    fn test_child_preserves_fan_out_topology() {
        let (logger, persisted) = composite();
        let child = logger.child("endpoints");
        let grandchild = child.child("retry");

        assert_eq!(child.context(), "app:endpoints");
        assert_eq!(grandchild.context(), "app:endpoints:retry");

        grandchild.info("deep message");
        let entries = persisted.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].context, "app:endpoints:retry");
    }

    #[test]
    fn test_child_level_is_independent() {
        let (logger, _) = composite();
        let child = logger.child("auth");

        child.set_level(Level::Fatal);
        assert_eq!(logger.level(), Level::Debug);
        for member in logger.members() {
            assert_eq!(member.level(), Level::Debug);
        }

        logger.set_level(Level::Trace);
        assert_eq!(child.level(), Level::Fatal);
    }

    #[test]
    fn test_empty_composite_is_a_no_op() {
        let logger = CompositeLogger::new("app", Vec::new());
        logger.error("nobody listens");
        assert_eq!(logger.level(), Level::Info);
        assert_eq!(logger.child("x").context(), "app:x");
    }
}
