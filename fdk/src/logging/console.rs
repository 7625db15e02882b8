//! Console sink: forwards to the tracing subscriber at the matching level

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use super::{Level, LevelCell, Logger, child_context};

/// Logger writing to the console channel of each call's level
#[derive(Debug)]
pub struct ConsoleLogger {
    context: String,
    level: LevelCell,
}

impl ConsoleLogger {
    pub fn new(context: &str, level: Level) -> Self {
        Self {
            context: context.to_string(),
            level: LevelCell::new(level),
        }
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, level: Level, message: &str, details: Option<&Value>) {
        if !self.is_enabled(level) {
            return;
        }
        let context = self.context.as_str();
        let details = details.map(Value::to_string).unwrap_or_default();
        match level {
            Level::Trace => trace!(%context, %details, "{}", message),
            Level::Debug => debug!(%context, %details, "{}", message),
            Level::Info => info!(%context, %details, "{}", message),
            Level::Warn => warn!(%context, %details, "{}", message),
            Level::Error => error!(%context, %details, "{}", message),
            Level::Fatal => error!(%context, %details, fatal = true, "{}", message),
            Level::Off => {}
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
        Arc::new(ConsoleLogger::new(&child_context(&self.context, context), self.level()))
    }
}
