//! Event Bus - synchronous pub/sub hub for flowdeck services
//!
//! Handlers run on the emitter's thread, in subscription order, before
//! `emit` returns. A failing or panicking handler is logged and skipped; the
//! remaining handlers for that emission still run.

use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error};

use crate::logging::{Level, SharedLogger};

/// Default limit for nested emissions on one thread
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Subscriber callback
pub type Handler = Arc<dyn Fn(&Value) -> eyre::Result<()> + Send + Sync>;

/// Errors returned to the emitter
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event recursion limit reached emitting '{topic}' (depth {depth})")]
    RecursionLimit { topic: String, depth: usize },
}

thread_local! {
    static EMIT_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks nesting of `emit` calls on the current thread
struct DepthGuard;

impl DepthGuard {
    fn enter(topic: &str, max_depth: usize) -> Result<Self, EventError> {
        EMIT_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= max_depth {
                return Err(EventError::RecursionLimit {
                    topic: topic.to_string(),
                    depth: current,
                });
            }
            depth.set(current + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        EMIT_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

struct Entry {
    id: u64,
    handler: Handler,
    once: bool,
}

struct BusInner {
    subscriptions: Mutex<HashMap<String, Vec<Entry>>>,
    next_id: AtomicU64,
    max_depth: usize,
    logger: Mutex<Option<SharedLogger>>,
}

impl BusInner {
    fn remove(&self, topic: &str, id: u64) -> bool {
        let mut subs = self.subscriptions.lock();
        let Some(list) = subs.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subs.remove(topic);
        }
        removed
    }
}

/// Central event bus
///
/// Cheap to clone; clones share the same subscriptions.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new event bus with the given nesting limit
    pub fn new(max_depth: usize) -> Self {
        debug!(max_depth, "EventBus::new: creating event bus");
        Self {
            inner: Arc::new(BusInner {
                subscriptions: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                max_depth: max_depth.max(1),
                logger: Mutex::new(None),
            }),
        }
    }

    /// Create a new event bus with the default nesting limit
    pub fn with_default_depth() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }

    /// Route handler failures to a domain logger instead of tracing
    pub fn set_logger(&self, logger: SharedLogger) {
        *self.inner.logger.lock() = Some(logger);
    }

    pub fn max_depth(&self) -> usize {
        self.inner.max_depth
    }

    /// Subscribe to a topic
    ///
    /// The subscription lives until it is explicitly removed; dropping the
    /// returned handle does not unsubscribe.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) -> eyre::Result<()> + Send + Sync + 'static,
    {
        self.add(topic, Arc::new(handler), false)
    }

    /// Alias of [`EventBus::subscribe`]
    pub fn on<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) -> eyre::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(topic, handler)
    }

    /// Subscribe for the next emission only
    pub fn once<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) -> eyre::Result<()> + Send + Sync + 'static,
    {
        self.add(topic, Arc::new(handler), true)
    }

    fn add(&self, topic: &str, handler: Handler, once: bool) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(%topic, id, once, "EventBus::subscribe: new subscriber");
        self.inner
            .subscriptions
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(Entry { id, handler, once });
        Subscription {
            topic: topic.to_string(),
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Emit a payload to every handler currently subscribed to `topic`
    ///
    /// Returns how many handlers were invoked. Topics without subscribers
    /// are a no-op. Handler failures are logged, never returned; the only
    /// error is exceeding the nesting limit.
    pub fn emit(&self, topic: &str, payload: Value) -> Result<usize, EventError> {
        let _guard = DepthGuard::enter(topic, self.inner.max_depth)?;

        let handlers: Vec<(u64, Handler)> = {
            let mut subs = self.inner.subscriptions.lock();
            let Some(list) = subs.get_mut(topic) else {
                return Ok(0);
            };
            let snapshot = list.iter().map(|e| (e.id, e.handler.clone())).collect();
            list.retain(|e| !e.once);
            if list.is_empty() {
                subs.remove(topic);
            }
            snapshot
        };

        debug!(%topic, handlers = handlers.len(), "EventBus::emit");
        for (id, handler) in &handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.report_failure(topic, *id, &format!("{:#}", e)),
                Err(panic) => self.report_failure(topic, *id, &panic_message(panic.as_ref())),
            }
        }
        Ok(handlers.len())
    }

    /// Alias of [`EventBus::emit`]
    pub fn publish(&self, topic: &str, payload: Value) -> Result<usize, EventError> {
        self.emit(topic, payload)
    }

    /// Remove one subscription; false when it was already gone
    pub fn unsubscribe(&self, topic: &str, id: u64) -> bool {
        debug!(%topic, id, "EventBus::unsubscribe");
        self.inner.remove(topic, id)
    }

    /// Remove every subscription on a topic, returning how many were removed
    pub fn clear(&self, topic: &str) -> usize {
        self.inner
            .subscriptions
            .lock()
            .remove(topic)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    pub fn clear_all(&self) {
        self.inner.subscriptions.lock().clear();
    }

    /// Get the number of live subscriptions on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.subscriptions.lock().get(topic).map(Vec::len).unwrap_or(0)
    }

    /// Topics with at least one subscription, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.inner.subscriptions.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    fn report_failure(&self, topic: &str, id: u64, message: &str) {
        let logger = self.inner.logger.lock().clone();
        match logger {
            Some(logger) => logger.log(
                Level::Error,
                &format!("Error in event handler for '{}'", topic),
                Some(&json!({"topic": topic, "subscription": id, "error": message})),
            ),
            None => error!(%topic, id, error = %message, "EventBus: handler failed"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_depth()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.topics())
            .field("max_depth", &self.inner.max_depth)
            .finish()
    }
}

/// Handle to one subscription
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove the subscription; false when it was already gone
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.remove(&self.topic, self.id),
            None => false,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}
