//! Event Bus for decoupled service communication
//!
//! Services never call each other directly: they publish on named topics and
//! subscribe to the topics they care about. Topics are plain strings with a
//! JSON payload convention; they are not declared up front.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EVENT BUS                              │
//! │        (synchronous, in subscription order, re-entrant)      │
//! └─────────────────────────────────────────────────────────────┘
//!         ↑                     ↑                      ↑
//!   EndpointManager         AuthManager           FlowUiService
//!   emits:                  emits:                emits:
//!   - endpoints:loading     - auth:initialized    - flow:select
//!   - endpoints:loaded      - auth:login          - flow:run
//!   - endpoints:error       - auth:logout         - step:edit
//!   - endpoints:retry       - auth:session-expired  ...
//! ```
//!
//! Delivery happens on the caller's stack: a handler that emits nests
//! directly. Nesting depth is bounded per thread (see [`DEFAULT_MAX_DEPTH`]),
//! so accidental mutual emission ends in [`EventError::RecursionLimit`]
//! instead of a stack overflow.
//!
//! # Usage
//!
//! ```rust,ignore
//! use flowdeck::events::{EventBus, topics};
//!
//! let bus = EventBus::default();
//! let sub = bus.subscribe(topics::ENDPOINTS_LOADED, |payload| {
//!     println!("loaded {} endpoints", payload["count"]);
//!     Ok(())
//! });
//! bus.emit(topics::ENDPOINTS_LOADED, serde_json::json!({"count": 3}))?;
//! sub.unsubscribe();
//! ```

mod bus;
pub mod topics;

pub use bus::{DEFAULT_MAX_DEPTH, EventBus, EventError, Handler, Subscription};
