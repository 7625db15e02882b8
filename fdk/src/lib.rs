//! Flowdeck - API tester console runtime
//!
//! Flowdeck wires the client-side services of an API tester console: a lazy
//! service container, a synchronous event bus, a domain logger family, the
//! endpoint catalog, the flow view and the auth session.
//!
//! # Core Concepts
//!
//! - **Explicit composition root**: [`runtime::Runtime`] registers every
//!   factory into its own [`container::Container`]; there are no globals
//! - **Decoupling through the bus**: services publish lifecycle events and
//!   never call each other
//! - **Durable state through one store**: session, custom endpoints and
//!   persisted logs all live in a [`storage::KeyValueStore`]
//!
//! # Modules
//!
//! - [`container`] - Lazy singleton service container
//! - [`events`] - Event bus and topic names
//! - [`logging`] - Domain loggers (console, storage, composite)
//! - [`endpoints`] - Endpoint catalog loading, search and custom entries
//! - [`flow`] - Flow model and the flow view service
//! - [`auth`] - Session management
//! - [`http`] - Transport seam
//! - [`storage`] - Key-value storage
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod auth;
pub mod cli;
pub mod config;
pub mod container;
pub mod endpoints;
pub mod events;
pub mod flow;
pub mod http;
pub mod logging;
pub mod runtime;
pub mod storage;

// Re-export commonly used types
pub use auth::{AuthError, AuthManager, AuthSession};
pub use config::Config;
pub use container::{Container, ContainerError};
pub use endpoints::{EndpointDescriptor, EndpointError, EndpointManager, LoadSource};
pub use events::{EventBus, EventError, Subscription};
pub use flow::{Flow, FlowStep, FlowUiService, StepStatus};
pub use logging::{Level, LogEntry, Logger, SharedLogger};
pub use runtime::{Runtime, RuntimeBuilder};
