//! Service container
//!
//! A [`Container`] maps names to factories. `get(name)` runs the factory the
//! first time it is asked for and memoizes the value; factories receive the
//! container so they can pull their own dependencies in any order.
//!
//! ```text
//!   register("auth", |c| AuthManager::new(c.get("http")?, c.get("event_bus")?, ...))
//!                                   │
//!   get("auth") ──► factory ──► get("http") ──► factory ──► cached
//!                          └──► get("event_bus") ─────────► cached
//! ```
//!
//! A factory that asks (directly or transitively) for a service still under
//! construction gets [`ContainerError::CircularDependency`] with the full
//! resolution chain instead of recursing forever.

mod error;
mod registry;

pub use error::{ContainerError, FactoryError};
pub use registry::{Container, ServiceRegistration};
