//! Endpoint catalog
//!
//! The request builder offers a catalog of [`EndpointDescriptor`]s. Listings
//! arrive in one of three shapes ([`EndpointPayload`]) and are normalized at
//! the boundary; nothing past [`process_endpoints`] sees raw JSON.
//!
//! [`EndpointManager`] owns the catalog and loads it through the source
//! tiers:
//!
//! ```text
//!   dynamic (GET dynamic-path, auth headers)
//!      │  401/403 ──────────────┐  any other failure ──┐
//!      ▼                        ▼                      ▼
//!   loaded              static (GET file-path, up to max-retries attempts,
//!                               fixed retry-delay-ms between them)
//!                                  │ exhausted
//!                                  ▼
//!                        bundled payload, if registered ──► loaded (fallback)
//!                                  │ none
//!                                  ▼
//!                        endpoints:error + Err(last error)
//! ```

mod error;
mod manager;
mod model;
mod search;

pub use error::EndpointError;
pub use manager::{EndpointManager, LoadSource};
pub use model::{
    CUSTOM_CATEGORY, EndpointDescriptor, EndpointParameter, EndpointPayload, UNCATEGORIZED, group_by_category,
    normalize_endpoint, process_endpoints,
};
pub use search::{SearchField, SearchOptions, search};
