//! Endpoint catalog error types

use thiserror::Error;

use crate::http::HttpError;
use crate::storage::StorageError;

/// Errors from loading and editing the endpoint catalog
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid endpoint format: {0}")]
    InvalidFormat(String),

    #[error("Endpoint has no path, url or endpoint field")]
    MissingPath,

    #[error("Endpoint not found: {id}")]
    NotFound { id: String },

    #[error("Endpoint '{id}' is not a custom endpoint")]
    NotCustom { id: String },

    #[error("Endpoint id already exists: {id}")]
    DuplicateId { id: String },

    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EndpointError {
    /// Check if the source rejected our credentials (401/403)
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, EndpointError::Http(e) if e.is_auth_failure())
    }
}
