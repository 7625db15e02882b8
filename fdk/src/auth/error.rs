//! Auth error types

use thiserror::Error;

use crate::http::HttpError;
use crate::storage::StorageError;

/// Errors from session operations
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authentication token received")]
    NoToken,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// The backend no longer accepts the session token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Http(e) if e.is_unauthorized())
    }
}
