//! Container error types

use thiserror::Error;

/// Error type returned by service factories
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from service registration and resolution
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Service not registered: '{name}'")]
    NotRegistered { name: String },

    #[error("Service '{name}' is registered as {found}, not {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Circular dependency resolving '{name}': {}", .chain.join(" -> "))]
    CircularDependency { name: String, chain: Vec<String> },

    #[error("Failed to construct service '{name}': {source}")]
    Construction {
        name: String,
        #[source]
        source: FactoryError,
    },
}

impl ContainerError {
    /// Name of the service the error is about
    pub fn name(&self) -> &str {
        match self {
            ContainerError::NotRegistered { name }
            | ContainerError::TypeMismatch { name, .. }
            | ContainerError::CircularDependency { name, .. }
            | ContainerError::Construction { name, .. } => name,
        }
    }

    /// Check if this is a configuration error (unknown name or wrong type)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ContainerError::NotRegistered { .. } | ContainerError::TypeMismatch { .. }
        )
    }
}
