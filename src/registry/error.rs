//! Registry Error Types

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Node already installed: {name}")]
    AlreadyInstalled { name: String },

    #[error("Node not found: {name}")]
    NodeNotFound { name: String },

    #[error("Submitting {name} would create a dependency cycle")]
    DependencyCycle { name: String },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
