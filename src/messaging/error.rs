//! Messaging Error Types

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// Destination's backing resource is not in an acceptable lifecycle state
    #[error("{destination} is not available. Start the destination before attaching processor groups")]
    InvalidState { destination: String },

    /// Caller contract violation, surfaced before any registry mutation
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A required dependency never became available after graph submission
    #[error("Dependency resolution failed for {group}: {dependency} is unavailable")]
    DependencyResolution { group: String, dependency: String },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },
}

/// Result type for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
