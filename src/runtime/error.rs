//! Runtime Bridge Error Types

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Runtime function not found: {function}")]
    FunctionNotFound { function: String },

    #[error("Runtime initialization failed: {message}")]
    InitializationFailed { message: String },

    #[error("Invocation of {function} failed: {message}")]
    InvocationFailed { function: String, message: String },
}

/// Result type for runtime bridge operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
