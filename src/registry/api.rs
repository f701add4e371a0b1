//! Public API for the service registry
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Names and node states
pub use crate::registry::name::ServiceName;
pub use crate::registry::node::NodeState;

// Registry and submissions
pub use crate::registry::manager::{
    ActivationCallback, ActivationOutcome, GraphSubmission, ServiceRegistry,
};

// Dependency graph bookkeeping
pub use crate::registry::graph::DependencyGraph;

// Error handling
pub use crate::registry::error::{RegistryError, RegistryResult};
