//! Readiness validation for destinations
//!
//! Advisory, best-effort check at the instant of the call; the dependency
//! graph installed afterwards is the authoritative gate.

use crate::messaging::naming::Deployment;
use crate::registry::api::{NodeState, ServiceRegistry};
use std::sync::Arc;

/// Checks that a destination's backing resource will or does accept
/// bindings before a group is allowed to attach to it.
pub struct ReadinessValidator {
    registry: Arc<ServiceRegistry>,
}

impl ReadinessValidator {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// A destination is ready only when its backing resource is `Starting`
    /// or `Up`. Never created, stopped, failed, and removed all count as
    /// not ready.
    pub fn is_destination_ready(&self, deployment: &Deployment, destination_name: &str) -> bool {
        matches!(
            self.registry
                .lookup(&deployment.destination_pointer(destination_name)),
            Some(NodeState::Starting) | Some(NodeState::Up)
        )
    }
}
