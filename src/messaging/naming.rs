//! Deployment-scoped service names and group identifiers
//!
//! Every node a processor group depends on is named under its owning
//! deployment, so identically-named destinations in different deployments
//! never collide in the service registry.

use crate::registry::api::ServiceName;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// The deployment that owns a set of processor groups.
///
/// Purely a naming scope: it derives the registry node names for the
/// deployment's runtime, naming context, and destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    name: String,
}

impl Deployment {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> ServiceName {
        ServiceName::of("deployment").append(&self.name)
    }

    /// The deployment's application runtime
    pub fn runtime_service(&self) -> ServiceName {
        self.root().append("runtime")
    }

    /// The process-wide transaction coordinator, shared by all deployments
    pub fn transaction_coordinator() -> ServiceName {
        ServiceName::of("txn").append("coordinator")
    }

    fn naming_context(&self) -> ServiceName {
        self.root().append("naming")
    }

    /// Connection factory bound in the deployment's naming context
    pub fn connection_factory(&self) -> ServiceName {
        self.naming_context().append("connection-factory")
    }

    /// Destination handle bound in the deployment's naming context
    pub fn destination(&self, destination_name: &str) -> ServiceName {
        self.naming_context()
            .append("destination")
            .append(destination_name)
    }

    /// Pointer to the destination's backing resource
    pub fn destination_pointer(&self, destination_name: &str) -> ServiceName {
        self.root()
            .append("destination-pointer")
            .append(destination_name)
    }

    /// Node name for an installed message processor group
    pub fn message_processor(&self, group_name: &str) -> ServiceName {
        self.root().append("message-processor").append(group_name)
    }
}

/// Derive the group name for a (destination, handler) pair.
///
/// The handler component is URL-safe encoded so arbitrary handler names
/// survive as a single dotted-name segment. Deterministic: the same pair
/// always yields the same name.
pub fn group_name(destination_name: &str, handler_name: &str) -> String {
    format!(
        "{}.{}",
        destination_name,
        URL_SAFE_NO_PAD.encode(handler_name)
    )
}
