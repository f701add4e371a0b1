//! Opaque transport and coordination handles
//!
//! The group reads these once bound and never mutates them; they are shared
//! by reference with the service registry that resolves them.

use serde_json::Value;

/// Handle to the messaging transport.
///
/// Shared by every group of a deployment; what it actually connects to is
/// the host's business.
#[derive(Debug)]
pub struct Connection {
    broker_url: String,
}

impl Connection {
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
        }
    }

    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }
}

/// Connection factory bound in a deployment's naming context
#[derive(Debug)]
pub struct ConnectionFactory {
    broker_url: String,
}

impl ConnectionFactory {
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
        }
    }

    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }
}

/// Resolved handle to a destination in a deployment's naming context
#[derive(Debug)]
pub struct DestinationHandle {
    destination_name: String,
}

impl DestinationHandle {
    pub fn new(destination_name: impl Into<String>) -> Self {
        Self {
            destination_name: destination_name.into(),
        }
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }
}

/// Process-wide transaction coordinator handle
#[derive(Debug, Default)]
pub struct TransactionCoordinator;

impl TransactionCoordinator {
    pub fn new() -> Self {
        Self
    }
}

/// One unit of work delivered to a group's workers
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub payload: Value,
}

impl WorkItem {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}
