//! Public API for the messaging core
//!
//! This module provides the complete public API for the message processor
//! group system. External modules should import from here rather than
//! directly from internal modules.

// Orchestration
pub use crate::messaging::groupizer::{DuplicatePolicy, Groupizer};

// The group entity and its lifecycle
pub use crate::messaging::group::{GroupState, MessageProcessorGroup, ResolvedDependencies};

// Naming and identifiers
pub use crate::messaging::naming::{group_name, Deployment};

// Transport and coordination handles
pub use crate::messaging::handles::{
    Connection, ConnectionFactory, DestinationHandle, TransactionCoordinator, WorkItem,
};

// Handler seam
pub use crate::messaging::worker::{MessageHandler, RuntimeHandler};

// Readiness validation
pub use crate::messaging::readiness::ReadinessValidator;

// Management / operational visibility
pub use crate::messaging::management::{
    get_management_service, GroupStatus, ManagementRegistry,
};

// Error handling
pub use crate::messaging::error::{MessagingError, MessagingResult};
