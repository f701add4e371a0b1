//! Message Processor Group Component
//!
//! Installs and manages groups of concurrent message-processing workers
//! bound to named destinations. Creation validates that the destination's
//! backing resource is usable, records the group, and submits a dependency
//! graph to the service registry; activation is asynchronous. Removal walks
//! the bookkeeping registry and tears every group down, idempotently.
//!
//! # Architecture
//!
//! ```text
//!  caller
//!    │ create_group / remove_groups_for
//!    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Groupizer                           │
//! │                                                             │
//! │  ReadinessValidator ──► MessageProcessorGroup ──► Group     │
//! │   (backing resource      (entity + worker        Installer  │
//! │    Starting|Up?)          pool, state machine)     │        │
//! │                                                    │        │
//! │  GroupRegistry ◄── remember / forget               │        │
//! │   (destination -> ordered identifiers)             │        │
//! └────────────────────────────────────────────────────┼────────┘
//!                                                      ▼
//!                                    ServiceRegistry (dependency DAG:
//!                                    runtime, txn coordinator, backing
//!                                    resource, connection factory,
//!                                    destination handle)
//! ```

pub(crate) mod error;
pub(crate) mod group;
pub(crate) mod groupizer;
pub(crate) mod handles;
pub(crate) mod installer;
pub(crate) mod management;
pub(crate) mod naming;
pub(crate) mod readiness;
pub(crate) mod registry;
pub(crate) mod worker;

// Public API module - the only public interface for the messaging core
pub mod api;

#[cfg(test)]
mod tests;
