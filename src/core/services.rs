//! Service Registry Re-exports
//!
//! Re-exports service access functions from their respective modules.
//! All services live in their domain modules; this is the one-stop import.

pub use crate::messaging::api::get_management_service;
pub use crate::notifications::api::get_notification_service;
