//! Runtime Bridge Component
//!
//! Glue to the embedded application runtime: lazy, idempotent bootstrap
//! plus an invoke-by-name call surface. Dependency resolution and
//! deploy-configuration expansion live with the host, not here.

pub(crate) mod bridge;
pub(crate) mod error;

// Public API module - the only public interface for the runtime bridge
pub mod api;
