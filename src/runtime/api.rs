//! Public API for the runtime bridge
//!
//! External modules should import from here rather than directly from
//! internal modules.

pub use crate::runtime::bridge::{RuntimeBridge, RuntimeFn, RuntimeLoader};
pub use crate::runtime::error::{RuntimeError, RuntimeResult};
