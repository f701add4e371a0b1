//! Hierarchical service names
//!
//! Node names in the service registry are dot-separated paths built by
//! appending segments, e.g. `deployment.shop.message-processor.orders.YmlsbGluZw`.
//! Names are value types: cheap to clone, hashable, ordered.

use std::fmt;

/// Name of a node in the service registry.
///
/// Built from a base segment with further segments appended. Two names are
/// equal iff their canonical dotted forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceName {
    canonical: String,
}

impl ServiceName {
    /// Create a name from a single base segment
    pub fn of(base: impl Into<String>) -> Self {
        Self {
            canonical: base.into(),
        }
    }

    /// Derive a child name by appending a segment
    pub fn append(&self, segment: impl AsRef<str>) -> Self {
        Self {
            canonical: format!("{}.{}", self.canonical, segment.as_ref()),
        }
    }

    /// The canonical dotted form
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
