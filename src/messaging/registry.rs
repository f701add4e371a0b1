//! Group Registry - destination name to installed group identifiers
//!
//! Pure bookkeeping with no locking of its own: the owning Groupizer
//! guards every read-modify-write. Insertion order is preserved so bulk
//! removal walks groups deterministically.

use crate::registry::api::ServiceName;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct GroupRegistry {
    installed: HashMap<String, Vec<ServiceName>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group identifier for a destination, creating the sequence
    /// on first use. Never removes entries.
    pub fn remember(&mut self, destination_name: &str, group: ServiceName) {
        self.installed
            .entry(destination_name.to_string())
            .or_default()
            .push(group);
    }

    /// Snapshot of the identifiers installed for a destination, in
    /// insertion order; empty if none exist
    pub fn installed_groups_for(&self, destination_name: &str) -> Vec<ServiceName> {
        self.installed
            .get(destination_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop one identifier from a destination's sequence; the sequence
    /// itself disappears with its last identifier
    pub fn forget_group(&mut self, destination_name: &str, group: &ServiceName) {
        if let Some(groups) = self.installed.get_mut(destination_name) {
            groups.retain(|installed| installed != group);
            if groups.is_empty() {
                self.installed.remove(destination_name);
            }
        }
    }

    /// Drop the entire sequence for a destination.
    ///
    /// Called only after every group in the sequence has been told to tear
    /// down.
    pub fn forget(&mut self, destination_name: &str) -> Option<Vec<ServiceName>> {
        self.installed.remove(destination_name)
    }
}
