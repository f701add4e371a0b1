//! Management registration for operational visibility
//!
//! Every installed group is registered here so operators can enumerate
//! groups and read status snapshots without touching the groups themselves.
//! Registrations hold weak references: a group that is gone simply drops
//! out of the next snapshot.

use crate::messaging::group::{GroupState, MessageProcessorGroup};
use crate::registry::api::ServiceName;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock, Weak};

/// Point-in-time status of one group
#[derive(Debug, Clone, Serialize)]
pub struct GroupStatus {
    pub name: String,
    pub destination: String,
    pub handler: String,
    pub state: GroupState,
    pub concurrency: usize,
    pub durable: bool,
    pub singleton: bool,
    pub processed: u64,
    pub failed: u64,
}

impl GroupStatus {
    fn of(group: &MessageProcessorGroup) -> Self {
        Self {
            name: group.service_name().to_string(),
            destination: group.destination_name().to_string(),
            handler: group.handler_name().to_string(),
            state: group.state(),
            concurrency: group.concurrency(),
            durable: group.durable(),
            singleton: group.singleton(),
            processed: group.processed_count(),
            failed: group.failed_count(),
        }
    }
}

/// Registry of installed groups keyed by service name
pub struct ManagementRegistry {
    groups: RwLock<HashMap<String, Weak<MessageProcessorGroup>>>,
}

impl ManagementRegistry {
    fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, group: &Arc<MessageProcessorGroup>) {
        let mut groups = self.groups.write().unwrap();
        groups.insert(group.service_name().to_string(), Arc::downgrade(group));
        log::debug!("Registered {} for management", group.service_name());
    }

    pub fn deregister(&self, name: &ServiceName) -> bool {
        let mut groups = self.groups.write().unwrap();
        groups.remove(name.as_str()).is_some()
    }

    /// Status of one group, if it is registered and still alive
    pub fn status_of(&self, name: &ServiceName) -> Option<GroupStatus> {
        let groups = self.groups.read().unwrap();
        groups
            .get(name.as_str())
            .and_then(Weak::upgrade)
            .map(|group| GroupStatus::of(&group))
    }

    /// Statuses of all live registered groups, sorted by name.
    ///
    /// Dead registrations are pruned as a side effect.
    pub fn snapshot(&self) -> Vec<GroupStatus> {
        let mut groups = self.groups.write().unwrap();
        groups.retain(|_, weak| weak.strong_count() > 0);

        let mut statuses: Vec<GroupStatus> = groups
            .values()
            .filter_map(Weak::upgrade)
            .map(|group| GroupStatus::of(&group))
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn registered_count(&self) -> usize {
        self.groups.read().unwrap().len()
    }

    /// Drop all registrations; used by tests to isolate the global service
    pub fn clear(&self) {
        self.groups.write().unwrap().clear();
    }
}

/// Global management service instance
static MANAGEMENT_SERVICE: LazyLock<Arc<ManagementRegistry>> = LazyLock::new(|| {
    log::trace!("Initializing management service");
    Arc::new(ManagementRegistry::new())
});

/// Access management service
pub fn get_management_service() -> Arc<ManagementRegistry> {
    Arc::clone(&MANAGEMENT_SERVICE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::handles::Connection;
    use crate::registry::api::ServiceRegistry;
    use serde_json::json;

    fn group(name: &str) -> Arc<MessageProcessorGroup> {
        let group = MessageProcessorGroup::new(
            Arc::new(ServiceRegistry::new()),
            ServiceName::of(name),
            "orders",
            false,
            "billing",
            Arc::new(Connection::new("amqp://broker")),
            json!(null),
        );
        group.set_concurrency(2).unwrap();
        Arc::new(group)
    }

    #[test]
    fn test_register_and_snapshot() {
        let registry = ManagementRegistry::new();
        let group = group("g1");
        registry.register(&group);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "g1");
        assert_eq!(snapshot[0].concurrency, 2);
        assert_eq!(snapshot[0].state, GroupState::Constructed);
    }

    #[test]
    fn test_dead_groups_drop_out_of_snapshots() {
        let registry = ManagementRegistry::new();
        let group = group("g1");
        registry.register(&group);
        drop(group);

        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.registered_count(), 0);
    }

    #[test]
    fn test_deregister() {
        let registry = ManagementRegistry::new();
        let group = group("g1");
        registry.register(&group);

        assert!(registry.deregister(&ServiceName::of("g1")));
        assert!(!registry.deregister(&ServiceName::of("g1")));
        assert!(registry.status_of(&ServiceName::of("g1")).is_none());
    }
}
