//! Shared fixtures for messaging tests
//!
//! A `TestHost` plays the part of the host process: it owns a service
//! registry, installs the shared infrastructure nodes (runtime, transaction
//! coordinator, connection factory), and drives destination backing
//! resources through their lifecycle states.

use crate::messaging::api::{
    Connection, ConnectionFactory, Deployment, DestinationHandle, GroupState, Groupizer,
    MessageProcessorGroup, TransactionCoordinator,
};
use crate::registry::api::{NodeState, ServiceRegistry};
use crate::runtime::api::{RuntimeBridge, RuntimeFn};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

pub(super) struct TestHost {
    pub registry: Arc<ServiceRegistry>,
    pub deployment: Deployment,
    pub groupizer: Groupizer,
    pub connection: Arc<Connection>,
}

impl TestHost {
    /// Host with runtime, transaction coordinator, and connection factory
    /// already up. `handler_functions` become entry points in the runtime;
    /// each one echoes and succeeds. `handler_delay_ms` slows every
    /// invocation down, for drain/discard assertions.
    pub fn new(app: &str, handler_functions: &[&str], handler_delay_ms: u64) -> Self {
        let registry = Arc::new(ServiceRegistry::new());
        let deployment = Deployment::new(app);

        let functions: Vec<String> = handler_functions.iter().map(|f| f.to_string()).collect();
        let bridge = Arc::new(RuntimeBridge::new(
            app,
            Box::new(move || {
                Ok(functions
                    .into_iter()
                    .map(|name| {
                        let entry: RuntimeFn = Box::new(move |args| {
                            if handler_delay_ms > 0 {
                                std::thread::sleep(Duration::from_millis(handler_delay_ms));
                            }
                            Ok(json!(args.len()))
                        });
                        (name, entry)
                    })
                    .collect())
            }),
        ));

        registry
            .install_resource(deployment.runtime_service(), bridge)
            .unwrap();
        registry
            .install_resource(
                Deployment::transaction_coordinator(),
                Arc::new(TransactionCoordinator::new()),
            )
            .unwrap();
        registry
            .install_resource(
                deployment.connection_factory(),
                Arc::new(ConnectionFactory::new("amqp://broker")),
            )
            .unwrap();

        let groupizer = Groupizer::new(deployment.clone(), Arc::clone(&registry));
        Self {
            registry,
            deployment,
            groupizer,
            connection: Arc::new(Connection::new("amqp://broker")),
        }
    }

    /// Bring a destination fully up: backing-resource pointer plus the
    /// destination handle in the naming context
    pub fn start_destination(&self, destination_name: &str) {
        self.install_destination_pointer(destination_name, NodeState::Up);
        self.registry
            .install_resource(
                self.deployment.destination(destination_name),
                Arc::new(DestinationHandle::new(destination_name)),
            )
            .unwrap();
    }

    /// Install only the backing-resource pointer, in an explicit state
    pub fn install_destination_pointer(&self, destination_name: &str, state: NodeState) {
        self.registry
            .install_resource_with_state(
                self.deployment.destination_pointer(destination_name),
                Arc::new(()),
                state,
            )
            .unwrap();
    }

    pub fn set_destination_pointer_state(&self, destination_name: &str, state: NodeState) {
        self.registry
            .set_resource_state(&self.deployment.destination_pointer(destination_name), state)
            .unwrap();
    }

    /// Install the destination handle without touching the pointer
    pub fn install_destination_handle(&self, destination_name: &str) {
        self.registry
            .install_resource(
                self.deployment.destination(destination_name),
                Arc::new(DestinationHandle::new(destination_name)),
            )
            .unwrap();
    }

    pub async fn create(
        &self,
        destination_name: &str,
        handler_name: &str,
        concurrency: usize,
        durable: bool,
    ) -> crate::messaging::api::MessagingResult<Arc<MessageProcessorGroup>> {
        self.groupizer
            .create_group(
                destination_name,
                false,
                concurrency,
                durable,
                handler_name,
                Arc::clone(&self.connection),
                json!({"setup": true}),
            )
            .await
    }
}

/// Wait for a group to reach a lifecycle state, with a hard timeout
pub(super) async fn wait_for_state(group: &Arc<MessageProcessorGroup>, want: GroupState) {
    let mut rx = group.watch_state();
    let reached = timeout(Duration::from_secs(2), async {
        loop {
            if *rx.borrow_and_update() == want {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    if reached.is_err() {
        panic!(
            "group {} never reached {:?} (currently {:?})",
            group.service_name(),
            want,
            group.state()
        );
    }
}

/// Wait until the group has processed `want` items
pub(super) async fn wait_for_processed(group: &Arc<MessageProcessorGroup>, want: u64) {
    let reached = timeout(Duration::from_secs(5), async {
        while group.processed_count() < want {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    if reached.is_err() {
        panic!(
            "group {} processed {} of {} expected items",
            group.service_name(),
            group.processed_count(),
            want
        );
    }
}
