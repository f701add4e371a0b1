//! Group Installer - translates a group into a dependency-graph submission
//!
//! Five dependencies must resolve before a group's workers start: the
//! deployment runtime, the transaction coordinator, the destination's
//! backing resource, and the connection-factory and destination handles
//! from the deployment's naming context. The backing resource is submitted
//! as the prerequisite of everything else, so the advisory readiness check
//! is re-enforced at install time.
//!
//! Installations against the same destination are synchronized through a
//! promise chain: each activation waits for the previous installation on
//! that destination to settle before starting its own group.

use crate::messaging::error::MessagingError;
use crate::messaging::group::{GroupState, MessageProcessorGroup, ResolvedDependencies};
use crate::messaging::handles::{ConnectionFactory, DestinationHandle, TransactionCoordinator};
use crate::messaging::naming::Deployment;
use crate::notifications::api::{get_notification_service, Event, GroupEvent, GroupEventType};
use crate::registry::api::{
    ActivationCallback, ActivationOutcome, GraphSubmission, ServiceName, ServiceRegistry,
};
use crate::runtime::api::RuntimeBridge;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Per-destination promise chain over group states.
///
/// `register` hands back the previous installation's state receiver for
/// the destination; the new installation's activation waits on it until
/// that group has left `Pending`.
pub(crate) struct InstallSynchronizer {
    chains: Mutex<HashMap<String, watch::Receiver<GroupState>>>,
}

impl InstallSynchronizer {
    fn new() -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
        }
    }

    fn register(
        &self,
        destination_name: &str,
        state_rx: watch::Receiver<GroupState>,
    ) -> Option<watch::Receiver<GroupState>> {
        self.chains
            .lock()
            .unwrap()
            .insert(destination_name.to_string(), state_rx)
    }

    fn release(&self, destination_name: &str) {
        self.chains.lock().unwrap().remove(destination_name);
    }
}

/// Builds and submits the dependency graph for each group
pub(crate) struct GroupInstaller {
    registry: Arc<ServiceRegistry>,
    synchronizer: InstallSynchronizer,
}

impl GroupInstaller {
    pub(crate) fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            synchronizer: InstallSynchronizer::new(),
        }
    }

    /// Submit the group's dependency graph.
    ///
    /// Returns as soon as the graph is recorded; activation is
    /// asynchronous. The group transitions to Pending here. `announced`
    /// flips to true once the caller has published the group's Installed
    /// event; the activation callback holds back its own events until then
    /// so observers see Installed first.
    pub(crate) fn install(
        &self,
        deployment: &Deployment,
        group: &Arc<MessageProcessorGroup>,
        announced: watch::Receiver<bool>,
    ) -> Result<(), MessagingError> {
        let destination_name = group.destination_name().to_string();
        let service_name = group.service_name().clone();

        let runtime_name = deployment.runtime_service();
        let txn_name = Deployment::transaction_coordinator();
        let pointer_name = deployment.destination_pointer(&destination_name);
        let factory_name = deployment.connection_factory();
        let handle_name = deployment.destination(&destination_name);

        let previous = self
            .synchronizer
            .register(&destination_name, group.watch_state());
        group.mark_pending();

        let callback = activation_callback(
            Arc::clone(&self.registry),
            Arc::clone(group),
            previous,
            announced,
            runtime_name.clone(),
            txn_name.clone(),
            factory_name.clone(),
            handle_name.clone(),
        );

        self.registry
            .submit_graph(GraphSubmission {
                name: service_name,
                prerequisite: Some(pointer_name.clone()),
                dependencies: vec![runtime_name, txn_name, pointer_name, factory_name, handle_name],
                value: Some(Arc::clone(group) as Arc<dyn Any + Send + Sync>),
                on_activation: callback,
            })
            .map_err(|e| MessagingError::OperationFailed {
                message: format!("graph submission for {} failed: {}", group.service_name(), e),
            })
    }

    /// Drop the synchronization chain for a destination with no remaining
    /// groups
    pub(crate) fn release_destination(&self, destination_name: &str) {
        self.synchronizer.release(destination_name);
    }
}

fn activation_callback(
    registry: Arc<ServiceRegistry>,
    group: Arc<MessageProcessorGroup>,
    previous: Option<watch::Receiver<GroupState>>,
    mut announced: watch::Receiver<bool>,
    runtime_name: ServiceName,
    txn_name: ServiceName,
    factory_name: ServiceName,
    handle_name: ServiceName,
) -> ActivationCallback {
    Box::new(move |outcome| {
        Box::pin(async move {
            // The creation that submitted this graph announces the group
            // first; our own events always trail its Installed event
            await_flag(&mut announced).await;

            match outcome {
                ActivationOutcome::Ready => {
                    // Installations for the same destination settle in
                    // submission order
                    if let Some(mut previous) = previous {
                        await_install_settled(&mut previous).await;
                    }

                    let dependencies = match resolve_dependencies(
                        &registry,
                        &group,
                        &runtime_name,
                        &txn_name,
                        &factory_name,
                        &handle_name,
                    ) {
                        Ok(dependencies) => dependencies,
                        Err(e) => {
                            group.mark_failed(e.to_string());
                            publish_group_event(
                                GroupEventType::Failed,
                                &group,
                                Some(e.to_string()),
                            )
                            .await;
                            return Err(e.into());
                        }
                    };

                    match group.start(dependencies).await {
                        Ok(()) => {
                            if group.state() == GroupState::Active {
                                publish_group_event(GroupEventType::Activated, &group, None).await;
                            }
                            Ok(())
                        }
                        Err(e) => {
                            group.mark_failed(e.to_string());
                            publish_group_event(
                                GroupEventType::Failed,
                                &group,
                                Some(e.to_string()),
                            )
                            .await;
                            Err(e.into())
                        }
                    }
                }
                ActivationOutcome::DependencyFailed { dependency } => {
                    let reason = MessagingError::DependencyResolution {
                        group: group.service_name().to_string(),
                        dependency: dependency.to_string(),
                    };
                    group.mark_failed(reason.to_string());
                    publish_group_event(GroupEventType::Failed, &group, Some(reason.to_string()))
                        .await;
                    Ok(())
                }
            }
        })
    })
}

/// Wait for a flag to flip true; a dropped sender counts as flipped
async fn await_flag(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Wait until a previously-installed group on the same destination leaves
/// Pending (it activated, failed, or was removed)
async fn await_install_settled(rx: &mut watch::Receiver<GroupState>) {
    loop {
        let state = *rx.borrow_and_update();
        if !matches!(state, GroupState::Constructed | GroupState::Pending) {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn resolve_dependencies(
    registry: &Arc<ServiceRegistry>,
    group: &Arc<MessageProcessorGroup>,
    runtime_name: &ServiceName,
    txn_name: &ServiceName,
    factory_name: &ServiceName,
    handle_name: &ServiceName,
) -> Result<ResolvedDependencies, MessagingError> {
    let missing = |name: &ServiceName| MessagingError::DependencyResolution {
        group: group.service_name().to_string(),
        dependency: name.to_string(),
    };

    Ok(ResolvedDependencies {
        runtime: registry
            .get_value_as::<RuntimeBridge>(runtime_name)
            .ok_or_else(|| missing(runtime_name))?,
        transaction_coordinator: registry
            .get_value_as::<TransactionCoordinator>(txn_name)
            .ok_or_else(|| missing(txn_name))?,
        connection_factory: registry
            .get_value_as::<ConnectionFactory>(factory_name)
            .ok_or_else(|| missing(factory_name))?,
        destination: registry
            .get_value_as::<DestinationHandle>(handle_name)
            .ok_or_else(|| missing(handle_name))?,
    })
}

async fn publish_group_event(
    event_type: GroupEventType,
    group: &Arc<MessageProcessorGroup>,
    message: Option<String>,
) {
    let event = match message {
        Some(message) => GroupEvent::with_message(
            event_type,
            group.service_name().to_string(),
            group.destination_name().to_string(),
            message,
        ),
        None => GroupEvent::new(
            event_type,
            group.service_name().to_string(),
            group.destination_name().to_string(),
        ),
    };
    if let Err(e) = get_notification_service()
        .await
        .publish(Event::Group(event))
        .await
    {
        log::debug!(
            "Lifecycle event for {} not delivered: {}",
            group.service_name(),
            e
        );
    }
}
