//! MessageProcessorGroup - the unit of installed work
//!
//! A group is a named, configured binding of one handler to one
//! destination, together with the runtime references it needs once started.
//! Construction is cheap and never touches the dependency graph; the
//! installer drives the group through its lifecycle afterwards.
//!
//! Lifecycle: Constructed -> Pending -> Active -> Removed, with Failed as
//! the terminal state when dependency resolution or activation goes wrong.
//! A failed group stays queryable and removable.

use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::handles::{
    Connection, ConnectionFactory, DestinationHandle, TransactionCoordinator, WorkItem,
};
use crate::messaging::worker::{RuntimeHandler, WorkerPool};
use crate::notifications::api::{get_notification_service, Event, GroupEvent, GroupEventType};
use crate::registry::api::{ServiceName, ServiceRegistry};
use crate::runtime::api::RuntimeBridge;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{mpsc, watch};

/// Observable lifecycle state of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupState {
    Constructed,
    Pending,
    Active,
    Failed,
    Removed,
}

/// References resolved by the service registry and bound at activation
#[derive(Clone)]
pub struct ResolvedDependencies {
    pub runtime: Arc<RuntimeBridge>,
    pub transaction_coordinator: Arc<TransactionCoordinator>,
    pub connection_factory: Arc<ConnectionFactory>,
    pub destination: Arc<DestinationHandle>,
}

pub struct MessageProcessorGroup {
    registry: Arc<ServiceRegistry>,
    service_name: ServiceName,
    destination_name: String,
    handler_name: String,
    singleton: bool,
    connection: Arc<Connection>,
    setup_handler: Value,

    // Each settable exactly once, before installation
    name: OnceCell<String>,
    concurrency: OnceCell<usize>,
    durable: OnceCell<bool>,

    state_tx: watch::Sender<GroupState>,
    failure: RwLock<Option<String>>,
    dependencies: RwLock<Option<ResolvedDependencies>>,

    // Intake is created at construction so work submitted while the group
    // is still pending is buffered rather than lost
    intake_tx: Mutex<Option<mpsc::UnboundedSender<WorkItem>>>,
    intake_rx: Mutex<Option<mpsc::UnboundedReceiver<WorkItem>>>,
    workers: tokio::sync::Mutex<Option<WorkerPool>>,
    // Serializes start() against remove() so a removal can never lose the
    // race against a concurrent activation
    lifecycle: tokio::sync::Mutex<()>,

    processed: Arc<AtomicU64>,
    failed_items: Arc<AtomicU64>,
}

impl fmt::Debug for MessageProcessorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageProcessorGroup")
            .field("service_name", &self.service_name)
            .field("destination_name", &self.destination_name)
            .field("handler_name", &self.handler_name)
            .field("state", &self.state())
            .finish()
    }
}

impl MessageProcessorGroup {
    /// Construct a group. Never blocks and never touches the dependency
    /// graph.
    pub fn new(
        registry: Arc<ServiceRegistry>,
        service_name: ServiceName,
        destination_name: impl Into<String>,
        singleton: bool,
        handler_name: impl Into<String>,
        connection: Arc<Connection>,
        setup_handler: Value,
    ) -> Self {
        let (state_tx, _) = watch::channel(GroupState::Constructed);
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            service_name,
            destination_name: destination_name.into(),
            handler_name: handler_name.into(),
            singleton,
            connection,
            setup_handler,
            name: OnceCell::new(),
            concurrency: OnceCell::new(),
            durable: OnceCell::new(),
            state_tx,
            failure: RwLock::new(None),
            dependencies: RwLock::new(None),
            intake_tx: Mutex::new(Some(intake_tx)),
            intake_rx: Mutex::new(Some(intake_rx)),
            workers: tokio::sync::Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            processed: Arc::new(AtomicU64::new(0)),
            failed_items: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of concurrent workers. Settable exactly once, before
    /// installation.
    pub fn set_concurrency(&self, concurrency: usize) -> MessagingResult<()> {
        if concurrency < 1 {
            return Err(MessagingError::InvalidArgument {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        self.ensure_settable("concurrency")?;
        self.concurrency
            .set(concurrency)
            .map_err(|_| MessagingError::InvalidArgument {
                message: "concurrency is already set".to_string(),
            })
    }

    /// Whether undelivered work survives a restart. Settable exactly once,
    /// before installation.
    pub fn set_durable(&self, durable: bool) -> MessagingResult<()> {
        self.ensure_settable("durable")?;
        self.durable
            .set(durable)
            .map_err(|_| MessagingError::InvalidArgument {
                message: "durable is already set".to_string(),
            })
    }

    /// Display name of the group. Settable exactly once, before
    /// installation.
    pub fn set_name(&self, name: impl Into<String>) -> MessagingResult<()> {
        self.ensure_settable("name")?;
        self.name
            .set(name.into())
            .map_err(|_| MessagingError::InvalidArgument {
                message: "name is already set".to_string(),
            })
    }

    fn ensure_settable(&self, attribute: &str) -> MessagingResult<()> {
        if self.state() != GroupState::Constructed {
            return Err(MessagingError::InvalidArgument {
                message: format!("{} is immutable once installation has begun", attribute),
            });
        }
        Ok(())
    }

    pub fn service_name(&self) -> &ServiceName {
        &self.service_name
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    pub fn concurrency(&self) -> usize {
        *self.concurrency.get().unwrap_or(&1)
    }

    pub fn durable(&self) -> bool {
        *self.durable.get().unwrap_or(&false)
    }

    pub fn singleton(&self) -> bool {
        self.singleton
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn setup_handler(&self) -> &Value {
        &self.setup_handler
    }

    pub fn state(&self) -> GroupState {
        *self.state_tx.borrow()
    }

    /// Subscribe to lifecycle state changes
    pub fn watch_state(&self) -> watch::Receiver<GroupState> {
        self.state_tx.subscribe()
    }

    /// Why the group failed, if it did
    pub fn failure_reason(&self) -> Option<String> {
        self.failure.read().unwrap().clone()
    }

    /// Dependencies bound at activation; `None` before activation and
    /// after removal
    pub fn dependencies(&self) -> Option<ResolvedDependencies> {
        self.dependencies.read().unwrap().clone()
    }

    /// Items successfully processed by this group's workers
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Items whose handler invocation failed
    pub fn failed_count(&self) -> u64 {
        self.failed_items.load(Ordering::Relaxed)
    }

    /// Hand one unit of work to the group.
    ///
    /// Buffered until workers start; rejected once the group is removed.
    pub fn submit_work(&self, item: WorkItem) -> MessagingResult<()> {
        let intake = self.intake_tx.lock().unwrap();
        match intake.as_ref() {
            Some(tx) => tx.send(item).map_err(|_| MessagingError::OperationFailed {
                message: format!("group {} intake is closed", self.service_name),
            }),
            None => Err(MessagingError::OperationFailed {
                message: format!("group {} no longer accepts work", self.service_name),
            }),
        }
    }

    pub(crate) fn mark_pending(&self) {
        self.transition(GroupState::Pending);
    }

    pub(crate) fn mark_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        {
            let mut failure = self.failure.write().unwrap();
            failure.get_or_insert(reason.clone());
        }
        log::warn!("Group {} failed: {}", self.service_name, reason);
        self.transition(GroupState::Failed);
    }

    /// Bind resolved dependencies and start the workers.
    ///
    /// Invoked by the installer's activation callback once the registry
    /// reports every dependency up. A no-op when the group has been removed
    /// while installation was still pending.
    pub(crate) async fn start(&self, dependencies: ResolvedDependencies) -> MessagingResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state() == GroupState::Removed {
            log::debug!(
                "Group {} was removed before activation; not starting",
                self.service_name
            );
            return Ok(());
        }

        dependencies
            .runtime
            .ensure_function(&self.handler_name)
            .map_err(|e| MessagingError::OperationFailed {
                message: format!("handler {} is unavailable: {}", self.handler_name, e),
            })?;

        let intake = self
            .intake_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| MessagingError::OperationFailed {
                message: format!("group {} was already started", self.service_name),
            })?;

        let handler = Arc::new(RuntimeHandler::new(
            Arc::clone(&dependencies.runtime),
            self.handler_name.clone(),
            self.setup_handler.clone(),
        ));
        let pool = WorkerPool::start(
            self.display_name(),
            self.concurrency(),
            intake,
            handler,
            Arc::clone(&self.processed),
            Arc::clone(&self.failed_items),
        );

        *self.workers.lock().await = Some(pool);
        *self.dependencies.write().unwrap() = Some(dependencies);
        self.transition(GroupState::Active);
        log::info!(
            "Group {} active on {} with {} workers",
            self.display_name(),
            self.destination_name,
            self.concurrency()
        );
        Ok(())
    }

    /// Tear the group down.
    ///
    /// Idempotent: removing an already-removed group is a no-op. Safe in
    /// every state - a pending installation is abandoned, an active group
    /// stops accepting work and drains or discards in-flight items per its
    /// durability flag, and all bound dependency handles are released.
    pub async fn remove(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state() == GroupState::Removed {
            log::debug!("Group {} already removed", self.service_name);
            return;
        }
        log::info!("Removing group {}", self.service_name);

        // Stop a pending activation and any further lookups first. The node
        // is only torn down when it still belongs to this instance - after a
        // replacement, the name is owned by the successor group.
        let owns_node = self
            .registry
            .get_value_as::<MessageProcessorGroup>(&self.service_name)
            .map(|current| std::ptr::eq(Arc::as_ptr(&current), self))
            .unwrap_or(false);
        if owns_node {
            if let Err(e) = self.registry.remove_node(&self.service_name) {
                log::debug!("Node removal for {}: {}", self.service_name, e);
            }
        }

        // Close the intake: no new work past this point
        drop(self.intake_tx.lock().unwrap().take());

        let pool = self.workers.lock().await.take();
        match pool {
            Some(pool) => pool.shutdown(self.durable()).await,
            None => {
                // Never activated; discard anything buffered
                if let Some(rx) = self.intake_rx.lock().unwrap().take() {
                    drop(rx);
                }
            }
        }

        *self.dependencies.write().unwrap() = None;
        self.force_state(GroupState::Removed);

        let event = Event::Group(GroupEvent::new(
            GroupEventType::Removed,
            self.service_name.to_string(),
            self.destination_name.clone(),
        ));
        if let Err(e) = get_notification_service().await.publish(event).await {
            log::debug!("Removed event for {} not delivered: {}", self.service_name, e);
        }
    }

    fn display_name(&self) -> String {
        self.name
            .get()
            .cloned()
            .unwrap_or_else(|| self.service_name.to_string())
    }

    /// State machine transitions; Removed is final, Failed only yields to
    /// Removed
    fn transition(&self, next: GroupState) {
        self.state_tx.send_if_modified(|current| {
            let allowed = match (*current, next) {
                (GroupState::Removed, _) => false,
                (GroupState::Failed, GroupState::Removed) => true,
                (GroupState::Failed, _) => false,
                (current, next) => current != next,
            };
            if allowed {
                *current = next;
            }
            allowed
        });
    }

    fn force_state(&self, next: GroupState) {
        self.state_tx.send_replace(next);
    }
}
