//! Groupizer - orchestrates group creation, bookkeeping, and teardown
//!
//! The public entry point of the messaging core. One Groupizer per
//! deployment: it validates destination readiness, constructs and records
//! groups, delegates installation to the Group Installer, and walks the
//! Group Registry on removal.

use crate::core::sync::handle_mutex_poison;
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::group::MessageProcessorGroup;
use crate::messaging::handles::Connection;
use crate::messaging::installer::GroupInstaller;
use crate::messaging::management::get_management_service;
use crate::messaging::naming::{self, Deployment};
use crate::messaging::readiness::ReadinessValidator;
use crate::messaging::registry::GroupRegistry;
use crate::notifications::api::{get_notification_service, Event, GroupEvent, GroupEventType};
use crate::registry::api::{ServiceName, ServiceRegistry};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// What to do when a group is created twice for the same
/// (destination, handler) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Remove the prior group and supersede its registry entry
    #[default]
    Replace,
    /// Reject the second creation; the prior group is untouched
    Reject,
}

/// Installs and manages groups of message-processing workers for one
/// deployment.
///
/// # Example
///
/// ```rust,no_run
/// use groupizer::messaging::api::{Connection, Deployment, Groupizer};
/// use groupizer::registry::api::ServiceRegistry;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Arc::new(ServiceRegistry::new());
/// let groupizer = Groupizer::new(Deployment::new("shop"), Arc::clone(&registry));
/// let connection = Arc::new(Connection::new("amqp://broker"));
///
/// let group = groupizer
///     .create_group("orders", false, 4, true, "billing", connection, json!({}))
///     .await?;
/// println!("installed {}", group.service_name());
/// # Ok(())
/// # }
/// ```
pub struct Groupizer {
    deployment: Deployment,
    registry: Arc<ServiceRegistry>,
    validator: ReadinessValidator,
    installer: GroupInstaller,
    groups: Mutex<GroupRegistry>,
    duplicate_policy: DuplicatePolicy,
}

impl Groupizer {
    pub fn new(deployment: Deployment, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            deployment,
            validator: ReadinessValidator::new(Arc::clone(&registry)),
            installer: GroupInstaller::new(Arc::clone(&registry)),
            registry,
            groups: Mutex::new(GroupRegistry::new()),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }

    /// Override the duplicate-creation policy (default: Replace)
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Create and install a group of message-processing workers.
    ///
    /// Fails fast with `InvalidState` when the destination's backing
    /// resource is not ready, and with `InvalidArgument` on malformed
    /// input, in both cases before any registry mutation. Returns as soon
    /// as the dependency graph is submitted: the group is handed back in
    /// `Pending` state and activates asynchronously once the service
    /// registry reports every dependency up.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_group(
        &self,
        destination_name: &str,
        singleton: bool,
        concurrency: usize,
        durable: bool,
        handler_name: &str,
        connection: Arc<Connection>,
        setup_handler: Value,
    ) -> MessagingResult<Arc<MessageProcessorGroup>> {
        if destination_name.is_empty() {
            return Err(MessagingError::InvalidArgument {
                message: "destination name must not be empty".to_string(),
            });
        }
        if handler_name.is_empty() {
            return Err(MessagingError::InvalidArgument {
                message: "handler name must not be empty".to_string(),
            });
        }
        if concurrency < 1 {
            return Err(MessagingError::InvalidArgument {
                message: "concurrency must be at least 1".to_string(),
            });
        }

        if !self
            .validator
            .is_destination_ready(&self.deployment, destination_name)
        {
            return Err(MessagingError::InvalidState {
                destination: destination_name.to_string(),
            });
        }

        let name = naming::group_name(destination_name, handler_name);
        let service_name = self.deployment.message_processor(&name);

        let group = Arc::new(MessageProcessorGroup::new(
            Arc::clone(&self.registry),
            service_name.clone(),
            destination_name,
            singleton,
            handler_name,
            Arc::clone(&connection),
            setup_handler,
        ));
        group.set_concurrency(concurrency)?;
        group.set_durable(durable)?;
        group.set_name(&name)?;

        // Flips once the Installed event is out, so lifecycle events from
        // the asynchronous activation never precede it
        let (announce_tx, announce_rx) = tokio::sync::watch::channel(false);

        // Registry bookkeeping, duplicate handling, and graph submission are
        // one critical section: a concurrent removal always sees either no
        // entry or a fully-recorded, submitted group.
        {
            let mut groups = handle_mutex_poison(self.groups.lock(), |message| {
                MessagingError::OperationFailed { message }
            })?;

            if groups
                .installed_groups_for(destination_name)
                .contains(&service_name)
            {
                match self.duplicate_policy {
                    DuplicatePolicy::Reject => {
                        return Err(MessagingError::InvalidArgument {
                            message: format!(
                                "a group for handler {} is already installed on {}",
                                handler_name, destination_name
                            ),
                        });
                    }
                    DuplicatePolicy::Replace => {
                        log::info!(
                            "Replacing group {} on {}",
                            service_name,
                            destination_name
                        );
                        let prior = self
                            .registry
                            .get_value_as::<MessageProcessorGroup>(&service_name);
                        // Terminal node state frees the name for resubmission;
                        // the prior group drains in the background
                        if let Err(e) = self.registry.remove_node(&service_name) {
                            log::debug!("Prior node removal for {}: {}", service_name, e);
                        }
                        if let Some(prior) = prior {
                            tokio::spawn(async move { prior.remove().await });
                        }
                        get_management_service().deregister(&service_name);
                        groups.forget_group(destination_name, &service_name);
                    }
                }
            }

            groups.remember(destination_name, service_name.clone());

            if let Err(e) = self.installer.install(&self.deployment, &group, announce_rx) {
                groups.forget_group(destination_name, &service_name);
                // Settle the synchronization chain so later installs on this
                // destination are not stuck behind a group that never ran
                group.mark_failed(e.to_string());
                return Err(e);
            }
        }

        get_management_service().register(&group);

        let event = Event::Group(GroupEvent::new(
            GroupEventType::Installed,
            service_name.to_string(),
            destination_name.to_string(),
        ));
        if let Err(e) = get_notification_service().await.publish(event).await {
            log::debug!("Installed event for {} not delivered: {}", service_name, e);
        }
        let _ = announce_tx.send(true);

        log::info!(
            "Created group {} on {} (concurrency {}, durable {}, singleton {})",
            service_name,
            destination_name,
            concurrency,
            durable,
            singleton
        );
        Ok(group)
    }

    /// Tear down every group installed for a destination and forget its
    /// registry sequence. A destination with no registered groups is a
    /// no-op, not an error.
    pub async fn remove_groups_for(&self, destination_name: &str) -> MessagingResult<()> {
        let names = self.installed_groups_for(destination_name)?;
        if names.is_empty() {
            log::debug!("No groups installed for {}", destination_name);
            return Ok(());
        }

        log::info!(
            "Removing {} group(s) for {}",
            names.len(),
            destination_name
        );
        for name in &names {
            if let Some(group) = self.registry.get_value_as::<MessageProcessorGroup>(name) {
                group.remove().await;
            }
            get_management_service().deregister(name);
        }

        {
            let mut groups = handle_mutex_poison(self.groups.lock(), |message| {
                MessagingError::OperationFailed { message }
            })?;
            // Identifiers leave the registry only after their group has been
            // told to tear down; entries recorded by a concurrent creation
            // survive untouched
            for name in &names {
                groups.forget_group(destination_name, name);
            }
            if groups.installed_groups_for(destination_name).is_empty() {
                self.installer.release_destination(destination_name);
            }
        }
        Ok(())
    }

    /// Identifiers of the groups currently installed for a destination, in
    /// installation order
    pub fn installed_groups_for(
        &self,
        destination_name: &str,
    ) -> MessagingResult<Vec<ServiceName>> {
        let groups = handle_mutex_poison(self.groups.lock(), |message| {
            MessagingError::OperationFailed { message }
        })?;
        Ok(groups.installed_groups_for(destination_name))
    }
}
