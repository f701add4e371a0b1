//! AsyncNotificationManager implementation

use crate::notifications::error::{NotificationError, NotificationResult};
use crate::notifications::event::{Event, EventFilter};
use std::collections::HashMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Receiver half handed to a subscriber
pub type EventReceiver = UnboundedReceiver<Event>;

struct SubscriberInfo {
    filter: EventFilter,
    source: String,
    sender: UnboundedSender<Event>,
}

/// Fan-out publisher for lifecycle events.
///
/// Each subscriber gets its own unbounded channel and an event filter;
/// publishing clones the event to every subscriber whose filter accepts it.
/// Subscribers whose receiving half has been dropped are pruned on the next
/// publish.
pub struct AsyncNotificationManager {
    subscribers: HashMap<String, SubscriberInfo>,
}

impl Default for AsyncNotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncNotificationManager {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }

    /// Register a subscriber under a unique id.
    ///
    /// Re-subscribing under an existing id replaces the old subscription;
    /// the replacement is logged since it usually indicates a leaked id.
    pub fn subscribe(
        &mut self,
        subscriber_id: String,
        filter: EventFilter,
        source: String,
    ) -> NotificationResult<EventReceiver> {
        let (sender, receiver) = unbounded_channel();

        let info = SubscriberInfo {
            filter,
            source: source.clone(),
            sender,
        };

        if let Some(existing) = self.subscribers.insert(subscriber_id.clone(), info) {
            log::warn!(
                "Subscriber '{}' replaced existing subscription (source: {} -> {})",
                subscriber_id,
                existing.source,
                source
            );
        }

        Ok(receiver)
    }

    pub fn unsubscribe(&mut self, subscriber_id: &str) -> bool {
        self.subscribers.remove(subscriber_id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains_key(subscriber_id)
    }

    /// Drop all subscriptions; used by tests to isolate the global service
    pub fn clear_subscribers(&mut self) {
        self.subscribers.clear();
    }

    /// Publish an event to every subscriber whose filter accepts it
    pub async fn publish(&mut self, event: Event) -> NotificationResult<()> {
        let event_type = match &event {
            Event::Group(_) => "Group",
            Event::System(_) => "System",
        }
        .to_string();

        let mut failed_subscribers = Vec::new();
        for (subscriber_id, info) in &self.subscribers {
            if info.filter.accepts(&event) && info.sender.send(event.clone()).is_err() {
                failed_subscribers.push(subscriber_id.clone());
            }
        }

        // Prune subscribers whose receivers are gone
        for subscriber_id in &failed_subscribers {
            self.subscribers.remove(subscriber_id);
        }

        if !failed_subscribers.is_empty() {
            return Err(NotificationError::PublishFailed {
                event_type,
                failed_subscribers,
            });
        }

        Ok(())
    }
}
