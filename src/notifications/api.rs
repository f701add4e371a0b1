//! Public API for the notification system
//!
//! This module provides the complete public API for the notification system.
//! External modules should import from here rather than directly from
//! internal modules.

use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

// Core event types and enums
pub use crate::notifications::event::{
    Event, EventFilter, GroupEvent, GroupEventType, SystemEvent, SystemEventType,
};

// Manager and utilities
pub use crate::notifications::error::{NotificationError, NotificationResult};
pub use crate::notifications::manager::{AsyncNotificationManager, EventReceiver};

/// Global notification service instance
static NOTIFICATION_SERVICE: LazyLock<Arc<Mutex<AsyncNotificationManager>>> = LazyLock::new(|| {
    log::trace!("Initializing notification service");
    Arc::new(Mutex::new(AsyncNotificationManager::new()))
});

/// Access notification service
///
/// Returns a guard on the global notification service that can be used to
/// publish events and manage subscribers. Each call locks the same shared
/// instance.
///
/// # Examples
/// ```no_run
/// # use groupizer::notifications::api::{get_notification_service, Event, SystemEvent, SystemEventType};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manager = get_notification_service().await;
/// let event = Event::System(SystemEvent::new(SystemEventType::Startup));
/// manager.publish(event).await?;
/// # Ok(())
/// # }
/// ```
pub async fn get_notification_service() -> tokio::sync::MutexGuard<'static, AsyncNotificationManager>
{
    NOTIFICATION_SERVICE.lock().await
}
