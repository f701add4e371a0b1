//! Event types for the notification system

use std::time::SystemTime;

/// Lifecycle transitions of a message processor group
#[derive(Clone, Debug, PartialEq)]
pub enum GroupEventType {
    Installed,
    Activated,
    Failed,
    Removed,
}

/// System-wide lifecycle events
#[derive(Clone, Debug, PartialEq)]
pub enum SystemEventType {
    Startup,
    Shutdown,
}

/// Event published for every observable group lifecycle transition
#[derive(Clone, Debug)]
pub struct GroupEvent {
    pub event_type: GroupEventType,
    pub timestamp: SystemTime,
    /// Canonical service name of the group
    pub group_name: String,
    /// Destination the group is bound to
    pub destination: String,
    pub message: Option<String>,
}

impl GroupEvent {
    pub fn new(event_type: GroupEventType, group_name: String, destination: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            group_name,
            destination,
            message: None,
        }
    }

    pub fn with_message(
        event_type: GroupEventType,
        group_name: String,
        destination: String,
        message: String,
    ) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            group_name,
            destination,
            message: Some(message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SystemEvent {
    pub event_type: SystemEventType,
    pub timestamp: SystemTime,
    pub message: Option<String>,
}

impl SystemEvent {
    pub fn new(event_type: SystemEventType) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: None,
        }
    }

    pub fn with_message(event_type: SystemEventType, message: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: Some(message),
        }
    }
}

/// Unified event enum that encompasses all event types
#[derive(Clone, Debug)]
pub enum Event {
    Group(GroupEvent),
    System(SystemEvent),
}

/// Event filtering options for subscribers
#[derive(Clone, Debug, PartialEq)]
pub enum EventFilter {
    GroupOnly,
    SystemOnly,
    /// Group events for one destination only
    GroupsFor(String),
    All,
}

impl EventFilter {
    /// Check if an event should be accepted by this filter
    pub fn accepts(&self, event: &Event) -> bool {
        match (self, event) {
            (EventFilter::GroupOnly, Event::Group(_)) => true,
            (EventFilter::SystemOnly, Event::System(_)) => true,
            (EventFilter::GroupsFor(destination), Event::Group(group_event)) => {
                &group_event.destination == destination
            }
            (EventFilter::All, _) => true,
            _ => false,
        }
    }
}
