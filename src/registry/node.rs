//! Registry nodes and their lifecycle states

use crate::registry::name::ServiceName;
use std::any::Any;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

/// Lifecycle state of a registry node.
///
/// `Down` covers both declared-but-not-started placeholders and submitted
/// nodes whose dependencies have not yet resolved. `Starting` means the
/// activation callback is running; a node in `Starting` or `Up` will or does
/// accept bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Down,
    Starting,
    Up,
    Failed,
    Removed,
}

impl NodeState {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Failed | NodeState::Removed)
    }
}

/// A single named node: current state plus an optional resolved value.
///
/// State changes are broadcast through a watch channel so any number of
/// observers can wait for the node to settle without polling.
pub(crate) struct ServiceNode {
    name: ServiceName,
    state_tx: watch::Sender<NodeState>,
    value: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
}

impl ServiceNode {
    pub(crate) fn new(name: ServiceName, initial: NodeState) -> Self {
        let (state_tx, _) = watch::channel(initial);
        Self {
            name,
            state_tx,
            value: RwLock::new(None),
        }
    }

    pub(crate) fn name(&self) -> &ServiceName {
        &self.name
    }

    pub(crate) fn state(&self) -> NodeState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state changes
    pub(crate) fn watch(&self) -> watch::Receiver<NodeState> {
        self.state_tx.subscribe()
    }

    /// Transition to a new state, waking all watchers.
    ///
    /// Transitions out of a terminal state are ignored: a Failed or Removed
    /// node stays settled no matter what arrives afterwards.
    pub(crate) fn set_state(&self, next: NodeState) {
        self.state_tx.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    pub(crate) fn set_value(&self, value: Arc<dyn Any + Send + Sync>) {
        let mut slot = self.value.write().unwrap();
        *slot = Some(value);
    }

    pub(crate) fn value(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.value.read().unwrap().clone()
    }

    /// Drop the resolved value, releasing whatever it referenced
    pub(crate) fn clear_value(&self) {
        let mut slot = self.value.write().unwrap();
        *slot = None;
    }
}
