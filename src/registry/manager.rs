//! ServiceRegistry - named nodes, dependency resolution, activation
//!
//! The registry is the generic installer this crate submits work to. Hosts
//! install backing resources as leaf nodes and drive their lifecycle states;
//! components submit dependency graphs whose activation callbacks run once
//! every declared dependency is up. Resolution is asynchronous: submission
//! returns immediately and a spawned observer does the waiting.

use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::graph::DependencyGraph;
use crate::registry::name::ServiceName;
use crate::registry::node::{NodeState, ServiceNode};
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;

/// How dependency resolution ended for a submitted node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Every dependency reached `Up`; the node may start
    Ready,
    /// A dependency settled in a terminal state before the node activated
    DependencyFailed { dependency: ServiceName },
}

/// Callback invoked exactly once when resolution settles.
///
/// Returning `Err` from the `Ready` path fails the node.
pub type ActivationCallback = Box<
    dyn FnOnce(
            ActivationOutcome,
        ) -> BoxFuture<'static, Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send,
>;

/// One dependency-graph submission: a named node, what it waits for, the
/// value it exposes once resolved, and the activation callback.
///
/// `prerequisite` is waited on before any of `dependencies` are observed,
/// which closes the race between an advisory readiness check and install
/// time: nothing about the node progresses until the prerequisite is up.
pub struct GraphSubmission {
    pub name: ServiceName,
    pub prerequisite: Option<ServiceName>,
    pub dependencies: Vec<ServiceName>,
    pub value: Option<Arc<dyn Any + Send + Sync>>,
    pub on_activation: ActivationCallback,
}

/// Central registry of named nodes with explicit dependency edges.
///
/// # Thread Safety
///
/// Fully thread-safe behind `Arc<ServiceRegistry>`; the node map and the
/// dependency graph are guarded by their own locks and never held across
/// await points.
///
/// # Example
///
/// ```rust,no_run
/// use groupizer::registry::api::{NodeState, ServiceName, ServiceRegistry};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Arc::new(ServiceRegistry::new());
/// let broker = ServiceName::of("broker");
/// registry.install_resource(broker.clone(), Arc::new(()))?;
/// assert_eq!(registry.lookup(&broker), Some(NodeState::Up));
/// # Ok(())
/// # }
/// ```
pub struct ServiceRegistry {
    nodes: RwLock<HashMap<ServiceName, Arc<ServiceNode>>>,
    graph: Mutex<DependencyGraph>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            graph: Mutex::new(DependencyGraph::new()),
        }
    }

    /// Install a leaf resource that is immediately up
    pub fn install_resource(
        &self,
        name: ServiceName,
        value: Arc<dyn Any + Send + Sync>,
    ) -> RegistryResult<()> {
        self.install_resource_with_state(name, value, NodeState::Up)
    }

    /// Install a leaf resource in an explicit initial state.
    ///
    /// Filling in a `Down` placeholder created by an earlier dependency
    /// declaration is allowed; any other collision is an error.
    pub fn install_resource_with_state(
        &self,
        name: ServiceName,
        value: Arc<dyn Any + Send + Sync>,
        state: NodeState,
    ) -> RegistryResult<()> {
        let node = {
            let mut nodes = self.nodes.write().unwrap();
            match nodes.get(&name) {
                Some(existing) => {
                    if existing.state() != NodeState::Down || existing.value().is_some() {
                        return Err(RegistryError::AlreadyInstalled {
                            name: name.to_string(),
                        });
                    }
                    Arc::clone(existing)
                }
                None => {
                    let node = Arc::new(ServiceNode::new(name.clone(), NodeState::Down));
                    nodes.insert(name.clone(), Arc::clone(&node));
                    node
                }
            }
        };

        node.set_value(value);
        node.set_state(state);
        log::debug!("Installed resource {} in state {:?}", name, state);
        Ok(())
    }

    /// Drive a resource's lifecycle state.
    ///
    /// Observers waiting on the node react to the transition; terminal
    /// states are sticky.
    pub fn set_resource_state(&self, name: &ServiceName, state: NodeState) -> RegistryResult<()> {
        let node = self.node(name).ok_or_else(|| RegistryError::NodeNotFound {
            name: name.to_string(),
        })?;
        log::debug!("Resource {} -> {:?}", name, state);
        node.set_state(state);
        if state == NodeState::Removed {
            node.clear_value();
        }
        Ok(())
    }

    /// Current state of a node, or `None` if the name was never seen
    pub fn lookup(&self, name: &ServiceName) -> Option<NodeState> {
        self.node(name).map(|node| node.state())
    }

    /// Resolved value of a node, if any
    pub fn get_value(&self, name: &ServiceName) -> Option<Arc<dyn Any + Send + Sync>> {
        self.node(name).and_then(|node| node.value())
    }

    /// Resolved value of a node, downcast to a concrete type
    pub fn get_value_as<T: Send + Sync + 'static>(&self, name: &ServiceName) -> Option<Arc<T>> {
        self.get_value(name)
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Submit a dependency graph for one node.
    ///
    /// Returns once the node is recorded and the resolution observer is
    /// spawned; it never waits for dependencies itself. Dependencies that do
    /// not exist yet are declared as `Down` placeholders and resolve when a
    /// host installs them. Must be called from within a tokio runtime.
    pub fn submit_graph(&self, submission: GraphSubmission) -> RegistryResult<()> {
        let GraphSubmission {
            name,
            prerequisite,
            dependencies,
            value,
            on_activation,
        } = submission;

        let mut all_deps: Vec<ServiceName> = Vec::with_capacity(dependencies.len() + 1);
        if let Some(ref gate) = prerequisite {
            all_deps.push(gate.clone());
        }
        for dep in &dependencies {
            if !all_deps.contains(dep) {
                all_deps.push(dep.clone());
            }
        }

        {
            let graph = self.graph.lock().unwrap();
            if graph.would_cycle(&name, &all_deps) {
                return Err(RegistryError::DependencyCycle {
                    name: name.to_string(),
                });
            }
        }

        let node = {
            let mut nodes = self.nodes.write().unwrap();
            if let Some(existing) = nodes.get(&name) {
                if !existing.state().is_terminal() {
                    return Err(RegistryError::AlreadyInstalled {
                        name: name.to_string(),
                    });
                }
            }
            let node = Arc::new(ServiceNode::new(name.clone(), NodeState::Down));
            nodes.insert(name.clone(), Arc::clone(&node));
            node
        };

        if let Some(value) = value {
            node.set_value(value);
        }

        let gate_node = prerequisite.as_ref().map(|gate| self.node_or_placeholder(gate));
        let dep_nodes: Vec<Arc<ServiceNode>> = dependencies
            .iter()
            .filter(|dep| prerequisite.as_ref() != Some(*dep))
            .map(|dep| self.node_or_placeholder(dep))
            .collect();

        {
            let mut graph = self.graph.lock().unwrap();
            for dep in &all_deps {
                graph.add_dependency(&name, dep);
            }
        }

        log::debug!("Submitted {} with {} dependencies", name, all_deps.len());
        tokio::spawn(resolve_and_activate(node, gate_node, dep_nodes, on_activation));
        Ok(())
    }

    /// Remove a node: terminal `Removed` state, value released, edges gone.
    ///
    /// A pending resolution observer for the node notices and stands down
    /// without running its activation callback.
    pub fn remove_node(&self, name: &ServiceName) -> RegistryResult<()> {
        let node = self.node(name).ok_or_else(|| RegistryError::NodeNotFound {
            name: name.to_string(),
        })?;
        node.set_state(NodeState::Removed);
        node.clear_value();
        self.graph.lock().unwrap().remove_node(name);
        log::debug!("Removed node {}", name);
        Ok(())
    }

    pub fn dependencies_of(&self, name: &ServiceName) -> Vec<ServiceName> {
        self.graph.lock().unwrap().dependencies_of(name)
    }

    pub fn dependents_of(&self, name: &ServiceName) -> Vec<ServiceName> {
        self.graph.lock().unwrap().dependents_of(name)
    }

    fn node(&self, name: &ServiceName) -> Option<Arc<ServiceNode>> {
        self.nodes.read().unwrap().get(name).cloned()
    }

    fn node_or_placeholder(&self, name: &ServiceName) -> Arc<ServiceNode> {
        let mut nodes = self.nodes.write().unwrap();
        Arc::clone(
            nodes
                .entry(name.clone())
                .or_insert_with(|| Arc::new(ServiceNode::new(name.clone(), NodeState::Down))),
        )
    }
}

/// What the dependency wait settled to
enum DepWait {
    AllUp,
    DependencyFailed(ServiceName),
    OwnGone,
}

/// Observer task: wait for the prerequisite, then for every remaining
/// dependency, then activate.
///
/// Nothing past the prerequisite is even observed until it is up. The whole
/// wait aborts as soon as the node itself is failed or removed externally,
/// in which case the activation callback never runs.
async fn resolve_and_activate(
    own: Arc<ServiceNode>,
    gate: Option<Arc<ServiceNode>>,
    deps: Vec<Arc<ServiceNode>>,
    on_activation: ActivationCallback,
) {
    let outcome = wait_for_dependencies(&own, gate.as_ref(), &deps).await;

    match outcome {
        DepWait::OwnGone => {
            log::debug!("Node {} removed before activation", own.name());
        }
        DepWait::DependencyFailed(dependency) => {
            log::warn!(
                "Node {} failed: dependency {} is unavailable",
                own.name(),
                dependency
            );
            own.set_state(NodeState::Failed);
            if let Err(e) = on_activation(ActivationOutcome::DependencyFailed { dependency }).await
            {
                log::warn!("Failure callback for {} returned error: {}", own.name(), e);
            }
        }
        DepWait::AllUp => {
            own.set_state(NodeState::Starting);
            match on_activation(ActivationOutcome::Ready).await {
                Ok(()) => {
                    own.set_state(NodeState::Up);
                    log::info!("Node {} is up", own.name());
                }
                Err(e) => {
                    log::warn!("Activation of {} failed: {}", own.name(), e);
                    own.set_state(NodeState::Failed);
                }
            }
        }
    }
}

async fn wait_for_dependencies(
    own: &Arc<ServiceNode>,
    gate: Option<&Arc<ServiceNode>>,
    deps: &[Arc<ServiceNode>],
) -> DepWait {
    let mut own_rx = own.watch();

    // Prerequisite gate: observed alone, before anything else.
    if let Some(gate) = gate {
        tokio::select! {
            settled = await_settled(gate.watch()) => {
                if settled != NodeState::Up {
                    return DepWait::DependencyFailed(gate.name().clone());
                }
            }
            _ = await_terminal(&mut own_rx) => return DepWait::OwnGone,
        }
    }

    // Remaining dependencies (and the gate, which may still fail before
    // activation) are watched together: a failure of any one of them, even
    // one that was up earlier, settles the wait.
    let watched: Vec<&Arc<ServiceNode>> = gate.into_iter().chain(deps.iter()).collect();
    let mut dep_rxs: Vec<watch::Receiver<NodeState>> =
        watched.iter().map(|dep| dep.watch()).collect();

    loop {
        if own_rx.borrow_and_update().is_terminal() {
            return DepWait::OwnGone;
        }

        let mut all_up = true;
        for (dep, rx) in watched.iter().zip(dep_rxs.iter_mut()) {
            let state = *rx.borrow_and_update();
            if state.is_terminal() {
                return DepWait::DependencyFailed(dep.name().clone());
            }
            if state != NodeState::Up {
                all_up = false;
            }
        }
        if all_up {
            return DepWait::AllUp;
        }

        let mut changes: Vec<Pin<Box<dyn Future<Output = ()> + Send + '_>>> = dep_rxs
            .iter_mut()
            .map(|rx| {
                Box::pin(async move {
                    let _ = rx.changed().await;
                }) as Pin<Box<dyn Future<Output = ()> + Send + '_>>
            })
            .collect();
        changes.push(Box::pin(async {
            let _ = own_rx.changed().await;
        }));
        futures::future::select_all(changes).await;
    }
}

/// Wait until a dependency reaches `Up` or a terminal state
async fn await_settled(mut rx: watch::Receiver<NodeState>) -> NodeState {
    loop {
        let state = *rx.borrow_and_update();
        if state == NodeState::Up || state.is_terminal() {
            return state;
        }
        if rx.changed().await.is_err() {
            return *rx.borrow();
        }
    }
}

/// Wait until the node itself is failed or removed out from under us
async fn await_terminal(rx: &mut watch::Receiver<NodeState>) -> NodeState {
    loop {
        let state = *rx.borrow_and_update();
        if state.is_terminal() {
            return state;
        }
        if rx.changed().await.is_err() {
            return *rx.borrow();
        }
    }
}
