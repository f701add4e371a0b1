//! Tests for dependency resolution and activation ordering

use crate::registry::api::{
    ActivationOutcome, GraphSubmission, NodeState, RegistryError, ServiceName, ServiceRegistry,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

fn submission(
    name: ServiceName,
    prerequisite: Option<ServiceName>,
    dependencies: Vec<ServiceName>,
    outcome_tx: mpsc::UnboundedSender<ActivationOutcome>,
) -> GraphSubmission {
    GraphSubmission {
        name,
        prerequisite,
        dependencies,
        value: None,
        on_activation: Box::new(move |outcome| {
            Box::pin(async move {
                outcome_tx.send(outcome).ok();
                Ok(())
            })
        }),
    }
}

async fn expect_outcome(rx: &mut mpsc::UnboundedReceiver<ActivationOutcome>) -> ActivationOutcome {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for activation outcome")
        .expect("outcome channel closed")
}

#[tokio::test]
async fn test_activation_fires_once_all_dependencies_are_up() {
    let registry = Arc::new(ServiceRegistry::new());
    let dep_a = ServiceName::of("dep-a");
    let dep_b = ServiceName::of("dep-b");
    let node = ServiceName::of("node");

    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .submit_graph(submission(
            node.clone(),
            None,
            vec![dep_a.clone(), dep_b.clone()],
            tx,
        ))
        .unwrap();

    // Submission never blocks on resolution
    assert_eq!(registry.lookup(&node), Some(NodeState::Down));

    registry.install_resource(dep_a, Arc::new(())).unwrap();
    registry.install_resource(dep_b, Arc::new(())).unwrap();

    assert_eq!(expect_outcome(&mut rx).await, ActivationOutcome::Ready);
}

#[tokio::test]
async fn test_node_reaches_up_after_successful_activation() {
    let registry = Arc::new(ServiceRegistry::new());
    let dep = ServiceName::of("dep");
    let node = ServiceName::of("node");

    registry.install_resource(dep.clone(), Arc::new(())).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .submit_graph(submission(node.clone(), None, vec![dep], tx))
        .unwrap();

    expect_outcome(&mut rx).await;
    // Up follows the callback; give the observer a beat to publish it
    timeout(Duration::from_secs(2), async {
        while registry.lookup(&node) != Some(NodeState::Up) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("node never reached Up");
}

#[tokio::test]
async fn test_dependency_failure_settles_as_failed() {
    let registry = Arc::new(ServiceRegistry::new());
    let dep = ServiceName::of("flaky");
    let node = ServiceName::of("node");

    registry
        .install_resource_with_state(dep.clone(), Arc::new(()), NodeState::Starting)
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .submit_graph(submission(node.clone(), None, vec![dep.clone()], tx))
        .unwrap();

    registry.set_resource_state(&dep, NodeState::Failed).unwrap();

    assert_eq!(
        expect_outcome(&mut rx).await,
        ActivationOutcome::DependencyFailed { dependency: dep }
    );
    timeout(Duration::from_secs(2), async {
        while registry.lookup(&node) != Some(NodeState::Failed) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("node never reached Failed");
}

#[tokio::test]
async fn test_prerequisite_gates_everything_else() {
    let registry = Arc::new(ServiceRegistry::new());
    let backing = ServiceName::of("backing");
    let other = ServiceName::of("other");
    let node = ServiceName::of("node");

    registry
        .install_resource_with_state(backing.clone(), Arc::new(()), NodeState::Starting)
        .unwrap();
    registry.install_resource(other.clone(), Arc::new(())).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .submit_graph(submission(
            node.clone(),
            Some(backing.clone()),
            vec![other],
            tx,
        ))
        .unwrap();

    // Every ordinary dependency is already up, but the gate is not
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    registry.set_resource_state(&backing, NodeState::Up).unwrap();
    assert_eq!(expect_outcome(&mut rx).await, ActivationOutcome::Ready);
}

#[tokio::test]
async fn test_activation_error_fails_the_node() {
    let registry = Arc::new(ServiceRegistry::new());
    let dep = ServiceName::of("dep");
    let node = ServiceName::of("node");

    registry.install_resource(dep.clone(), Arc::new(())).unwrap();
    registry
        .submit_graph(GraphSubmission {
            name: node.clone(),
            prerequisite: None,
            dependencies: vec![dep],
            value: None,
            on_activation: Box::new(|_| {
                Box::pin(async { Err("boom".to_string().into()) })
            }),
        })
        .unwrap();

    timeout(Duration::from_secs(2), async {
        while registry.lookup(&node) != Some(NodeState::Failed) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("node never reached Failed");
}

#[tokio::test]
async fn test_cyclic_submission_is_rejected() {
    let registry = Arc::new(ServiceRegistry::new());
    let a = ServiceName::of("a");
    let b = ServiceName::of("b");

    let (tx, _rx) = mpsc::unbounded_channel();
    registry
        .submit_graph(submission(b.clone(), None, vec![a.clone()], tx.clone()))
        .unwrap();

    let result = registry.submit_graph(submission(a, None, vec![b], tx));
    assert!(matches!(result, Err(RegistryError::DependencyCycle { .. })));
}

#[tokio::test]
async fn test_duplicate_live_submission_is_rejected() {
    let registry = Arc::new(ServiceRegistry::new());
    let node = ServiceName::of("node");

    let (tx, _rx) = mpsc::unbounded_channel();
    registry
        .submit_graph(submission(node.clone(), None, vec![], tx.clone()))
        .unwrap();

    let result = registry.submit_graph(submission(node, None, vec![], tx));
    assert!(matches!(result, Err(RegistryError::AlreadyInstalled { .. })));
}
