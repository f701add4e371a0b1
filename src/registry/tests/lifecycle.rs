//! Tests for node lifecycle, values, and removal

use crate::registry::api::{
    ActivationOutcome, GraphSubmission, NodeState, ServiceName, ServiceRegistry,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

#[tokio::test]
async fn test_lookup_of_unknown_node_is_none() {
    let registry = ServiceRegistry::new();
    assert_eq!(registry.lookup(&ServiceName::of("ghost")), None);
}

#[tokio::test]
async fn test_resolved_value_downcasts() {
    let registry = ServiceRegistry::new();
    let name = ServiceName::of("conn-factory");
    registry
        .install_resource(name.clone(), Arc::new("amqp://broker".to_string()))
        .unwrap();

    let value = registry.get_value_as::<String>(&name).unwrap();
    assert_eq!(value.as_str(), "amqp://broker");
    assert!(registry.get_value_as::<u64>(&name).is_none());
}

#[tokio::test]
async fn test_placeholder_is_filled_by_later_install() {
    let registry = Arc::new(ServiceRegistry::new());
    let dep = ServiceName::of("late-resource");
    let node = ServiceName::of("node");

    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .submit_graph(GraphSubmission {
            name: node,
            prerequisite: None,
            dependencies: vec![dep.clone()],
            value: None,
            on_activation: Box::new(move |outcome| {
                Box::pin(async move {
                    tx.send(outcome).ok();
                    Ok(())
                })
            }),
        })
        .unwrap();

    // Declared but never installed: a Down placeholder
    assert_eq!(registry.lookup(&dep), Some(NodeState::Down));

    registry.install_resource(dep, Arc::new(())).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ActivationOutcome::Ready);
}

#[tokio::test]
async fn test_removal_before_activation_abandons_callback() {
    let registry = Arc::new(ServiceRegistry::new());
    let dep = ServiceName::of("never-up");
    let node = ServiceName::of("node");

    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .submit_graph(GraphSubmission {
            name: node.clone(),
            prerequisite: None,
            dependencies: vec![dep.clone()],
            value: None,
            on_activation: Box::new(move |outcome| {
                Box::pin(async move {
                    tx.send(outcome).ok();
                    Ok(())
                })
            }),
        })
        .unwrap();

    registry.remove_node(&node).unwrap();
    assert_eq!(registry.lookup(&node), Some(NodeState::Removed));

    // Resolving the dependency afterwards must not trigger activation
    registry.install_resource(dep, Arc::new(())).unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_removal_releases_the_value() {
    let registry = ServiceRegistry::new();
    let name = ServiceName::of("resource");
    registry
        .install_resource(name.clone(), Arc::new(42u64))
        .unwrap();
    assert!(registry.get_value(&name).is_some());

    registry.remove_node(&name).unwrap();
    assert!(registry.get_value(&name).is_none());
}

#[tokio::test]
async fn test_graph_edges_are_queryable() {
    let registry = Arc::new(ServiceRegistry::new());
    let dep = ServiceName::of("dep");
    let node = ServiceName::of("node");

    registry
        .submit_graph(GraphSubmission {
            name: node.clone(),
            prerequisite: None,
            dependencies: vec![dep.clone()],
            value: None,
            on_activation: Box::new(|_| Box::pin(async { Ok(()) })),
        })
        .unwrap();

    assert_eq!(registry.dependencies_of(&node), vec![dep.clone()]);
    assert_eq!(registry.dependents_of(&dep), vec![node]);
}

#[tokio::test]
async fn test_double_install_of_resource_is_rejected() {
    let registry = ServiceRegistry::new();
    let name = ServiceName::of("resource");
    registry.install_resource(name.clone(), Arc::new(())).unwrap();
    assert!(registry.install_resource(name, Arc::new(())).is_err());
}
