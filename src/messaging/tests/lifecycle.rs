//! Tests for group creation and asynchronous activation

use super::support::{wait_for_processed, wait_for_state, TestHost};
use crate::messaging::api::{get_management_service, GroupState, WorkItem};
use crate::notifications::api::{get_notification_service, Event, EventFilter, GroupEventType};
use crate::registry::api::NodeState;
use serde_json::json;

#[tokio::test]
async fn test_created_group_activates_with_configured_workers() {
    let host = TestHost::new("shop-lifecycle-a", &["billing"], 0);
    host.start_destination("orders");

    let group = host.create("orders", "billing", 4, true).await.unwrap();

    // Exactly one identifier recorded for the destination
    let installed = host.groupizer.installed_groups_for("orders").unwrap();
    assert_eq!(installed, vec![group.service_name().clone()]);

    wait_for_state(&group, GroupState::Active).await;
    assert_eq!(group.concurrency(), 4);
    assert!(group.durable());
    assert!(!group.singleton());
    assert_eq!(group.name(), Some("orders.YmlsbGluZw"));
}

#[tokio::test]
async fn test_create_returns_before_dependencies_resolve() {
    let host = TestHost::new("shop-lifecycle-b", &["billing"], 0);
    // Ready (Starting) but not yet Up: the graph cannot activate
    host.install_destination_pointer("orders", NodeState::Starting);
    host.install_destination_handle("orders");

    let group = host.create("orders", "billing", 2, false).await.unwrap();

    // create_group returned while resolution is still outstanding
    assert_eq!(group.state(), GroupState::Pending);
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    assert_eq!(group.state(), GroupState::Pending);

    host.set_destination_pointer_state("orders", NodeState::Up);
    wait_for_state(&group, GroupState::Active).await;
}

#[tokio::test]
async fn test_work_flows_through_the_workers() {
    let host = TestHost::new("shop-lifecycle-c", &["billing"], 0);
    host.start_destination("orders");

    let group = host.create("orders", "billing", 3, false).await.unwrap();
    wait_for_state(&group, GroupState::Active).await;

    for i in 0..25 {
        group.submit_work(WorkItem::new(json!({"order": i}))).unwrap();
    }
    wait_for_processed(&group, 25).await;
    assert_eq!(group.failed_count(), 0);
}

#[tokio::test]
async fn test_work_submitted_while_pending_is_buffered() {
    let host = TestHost::new("shop-lifecycle-d", &["billing"], 0);
    host.install_destination_pointer("orders", NodeState::Starting);
    host.install_destination_handle("orders");

    let group = host.create("orders", "billing", 1, true).await.unwrap();
    group.submit_work(WorkItem::new(json!(1))).unwrap();
    group.submit_work(WorkItem::new(json!(2))).unwrap();

    host.set_destination_pointer_state("orders", NodeState::Up);
    wait_for_state(&group, GroupState::Active).await;
    wait_for_processed(&group, 2).await;
}

#[tokio::test]
async fn test_dependencies_are_bound_at_activation() {
    let host = TestHost::new("shop-lifecycle-e", &["billing"], 0);
    host.start_destination("orders");

    let group = host.create("orders", "billing", 1, false).await.unwrap();
    assert!(group.dependencies().is_none());

    wait_for_state(&group, GroupState::Active).await;
    let dependencies = group.dependencies().expect("dependencies bound");
    assert_eq!(dependencies.destination.destination_name(), "orders");
    assert_eq!(dependencies.connection_factory.broker_url(), "amqp://broker");
    assert!(dependencies.runtime.is_initialized());
}

#[tokio::test]
async fn test_group_is_visible_to_management() {
    let host = TestHost::new("shop-lifecycle-f", &["billing"], 0);
    host.start_destination("orders");

    let group = host.create("orders", "billing", 2, true).await.unwrap();
    wait_for_state(&group, GroupState::Active).await;

    let status = get_management_service()
        .status_of(group.service_name())
        .expect("registered for management");
    assert_eq!(status.destination, "orders");
    assert_eq!(status.handler, "billing");
    assert_eq!(status.state, GroupState::Active);
    assert_eq!(status.concurrency, 2);
    assert!(status.durable);
}

#[tokio::test]
async fn test_lifecycle_events_arrive_in_order() {
    // Filtering on this test's unique destination keeps concurrent tests
    // out of the stream
    let mut events = get_notification_service()
        .await
        .subscribe(
            "lifecycle-events-test".to_string(),
            EventFilter::GroupsFor("orders-evt".to_string()),
            "test:lifecycle".to_string(),
        )
        .unwrap();

    let host = TestHost::new("shop-lifecycle-g", &["billing"], 0);
    host.start_destination("orders-evt");

    let group = host.create("orders-evt", "billing", 1, false).await.unwrap();
    wait_for_state(&group, GroupState::Active).await;
    host.groupizer.remove_groups_for("orders-evt").await.unwrap();

    let mut seen = Vec::new();
    while seen.len() < 3 {
        match tokio::time::timeout(tokio::time::Duration::from_secs(2), events.recv()).await {
            Ok(Some(Event::Group(event))) => seen.push(event.event_type),
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    assert_eq!(
        seen,
        vec![
            GroupEventType::Installed,
            GroupEventType::Activated,
            GroupEventType::Removed
        ]
    );
}
