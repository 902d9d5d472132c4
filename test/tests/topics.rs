/// Integration tests for topic interest propagation and message delivery

use std::thread;

use peerlink_node::{DispatchError, InterestKind, NodeClosedError, NodeError};
use peerlink_test::{CountingMessage, TestMesh};

fn connected_pair() -> (TestMesh, usize, usize) {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    mesh.connect(a, b);
    mesh.settle();
    (mesh, a, b)
}

#[test]
fn local_interest_is_replayed_to_new_peers() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();

    mesh.node_mut(a)
        .register_subscription("/pose", "Pose")
        .unwrap();
    mesh.node_mut(a)
        .register_publication("/cmd_vel", "Twist")
        .unwrap();

    mesh.connect(a, b);
    mesh.settle();

    assert_eq!(mesh.node(b).remote_subscriber_count("/pose"), 1);
    assert_eq!(mesh.node(b).remote_publisher_count("/cmd_vel"), 1);
    assert_eq!(mesh.node(b).remote_subscriber_count("/cmd_vel"), 0);

    let subscriber_events: Vec<_> = mesh
        .log(b)
        .interests
        .iter()
        .filter(|event| event.topic == "/pose")
        .collect();
    assert_eq!(subscriber_events.len(), 1);
    assert_eq!(subscriber_events[0].kind, InterestKind::Subscriber);
    assert_eq!(subscriber_events[0].type_name, "Pose");
    assert_eq!(subscriber_events[0].count, 1);
}

#[test]
fn registration_reaches_established_peers() {
    let (mut mesh, a, b) = connected_pair();

    assert_eq!(
        mesh.node_mut(b).register_subscription("/pose", "Pose"),
        Ok(true)
    );
    assert_eq!(
        mesh.node_mut(b).register_subscription("/pose", "Pose"),
        Ok(false)
    );
    mesh.settle();

    let b_id = mesh.node_id(b);
    assert_eq!(mesh.node(a).remote_subscriber_count("/pose"), 1);
    assert_eq!(
        mesh.node(a).dispatcher().remote_subscribers("/pose"),
        vec![b_id]
    );
    assert_eq!(mesh.log(a).interests.len(), 1);
}

#[test]
fn local_type_conflict_is_refused() {
    let (mut mesh, a, b) = connected_pair();

    mesh.node_mut(a)
        .register_subscription("/pose", "Pose")
        .unwrap();
    let result = mesh.node_mut(a).register_subscription("/pose", "Twist");
    assert!(matches!(result, Err(DispatchError::TypeMismatch { .. })));
    mesh.settle();

    let known: Vec<(&str, &str)> = mesh.node(a).dispatcher().local_subscriptions().collect();
    assert_eq!(known, vec![("/pose", "Pose")]);
    assert_eq!(mesh.node(b).remote_subscriber_count("/pose"), 1);
}

#[test]
fn remote_type_conflict_is_reported_and_recorded() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    let c = mesh.add_node();

    mesh.node_mut(b)
        .register_subscription("/pose", "Pose")
        .unwrap();
    mesh.node_mut(c)
        .register_subscription("/pose", "PoseStamped")
        .unwrap();
    mesh.connect(a, b);
    mesh.connect(a, c);
    mesh.settle();

    assert_eq!(mesh.node(a).remote_subscriber_count("/pose"), 2);
    let mismatches = mesh
        .log(a)
        .errors
        .iter()
        .filter(|error| matches!(error, NodeError::Dispatch(DispatchError::TypeMismatch { .. })))
        .count();
    assert_eq!(mismatches, 1);
}

#[test]
fn publishing_without_subscribers_serializes_nothing() {
    let (mut mesh, a, b) = connected_pair();
    let message = CountingMessage::new(1);

    assert!(!mesh.node_mut(a).publish("/pose", message.clone()));
    mesh.settle();
    assert_eq!(message.serializations(), 0);

    // a publisher elsewhere is not a subscriber
    mesh.node_mut(b)
        .register_publication("/pose", "CountingMessage")
        .unwrap();
    mesh.settle();
    assert!(!mesh.node_mut(a).publish("/pose", message.with_value(2)));
    mesh.settle();

    assert_eq!(message.serializations(), 0);
    assert!(mesh.log(b).messages.is_empty());
}

#[test]
fn message_is_serialized_once_for_all_subscribers() {
    let mut mesh = TestMesh::new();
    let publisher = mesh.add_node();
    let subscribers = [mesh.add_node(), mesh.add_node()];
    let bystander = mesh.add_node();

    for subscriber in subscribers {
        mesh.node_mut(subscriber)
            .register_subscription("/pose", "CountingMessage")
            .unwrap();
    }
    mesh.connect_all();
    mesh.settle();

    let message = CountingMessage::new(0);
    assert!(mesh.node_mut(publisher).publish("/pose", message.with_value(42)));
    mesh.settle();

    assert_eq!(message.serializations(), 1);
    let publisher_id = mesh.node_id(publisher);
    for subscriber in subscribers {
        let received: Vec<u32> = mesh
            .log(subscriber)
            .messages_on::<CountingMessage>("/pose")
            .iter()
            .map(|message| message.value)
            .collect();
        assert_eq!(received, vec![42]);
        assert_eq!(mesh.log(subscriber).messages[0].sender(), publisher_id);
    }
    assert!(mesh.log(bystander).messages.is_empty());
}

#[test]
fn messages_keep_their_order() {
    let (mut mesh, a, b) = connected_pair();
    mesh.node_mut(b)
        .register_subscription("/counter", "u32")
        .unwrap();
    mesh.settle();

    for value in 0..10u32 {
        assert!(mesh.node_mut(a).publish("/counter", value));
    }
    mesh.settle();

    assert_eq!(
        mesh.log(b).messages_on::<u32>("/counter"),
        (0..10).collect::<Vec<u32>>()
    );
}

#[test]
fn unsubscribed_topic_is_no_longer_delivered() {
    let (mut mesh, a, b) = connected_pair();
    mesh.node_mut(b)
        .register_subscription("/counter", "u32")
        .unwrap();
    mesh.settle();

    assert!(mesh.node_mut(b).unregister_subscription("/counter"));
    // `a` has not heard about it, so it still sends
    assert!(mesh.node_mut(a).publish("/counter", 1u32));
    mesh.settle();

    assert!(mesh.log(b).messages.is_empty());
}

#[test]
fn departed_peer_is_pruned_from_interest() {
    let (mut mesh, a, b) = connected_pair();
    mesh.node_mut(b)
        .register_subscription("/pose", "Pose")
        .unwrap();
    mesh.node_mut(b)
        .register_publication("/odom", "Odometry")
        .unwrap();
    mesh.settle();
    assert_eq!(mesh.node(a).remote_subscriber_count("/pose"), 1);
    mesh.log_mut(a).clear();

    mesh.remove_node(b);
    mesh.settle();

    assert_eq!(mesh.node(a).remote_subscriber_count("/pose"), 0);
    assert_eq!(mesh.node(a).remote_publisher_count("/odom"), 0);
    let counts: Vec<(String, usize)> = mesh
        .log(a)
        .interests
        .iter()
        .map(|event| (event.topic.clone(), event.count))
        .collect();
    assert_eq!(
        counts,
        vec![("/pose".to_string(), 0), ("/odom".to_string(), 0)]
    );
    assert!(!mesh.node_mut(a).publish("/pose", 1u32));
}

#[test]
fn handle_publishes_from_another_thread() {
    let (mut mesh, a, b) = connected_pair();
    mesh.node_mut(b)
        .register_subscription("/counter", "u32")
        .unwrap();
    mesh.settle();

    let handle = mesh.node(a).handle();
    let worker = thread::spawn(move || {
        for value in 0..3u32 {
            handle.publish("/counter", value).unwrap();
        }
    });
    worker.join().unwrap();
    mesh.settle();

    assert_eq!(mesh.log(b).messages_on::<u32>("/counter"), vec![0, 1, 2]);
}

#[test]
fn handle_reports_a_dropped_node() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let handle = mesh.node(a).handle();
    assert!(!handle.is_closed());

    mesh.remove_node(a);

    assert!(handle.is_closed());
    assert_eq!(handle.publish("/counter", 1u32), Err(NodeClosedError));
}

#[test]
fn restarted_peer_keeps_the_interest_it_announces() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let old_b = mesh.add_node();
    mesh.node_mut(old_b)
        .register_subscription("/map", "Map")
        .unwrap();
    mesh.connect(a, old_b);
    mesh.settle();
    assert_eq!(mesh.node(a).remote_subscriber_count("/map"), 1);

    let b_id = mesh.node_id(old_b);
    mesh.freeze(old_b);

    // the new process announces its interest as soon as it reaches a,
    // in the same batch as its discovery reply
    let new_b = mesh.add_node_with_id(Some(b_id));
    mesh.node_mut(new_b)
        .register_subscription("/pose", "Pose")
        .unwrap();
    mesh.connect(new_b, a);
    mesh.settle();

    assert_eq!(mesh.log(a).peer_left_count(&b_id), 1);
    assert_eq!(mesh.node(a).remote_subscriber_count("/pose"), 1);
    assert_eq!(mesh.node(a).remote_subscriber_count("/map"), 0);

    assert!(mesh.node_mut(a).publish("/pose", 7u32));
    mesh.settle();
    assert_eq!(mesh.log(new_b).messages_on::<u32>("/pose"), vec![7]);
}
