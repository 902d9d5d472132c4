/// Integration tests for replicated containers

use std::thread;

use peerlink_node::{ContainerError, NodeError};
use peerlink_shared::UpdateKind;
use peerlink_test::TestMesh;

const POSES: &str = "poses";

fn add_poses(mesh: &mut TestMesh, index: usize) {
    mesh.node_mut(index)
        .add_container::<String, String>(POSES)
        .unwrap();
}

fn write(mesh: &mut TestMesh, index: usize, key: &str, value: &str) -> u32 {
    mesh.node_mut(index)
        .insert_or_update(POSES, key.to_string(), value.to_string())
        .unwrap()
}

fn contents(mesh: &TestMesh, index: usize) -> Vec<(String, String)> {
    mesh.node(index)
        .container::<String, String>(POSES)
        .unwrap()
        .entries()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn value(mesh: &TestMesh, index: usize, key: &str) -> Option<String> {
    mesh.node(index)
        .container::<String, String>(POSES)
        .unwrap()
        .get(&key.to_string())
        .cloned()
}

#[test]
fn write_reaches_connected_peer() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    add_poses(&mut mesh, a);
    add_poses(&mut mesh, b);
    mesh.connect(a, b);
    mesh.settle();

    assert_eq!(write(&mut mesh, a, "k1", "v1"), 1);
    mesh.settle();

    let a_id = mesh.node_id(a);
    let set_b = mesh.node(b).container::<String, String>(POSES).unwrap();
    let entry = set_b.entry(&"k1".to_string()).unwrap();
    assert_eq!(entry.value, "v1");
    assert_eq!(entry.origin, a_id);
    assert_eq!(entry.version, 1);
    assert_eq!(set_b.state_index(), 1);

    let connection = set_b.connection(&a_id).unwrap();
    assert_eq!(connection.last_received_index(), 1);
    assert_eq!(
        connection.mirror().get("k1").map(|entry| entry.value.as_str()),
        Some("v1")
    );

    let set_a = mesh.node(a).container::<String, String>(POSES).unwrap();
    let b_id = mesh.node_id(b);
    assert_eq!(set_a.connection(&b_id).unwrap().last_sent_index(), 1);
    assert_eq!(set_a.connected_peers(), vec![b_id]);
}

#[test]
fn full_mesh_converges() {
    let mut mesh = TestMesh::new();
    let nodes: Vec<usize> = (0..3).map(|_| mesh.add_node()).collect();
    for index in &nodes {
        add_poses(&mut mesh, *index);
    }
    mesh.connect_all();
    mesh.settle();

    for index in &nodes {
        write(&mut mesh, *index, &format!("own-{}", index), "x");
        write(&mut mesh, *index, "shared", &format!("from-{}", index));
    }
    mesh.settle();

    let expected = contents(&mesh, nodes[0]);
    assert_eq!(expected.len(), 4);
    for index in &nodes[1..] {
        assert_eq!(contents(&mesh, *index), expected);
    }
    for index in &nodes {
        assert!(mesh.log(*index).errors.is_empty());
    }
}

#[test]
fn own_writes_never_come_back() {
    let mut mesh = TestMesh::new();
    let nodes: Vec<usize> = (0..3).map(|_| mesh.add_node()).collect();
    for index in &nodes {
        add_poses(&mut mesh, *index);
    }
    mesh.connect_all();
    mesh.settle();

    let writer = nodes[0];
    write(&mut mesh, writer, "k1", "v1");
    mesh.settle();

    let accepted: usize = mesh
        .log(writer)
        .partial_updates(POSES)
        .iter()
        .map(|update| update.accepted)
        .sum();
    assert_eq!(accepted, 0);
    assert_eq!(
        mesh.node(writer)
            .container::<String, String>(POSES)
            .unwrap()
            .state_index(),
        1
    );
    for index in &nodes[1..] {
        assert_eq!(value(&mesh, *index, "k1"), Some("v1".to_string()));
    }
}

#[test]
fn writes_are_forwarded_along_a_chain() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    let c = mesh.add_node();
    for index in [a, b, c] {
        add_poses(&mut mesh, index);
    }
    mesh.connect(a, b);
    mesh.connect(b, c);
    mesh.settle();

    write(&mut mesh, a, "k1", "from-a");
    write(&mut mesh, c, "k2", "from-c");
    mesh.settle();

    let a_id = mesh.node_id(a);
    for index in [a, b, c] {
        assert_eq!(value(&mesh, index, "k1"), Some("from-a".to_string()));
        assert_eq!(value(&mesh, index, "k2"), Some("from-c".to_string()));
    }
    let entry_at_c = mesh
        .node(c)
        .container::<String, String>(POSES)
        .unwrap()
        .entry(&"k1".to_string())
        .cloned()
        .unwrap();
    assert_eq!(entry_at_c.origin, a_id);
}

#[test]
fn late_joiner_receives_a_snapshot() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    add_poses(&mut mesh, a);
    for index in 0..10 {
        write(&mut mesh, a, &format!("k{}", index), &format!("v{}", index));
    }
    mesh.settle();

    let late = mesh.add_node();
    add_poses(&mut mesh, late);
    mesh.connect(late, a);
    mesh.settle();

    assert_eq!(contents(&mesh, late), contents(&mesh, a));
    let set = mesh.node(late).container::<String, String>(POSES).unwrap();
    assert_eq!(set.len(), 10);
    assert_eq!(set.state_index(), 10);

    let a_id = mesh.node_id(a);
    let snapshots: Vec<_> = mesh
        .log(late)
        .container_updates
        .iter()
        .filter(|update| update.kind == UpdateKind::Full && update.from == a_id)
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].entries, 10);
    assert_eq!(snapshots[0].accepted, 10);
}

#[test]
fn later_write_wins_everywhere() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    add_poses(&mut mesh, a);
    add_poses(&mut mesh, b);
    mesh.connect(a, b);
    mesh.settle();

    write(&mut mesh, a, "k1", "first");
    mesh.settle();
    write(&mut mesh, b, "k1", "second");
    mesh.settle();

    let b_id = mesh.node_id(b);
    for index in [a, b] {
        let set = mesh.node(index).container::<String, String>(POSES).unwrap();
        let entry = set.entry(&"k1".to_string()).unwrap();
        assert_eq!(entry.value, "second");
        assert_eq!(entry.version, 2);
        assert_eq!(entry.origin, b_id);
    }
}

#[test]
fn concurrent_writes_settle_on_one_value() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    add_poses(&mut mesh, a);
    add_poses(&mut mesh, b);
    mesh.connect(a, b);
    mesh.settle();

    // both write before either hears from the other
    write(&mut mesh, a, "k1", "from-a");
    write(&mut mesh, b, "k1", "from-b");
    mesh.settle();

    let winner = if mesh.node_id(a) > mesh.node_id(b) {
        "from-a"
    } else {
        "from-b"
    };
    assert_eq!(value(&mesh, a, "k1"), Some(winner.to_string()));
    assert_eq!(value(&mesh, b, "k1"), Some(winner.to_string()));
}

#[test]
fn restarted_node_recovers_its_entries_from_peers() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    add_poses(&mut mesh, a);
    add_poses(&mut mesh, b);
    mesh.connect(a, b);
    mesh.settle();

    let b_id = mesh.node_id(b);
    write(&mut mesh, b, "k1", "before-restart");
    mesh.settle();
    mesh.remove_node(b);
    mesh.settle();

    let a_set = mesh.node(a).container::<String, String>(POSES).unwrap();
    assert!(a_set.connected_peers().is_empty());

    let restarted = mesh.add_node_with_id(Some(b_id));
    add_poses(&mut mesh, restarted);
    mesh.connect(restarted, a);
    mesh.settle();

    assert_eq!(
        value(&mesh, restarted, "k1"),
        Some("before-restart".to_string())
    );

    // the next local write supersedes the recovered one
    write(&mut mesh, restarted, "k1", "after-restart");
    mesh.settle();
    assert_eq!(value(&mesh, a, "k1"), Some("after-restart".to_string()));
    let entry = mesh
        .node(a)
        .container::<String, String>(POSES)
        .unwrap()
        .entry(&"k1".to_string())
        .cloned()
        .unwrap();
    assert_eq!(entry.version, 2);
}

#[test]
fn container_added_after_connecting_still_syncs() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    add_poses(&mut mesh, a);
    write(&mut mesh, a, "k1", "v1");
    mesh.connect(a, b);
    mesh.settle();
    mesh.log_mut(b).clear();

    // `b` has no such container yet, so `a`'s connect attempt was refused
    add_poses(&mut mesh, b);
    mesh.settle();

    assert_eq!(value(&mesh, b, "k1"), Some("v1".to_string()));
}

#[test]
fn unknown_container_is_reported() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    add_poses(&mut mesh, a);
    mesh.connect(a, b);
    mesh.settle();

    assert!(mesh.log(b).errors.iter().any(|error| matches!(
        error,
        NodeError::Container(ContainerError::UnknownContainer { name }) if name == POSES
    )));
    // the link survives a bad packet
    assert_eq!(mesh.node(b).established_peers(), vec![mesh.node_id(a)]);
}

#[test]
fn container_api_errors_are_returned() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    add_poses(&mut mesh, a);

    assert!(matches!(
        mesh.node_mut(a).add_container::<String, String>(POSES),
        Err(ContainerError::DuplicateContainer { .. })
    ));
    assert!(matches!(
        mesh.node(a).container::<String, u32>(POSES),
        Err(ContainerError::ContainerTypeMismatch { .. })
    ));
    assert!(matches!(
        mesh.node_mut(a)
            .insert_or_update("missing", "k".to_string(), "v".to_string()),
        Err(ContainerError::UnknownContainer { .. })
    ));

    let stranger = peerlink_shared::Id::generate();
    let set = mesh.node(a).container::<String, String>(POSES).unwrap();
    assert!(matches!(
        set.connection(&stranger),
        Err(ContainerError::ConnectionNotFound { .. })
    ));
    assert_eq!(mesh.node(a).container_names(), vec![POSES.to_string()]);
}

#[test]
fn handle_writes_from_another_thread() {
    let mut mesh = TestMesh::new();
    let a = mesh.add_node();
    let b = mesh.add_node();
    add_poses(&mut mesh, a);
    add_poses(&mut mesh, b);
    mesh.connect(a, b);
    mesh.settle();

    let handle = mesh.node(a).handle();
    let worker = thread::spawn(move || {
        handle
            .insert_or_update(POSES, "k1".to_string(), "v1".to_string())
            .unwrap();
        // wrong value type, reported as an error event on the node
        handle
            .insert_or_update(POSES, "k2".to_string(), 5u32)
            .unwrap();
    });
    worker.join().unwrap();
    mesh.settle();

    assert_eq!(value(&mesh, a, "k1"), Some("v1".to_string()));
    assert_eq!(value(&mesh, b, "k1"), Some("v1".to_string()));
    assert!(mesh.log(a).errors.iter().any(|error| matches!(
        error,
        NodeError::Container(ContainerError::ContainerTypeMismatch { .. })
    )));
}
