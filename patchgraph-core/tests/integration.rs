//! Integration Tests for the Patch Scheduler
//!
//! These tests drive the graph the way the patch builder and the audio
//! engine do, and check the ordering and grouping guarantees the engine
//! relies on.

use std::collections::HashSet;
use std::thread;

use patchgraph_core::{Graph, GraphError, GroupKind, NodeHandle, SharedGraph};

fn position(order: &[NodeHandle], handle: NodeHandle) -> usize {
    order.iter().position(|&h| h == handle).unwrap()
}

/// Reversed registration order must not change the dependency order.
#[test]
fn reversed_chain_sorts_forward() {
    let mut graph = Graph::new();
    let handles: Vec<_> = (0..10).map(|i| graph.new_node(i)).collect();
    for pair in handles.windows(2) {
        graph.new_connection(pair[1], pair[0]).unwrap();
    }

    let order = graph.sorted().nodes().to_vec();
    let expected: Vec<_> = handles.iter().rev().copied().collect();
    assert_eq!(order, expected);
}

#[test]
fn chain_with_isolated_node() {
    let mut graph = Graph::new();
    let a = graph.new_node("a");
    let b = graph.new_node("b");
    let c = graph.new_node("c");
    let d = graph.new_node("d");
    graph.new_connection(a, b).unwrap();
    graph.new_connection(b, c).unwrap();

    let schedule = graph.sorted();
    assert_eq!(schedule.len(), 4);
    assert!(schedule.groups().all(|g| g.len() == 1));

    let order = schedule.nodes();
    assert!(order.contains(&d));
    assert!(position(order, a) < position(order, b));
    assert!(position(order, b) < position(order, c));
}

#[test]
fn three_cycle_with_isolated_node() {
    let mut graph = Graph::new();
    let a = graph.new_node("a");
    let b = graph.new_node("b");
    let c = graph.new_node("c");
    let d = graph.new_node("d");
    graph.new_connection(a, b).unwrap();
    graph.new_connection(b, c).unwrap();
    graph.new_connection(c, a).unwrap();

    let schedule = graph.sorted();
    assert_eq!(schedule.len(), 2);
    assert_eq!(schedule.group(0).unwrap().nodes(), &[d]);

    let cycle: HashSet<_> = schedule.group(1).unwrap().nodes().iter().copied().collect();
    assert_eq!(cycle, HashSet::from([a, b, c]));
    assert_eq!(schedule.group(1).unwrap().kind(), GroupKind::Feedback);
}

#[test]
fn breaking_two_cycle_yields_singletons() {
    let mut graph = Graph::new();
    let a = graph.new_node(());
    let b = graph.new_node(());
    graph.new_connection(a, b).unwrap();
    graph.new_connection(b, a).unwrap();
    assert_eq!(graph.sorted().len(), 1);

    graph.remove_connection(a, b).unwrap();
    graph.remove_connection(b, a).unwrap();

    let schedule = graph.sorted();
    assert_eq!(schedule.len(), 2);
    assert!(schedule.groups().all(|g| g.len() == 1 && !g.is_feedback()));
    assert_eq!(graph.degree(a), 0);
    assert_eq!(graph.degree(b), 0);
}

/// Removing a node leaves no connection pointing at it.
#[test]
fn remove_node_detaches_all_connections() {
    let mut graph = Graph::new();
    let hub = graph.new_node("hub");
    let others: Vec<_> = (0..5).map(|_| graph.new_node("leaf")).collect();
    for (i, &other) in others.iter().enumerate() {
        if i % 2 == 0 {
            graph.new_connection(hub, other).unwrap();
        } else {
            graph.new_connection(other, hub).unwrap();
        }
    }
    graph.new_connection(others[0], others[1]).unwrap();

    graph.remove_node(hub).unwrap();

    assert_eq!(graph.edge_count(), 1);
    for handle in graph.handles() {
        let node = graph.node(handle).unwrap();
        assert!(node.neighbors().all(|n| n != hub));
    }
    assert_eq!(graph.sorted().node_count(), 5);
}

#[test]
fn remove_node_shifts_indices_by_one() {
    let mut graph = Graph::new();
    let handles: Vec<_> = (0..6).map(|i| graph.new_node(i)).collect();
    graph.new_connection(handles[4], handles[5]).unwrap();

    graph.remove_node(handles[2]).unwrap();

    assert!(!graph.exists(handles[2]));
    for (i, &handle) in handles.iter().enumerate() {
        match i {
            0 | 1 => assert_eq!(graph.index_of(handle), Some(i)),
            2 => assert_eq!(graph.index_of(handle), None),
            _ => assert_eq!(graph.index_of(handle), Some(i - 1)),
        }
    }
    for (index, handle) in graph.handles().enumerate() {
        assert_eq!(graph.node(handle).unwrap().index(), index);
    }
    assert!(graph.contains_connection(handles[4], handles[5]));
}

#[test]
fn duplicate_connection_is_idempotent() {
    let mut graph = Graph::new();
    let a = graph.new_node(());
    let b = graph.new_node(());

    graph.new_connection(a, b).unwrap();
    assert!(graph.has_changed());
    graph.ack_change();

    graph.new_connection(a, b).unwrap();
    assert!(!graph.has_changed());
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.out_degree(a), 1);
}

/// Full lifecycle of the dirty flag as the engine sees it.
#[test]
fn dirty_flag_lifecycle() {
    let mut graph = Graph::new();
    assert!(!graph.has_changed());

    let a = graph.new_node(());
    let b = graph.new_node(());
    graph.new_connection(a, b).unwrap();
    assert!(graph.has_changed());

    let first = graph.sorted().nodes().to_vec();
    graph.ack_change();
    assert!(!graph.has_changed());

    let second = graph.sorted().nodes().to_vec();
    assert_eq!(first, second);
    assert_eq!(graph.sort_passes(), 1);

    graph.remove_connection(a, b).unwrap();
    assert!(graph.has_changed());
    graph.ack_change();

    graph.remove_node(a).unwrap();
    assert!(graph.has_changed());
}

#[test]
fn stale_handles_fail_with_not_in_graph() {
    let mut graph = Graph::new();
    let a = graph.new_node(());
    let b = graph.new_node(());
    graph.new_connection(a, b).unwrap();
    graph.remove_node(a).unwrap();
    graph.ack_change();
    let before = graph.snapshot();

    assert_eq!(graph.remove_node(a), Err(GraphError::NotInGraph(a)));
    assert_eq!(graph.new_connection(a, b), Err(GraphError::NotInGraph(a)));
    assert_eq!(graph.new_connection(b, a), Err(GraphError::NotInGraph(a)));
    assert_eq!(graph.remove_connection(a, b), Err(GraphError::NotInGraph(a)));
    assert_eq!(graph.remove_connection(b, a), Err(GraphError::NotInGraph(a)));

    // Failed calls leave the graph untouched.
    assert_eq!(graph.snapshot(), before);
    assert!(!graph.has_changed());
}

#[test]
fn handle_of_reused_slot_is_rejected() {
    let mut graph = Graph::new();
    let a = graph.new_node("a");
    graph.remove_node(a).unwrap();
    let b = graph.new_node("b");

    assert!(!graph.exists(a));
    assert_eq!(graph.payload(b), Some(&"b"));
    assert_eq!(graph.new_connection(a, b), Err(GraphError::NotInGraph(a)));
    assert_eq!(graph.index_of(b), Some(0));
}

#[test]
fn error_messages_name_the_handle() {
    let mut graph: Graph<()> = Graph::new();
    let a = graph.new_node(());
    graph.remove_node(a).unwrap();

    let err = graph.remove_node(a).unwrap_err();
    assert_eq!(err.to_string(), format!("node {a} is not in this graph"));
}

/// An edit thread and an "audio" thread share one graph through the lock.
#[test]
fn shared_graph_serializes_editors_and_reader() {
    let shared: SharedGraph<usize> = SharedGraph::new();

    let editor = {
        let shared = shared.clone();
        thread::spawn(move || {
            let mut previous = None;
            for i in 0..200 {
                shared.edit(|graph| {
                    let node = graph.new_node(i);
                    if let Some(prev) = previous {
                        graph.new_connection(prev, node).unwrap();
                    }
                    previous = Some(node);
                });
            }
        })
    };

    let reader = {
        let shared = shared.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                if let Some(mut graph) = shared.try_lock() {
                    if graph.has_changed() {
                        let schedule = graph.sorted();
                        assert!(schedule.groups().all(|g| !g.is_feedback()));
                        graph.ack_change();
                    }
                }
                thread::yield_now();
            }
        })
    };

    editor.join().unwrap();
    reader.join().unwrap();

    let mut graph = shared.lock();
    assert_eq!(graph.node_count(), 200);
    assert_eq!(graph.edge_count(), 199);
    let order = graph.sorted().nodes().to_vec();
    for pair in order.windows(2) {
        assert!(graph.payload(pair[0]).unwrap() < graph.payload(pair[1]).unwrap());
    }
}
