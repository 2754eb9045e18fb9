//! Patch Graph
//!
//! [`Graph`] owns the node registry and every connection between nodes. It is
//! the only way to create or destroy either, so it can keep three pieces of
//! state consistent across every mutation:
//!
//! - The registry is dense. For every live node `n`, `nodes[n.index()]` is
//!   `n`. Removing the node at position `i` shifts every later node down by
//!   one and decrements its index.
//! - The slot table maps a [`NodeHandle`] to the node's current index. A
//!   removal bumps the slot's generation, so stale handles are rejected
//!   instead of silently addressing whichever node reuses the slot.
//! - Each connection is stored in both of its endpoints' adjacency lists.
//!   Adding or removing it updates both copies within the same call.
//!
//! # Change Tracking
//!
//! Two flags are kept. The public dirty flag ([`Graph::has_changed`]) is set
//! whenever the dependency structure changes and stays set until the engine
//! calls [`Graph::ack_change`]. Separately, the sort cache is marked stale by
//! any change to the node or edge set and is refreshed by the next call to
//! [`Graph::sorted`](Graph::sorted).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::node::{Connection, GraphId, Node, NodeHandle};
use super::sort::GroupSpan;
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};

/// Slot table entry. `index` is `None` while the slot is free.
#[derive(Debug, Clone, Copy)]
pub(super) struct Slot {
    generation: u32,
    index: Option<usize>,
}

/// A mutable patch graph with a memoized execution schedule.
#[derive(Debug)]
pub struct Graph<T> {
    /// Identity of this instance, carried by every handle it issues.
    pub(super) id: GraphId,

    /// Dense node registry.
    pub(super) nodes: Vec<Node<T>>,

    pub(super) slots: Vec<Slot>,

    /// Slots available for reuse by `new_node`.
    free_slots: Vec<u32>,

    edge_count: usize,

    /// Last topological order, as dense indices.
    pub(super) order: Vec<usize>,

    /// Depth-first search frames: (node index, next adjacency position).
    pub(super) stack: Vec<(usize, usize)>,

    /// Members of every group of the last partition, group after group.
    pub(super) members: Vec<NodeHandle>,

    /// Bounds and kind of each group within `members`.
    pub(super) groups: Vec<GroupSpan>,

    /// Public dirty flag. Cleared only by `ack_change`.
    changed: bool,

    /// The cached partition no longer reflects the node and edge sets.
    pub(super) stale: bool,

    pub(super) sort_passes: u64,

    pub(super) config: GraphConfig,
}

impl<T> Graph<T> {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph, reserving room as the config asks.
    pub fn with_config(config: GraphConfig) -> Self {
        let capacity = config.node_capacity;
        Self {
            id: GraphId::new(),
            nodes: Vec::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free_slots: Vec::new(),
            edge_count: 0,
            order: Vec::with_capacity(capacity),
            stack: Vec::with_capacity(capacity),
            members: Vec::with_capacity(capacity),
            groups: Vec::with_capacity(capacity),
            changed: false,
            stale: false,
            sort_passes: 0,
            config,
        }
    }

    /// Get the configuration this graph was built with.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Map a handle to its dense index, if it names a live node of this graph.
    pub(super) fn resolve(&self, handle: NodeHandle) -> Option<usize> {
        if handle.graph() != self.id {
            return None;
        }
        let slot = self.slots.get(handle.slot())?;
        if slot.generation != handle.generation() {
            return None;
        }
        let index = slot.index?;
        match self.nodes.get(index) {
            Some(node) if node.handle() == handle => Some(index),
            _ => None,
        }
    }

    fn require(&self, handle: NodeHandle) -> Result<usize> {
        self.resolve(handle).ok_or(GraphError::NotInGraph(handle))
    }

    fn touch(&mut self) {
        self.changed = true;
        self.stale = true;
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Add a node holding `payload` at the end of the registry.
    pub fn new_node(&mut self, payload: T) -> NodeHandle {
        let index = self.nodes.len();
        let handle = match self.free_slots.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.index = Some(index);
                NodeHandle::new(self.id, slot, entry.generation)
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    index: Some(index),
                });
                NodeHandle::new(self.id, slot, 0)
            }
        };

        self.nodes.push(Node::new(handle, index, payload));
        self.stale = true;
        debug!(node = %handle, index, "added node");
        handle
    }

    /// Remove a node and every connection touching it, returning its payload.
    ///
    /// Later nodes shift down by one index. The dirty flag is set unless the
    /// node was both unconnected and last in the registry.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<T> {
        let index = self.require(handle)?;

        let outputs: SmallVec<[Connection; 8]> =
            self.nodes[index].outputs().iter().copied().collect();
        let inputs: SmallVec<[Connection; 8]> =
            self.nodes[index].inputs().iter().copied().collect();

        let mut changed = false;
        for connection in &outputs {
            if connection.end() == handle {
                continue;
            }
            if let Some(target) = self.resolve(connection.end()) {
                changed |= self.nodes[target].remove_in_connection(handle)?;
            }
        }
        for connection in &inputs {
            if connection.start() == handle {
                continue;
            }
            if let Some(source) = self.resolve(connection.start()) {
                changed |= self.nodes[source].remove_out_connection(handle)?;
            }
        }

        // A self-connection sits in both lists but counts as one edge.
        let self_edges = outputs.iter().filter(|c| c.end() == handle).count();
        let incident = outputs.len() + inputs.len() - self_edges;
        self.edge_count -= incident;
        changed |= incident > 0;

        let shifted = index + 1 < self.nodes.len();
        for node in &mut self.nodes[index + 1..] {
            let new_index = node.index() - 1;
            node.set_index(new_index);
            self.slots[node.handle().slot()].index = Some(new_index);
        }
        let node = self.nodes.remove(index);

        let slot = &mut self.slots[handle.slot()];
        slot.index = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(handle.slot() as u32);

        if changed || shifted {
            self.changed = true;
        }
        self.stale = true;

        debug!(node = %handle, index, edges = incident, "removed node");
        Ok(node.into_payload())
    }

    /// Connect `from` to `to`.
    ///
    /// Connecting an already connected pair succeeds and changes nothing.
    pub fn new_connection(&mut self, from: NodeHandle, to: NodeHandle) -> Result<()> {
        let start = self.require(from)?;
        let end = self.require(to)?;

        if self.nodes[start].has_output_to(to) {
            trace!(from = %from, to = %to, "connection already present");
            return Ok(());
        }

        let connection = Connection::new(from, to);
        self.nodes[start].push_output(connection);
        self.nodes[end].push_input(connection);
        self.edge_count += 1;
        self.touch();

        debug!(from = %from, to = %to, "added connection");
        Ok(())
    }

    /// Disconnect `from` from `to`.
    ///
    /// Removing a connection that does not exist is not an error and leaves
    /// the dirty flag alone. Both endpoints must still be live.
    pub fn remove_connection(&mut self, from: NodeHandle, to: NodeHandle) -> Result<()> {
        let start = self.require(from)?;
        let end = self.require(to)?;

        let removed_out = self.nodes[start].remove_out_connection(to)?;
        let removed_in = self.nodes[end].remove_in_connection(from)?;

        if removed_out || removed_in {
            self.edge_count -= 1;
            self.touch();
            debug!(from = %from, to = %to, "removed connection");
        } else {
            trace!(from = %from, to = %to, "no connection to remove");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Whether `handle` names a live node of this graph.
    pub fn exists(&self, handle: NodeHandle) -> bool {
        self.resolve(handle).is_some()
    }

    /// Get a node by handle.
    pub fn node(&self, handle: NodeHandle) -> Option<&Node<T>> {
        self.resolve(handle).map(|index| &self.nodes[index])
    }

    /// Get a node by handle, mutably. Only the payload can be changed
    /// through it.
    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node<T>> {
        let index = self.resolve(handle)?;
        Some(&mut self.nodes[index])
    }

    /// Get the payload of a node.
    pub fn payload(&self, handle: NodeHandle) -> Option<&T> {
        self.node(handle).map(Node::payload)
    }

    /// Get the payload of a node, mutably.
    pub fn payload_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        self.node_mut(handle).map(Node::payload_mut)
    }

    /// Current dense index of a node.
    pub fn index_of(&self, handle: NodeHandle) -> Option<usize> {
        self.resolve(handle)
    }

    /// Handle of the node at a dense index.
    pub fn handle_at(&self, index: usize) -> Option<NodeHandle> {
        self.nodes.get(index).map(Node::handle)
    }

    /// Handles of all nodes, in index order.
    pub fn handles(&self) -> impl ExactSizeIterator<Item = NodeHandle> + '_ {
        self.nodes.iter().map(Node::handle)
    }

    /// Number of inputs of a node. Zero for a stale handle.
    pub fn in_degree(&self, handle: NodeHandle) -> usize {
        self.node(handle).map_or(0, Node::in_degree)
    }

    /// Number of outputs of a node. Zero for a stale handle.
    pub fn out_degree(&self, handle: NodeHandle) -> usize {
        self.node(handle).map_or(0, Node::out_degree)
    }

    /// Number of connections touching a node. Zero for a stale handle.
    pub fn degree(&self, handle: NodeHandle) -> usize {
        self.node(handle).map_or(0, Node::degree)
    }

    /// Whether `from` is connected to `to`.
    pub fn contains_connection(&self, from: NodeHandle, to: NodeHandle) -> bool {
        self.node(from).is_some_and(|node| node.has_output_to(to))
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of distinct connections.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the dependency structure changed since the last `ack_change`.
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// Acknowledge the current structure, clearing the dirty flag.
    pub fn ack_change(&mut self) {
        self.changed = false;
    }

    /// Number of sort passes actually run. Cached calls to `sorted` do not
    /// count.
    pub fn sort_passes(&self) -> u64 {
        self.sort_passes
    }

    /// Capture the current structure by dense index, for inspection.
    pub fn snapshot(&self) -> GraphSnapshot {
        let edges = self
            .nodes
            .iter()
            .flat_map(|node| {
                node.outputs()
                    .iter()
                    .filter_map(move |c| Some((node.index(), self.resolve(c.end())?)))
            })
            .collect();

        GraphSnapshot {
            node_count: self.nodes.len(),
            edges,
            changed: self.changed,
        }
    }
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Structure of a graph at one point in time, keyed by dense index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub node_count: usize,
    /// `(from, to)` pairs, grouped by source node in index order.
    pub edges: Vec<(usize, usize)>,
    /// Value of the dirty flag when the snapshot was taken.
    pub changed: bool,
}
