//! Graph Nodes
//!
//! This module defines the elements of the patch graph: nodes, the handles
//! that address them, and the directed connections between them.
//!
//! A connection is a plain value. It is stored twice, once in the output list
//! of its start node and once in the input list of its end node, so neighbor
//! enumeration is cheap in either direction. Only the graph creates or drops
//! connections, and it always updates both copies in the same call.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use smallvec::SmallVec;

use crate::error::{GraphError, Result};

/// Identifier of one graph instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GraphId(u32);

impl GraphId {
    /// Generate a new unique graph ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a node in a [`Graph`](super::Graph).
///
/// A handle keeps addressing the same node while the node is alive, even
/// when removals elsewhere shift the node's dense index. Once the node is
/// removed the handle is stale: its slot generation no longer matches, so a
/// node created later in the same slot is never mistaken for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    graph: GraphId,
    slot: u32,
    generation: u32,
}

impl NodeHandle {
    pub(crate) fn new(graph: GraphId, slot: u32, generation: u32) -> Self {
        Self {
            graph,
            slot,
            generation,
        }
    }

    pub(crate) fn graph(&self) -> GraphId {
        self.graph
    }

    /// Position in the graph's slot table.
    pub(crate) fn slot(&self) -> usize {
        self.slot as usize
    }

    /// Generation of the slot when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

/// A directed connection from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    start: NodeHandle,
    end: NodeHandle,
}

impl Connection {
    pub(crate) fn new(start: NodeHandle, end: NodeHandle) -> Self {
        Self { start, end }
    }

    /// The node the signal leaves.
    pub fn start(&self) -> NodeHandle {
        self.start
    }

    /// The node the signal enters.
    pub fn end(&self) -> NodeHandle {
        self.end
    }
}

/// Visit marker used by the sort passes.
///
/// Reset to `Unseen` at the start of every pass; the value left over between
/// passes carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Unseen,
    Seen,
}

/// Adjacency list of one node side. Most patch nodes have a handful of
/// connections, so these rarely spill to the heap.
pub(crate) type Adjacency = SmallVec<[Connection; 4]>;

/// A schedulable unit in the patch graph.
///
/// The payload belongs to the caller (typically it identifies the DSP unit
/// behind the node). The graph stores it and hands it back, nothing more.
#[derive(Debug)]
pub struct Node<T> {
    /// Stable handle for this node.
    handle: NodeHandle,

    /// Dense position in the graph's registry. Decremented whenever a node
    /// before it is removed.
    index: usize,

    payload: T,

    search_state: SearchState,

    /// Connections whose start is this node.
    outputs: Adjacency,

    /// Connections whose end is this node.
    inputs: Adjacency,
}

impl<T> Node<T> {
    pub(crate) fn new(handle: NodeHandle, index: usize, payload: T) -> Self {
        Self {
            handle,
            index,
            payload,
            search_state: SearchState::Unseen,
            outputs: Adjacency::new(),
            inputs: Adjacency::new(),
        }
    }

    /// Get the node's handle.
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    /// Get the node's current dense index.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Get the caller's payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Get the caller's payload mutably.
    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    pub(crate) fn into_payload(self) -> T {
        self.payload
    }

    /// Get the visit marker left by the last sort pass.
    pub fn search_state(&self) -> SearchState {
        self.search_state
    }

    pub(crate) fn set_search_state(&mut self, state: SearchState) {
        self.search_state = state;
    }

    /// Connections leaving this node.
    pub fn outputs(&self) -> &[Connection] {
        &self.outputs
    }

    /// Connections entering this node.
    pub fn inputs(&self) -> &[Connection] {
        &self.inputs
    }

    /// All connected nodes: input sources first, then output targets.
    ///
    /// A node connected on both sides appears twice.
    pub fn neighbors(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.in_neighbors().chain(self.out_neighbors())
    }

    /// Nodes feeding this node.
    pub fn in_neighbors(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.inputs.iter().map(Connection::start)
    }

    /// Nodes fed by this node.
    pub fn out_neighbors(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.outputs.iter().map(Connection::end)
    }

    /// Get the number of inputs.
    pub fn in_degree(&self) -> usize {
        self.inputs.len()
    }

    /// Get the number of outputs.
    pub fn out_degree(&self) -> usize {
        self.outputs.len()
    }

    /// Get the number of connections touching this node.
    pub fn degree(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// Whether this node feeds itself directly.
    pub fn has_self_connection(&self) -> bool {
        self.has_output_to(self.handle)
    }

    pub(crate) fn has_output_to(&self, target: NodeHandle) -> bool {
        self.outputs.iter().any(|c| c.end == target)
    }

    pub(crate) fn push_output(&mut self, connection: Connection) {
        self.outputs.push(connection);
    }

    pub(crate) fn push_input(&mut self, connection: Connection) {
        self.inputs.push(connection);
    }

    /// Drop the output connection to `target`, if there is one.
    ///
    /// Returns whether anything was removed. Order within the list is not
    /// preserved.
    pub(crate) fn remove_out_connection(&mut self, target: NodeHandle) -> Result<bool> {
        match self.outputs.iter().position(|c| c.end == target) {
            Some(position) => {
                detach(&mut self.outputs, position)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop the input connection from `source`, if there is one.
    pub(crate) fn remove_in_connection(&mut self, source: NodeHandle) -> Result<bool> {
        match self.inputs.iter().position(|c| c.start == source) {
            Some(position) => {
                detach(&mut self.inputs, position)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Swap the entry at `position` with the last one and truncate.
fn detach(list: &mut Adjacency, position: usize) -> Result<Connection> {
    let len = list.len();
    if position >= len {
        return Err(GraphError::AdjacencyOutOfRange { position, len });
    }
    Ok(list.swap_remove(position))
}
