//! Execution Order
//!
//! Turns the patch graph into a sequence of groups the engine can run in
//! order. Each group is one strongly-connected component: a lone node that
//! only feeds forward, or a whole feedback loop that must be processed one
//! sample at a time.
//!
//! # Algorithm
//!
//! Two depth-first passes, Kosaraju style:
//!
//! 1. Search along output connections from every unvisited node in registry
//!    order, emitting nodes in post-order, then reverse the list. For every
//!    connection outside a cycle the source now precedes the target.
//! 2. Walk that order and search along input connections from every node
//!    not yet visited. Everything reached belongs to the root's component,
//!    and is emitted as one group.
//!
//! Because pass 2 takes its roots in forward topological order, each
//! component is found whole and exactly once, and a group never appears
//! before a group that feeds it.
//!
//! Nodes are marked as they are entered, so a node reached again through a
//! cycle is never re-entered. Both passes use an explicit frame stack, so
//! patch size is not limited by the thread's call stack.
//!
//! # Memoization
//!
//! The result lives in scratch buffers owned by the graph. They are cleared,
//! not reallocated, for each pass, and a call to [`Graph::sorted`] with no
//! structural change since the last one returns them untouched.

use tracing::{debug, trace};

use super::node::{Connection, Node, NodeHandle, SearchState};
use super::scheduler::Graph;

/// How the engine must run a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// A single node with no path back to itself. Safe for block processing.
    Chain,
    /// A feedback loop: several mutually reachable nodes, or one node wired
    /// to itself. Needs single-sample processing.
    Feedback,
}

/// Location of one group inside the flat member buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupSpan {
    start: usize,
    end: usize,
    kind: GroupKind,
}

impl GroupSpan {
    fn view<'a>(&self, members: &'a [NodeHandle]) -> Group<'a> {
        Group {
            nodes: &members[self.start..self.end],
            kind: self.kind,
        }
    }
}

/// Which adjacency list a search follows.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Downstream,
    Upstream,
}

impl Direction {
    fn neighbor<T>(self, node: &Node<T>, position: usize) -> Option<NodeHandle> {
        match self {
            Direction::Downstream => node.outputs().get(position).map(Connection::end),
            Direction::Upstream => node.inputs().get(position).map(Connection::start),
        }
    }
}

impl<T> Graph<T> {
    /// Get the execution schedule, recomputing it only if the node or edge
    /// set changed since the last call.
    ///
    /// This does not touch the dirty flag; call
    /// [`ack_change`](Graph::ack_change) once the schedule has been consumed.
    pub fn sorted(&mut self) -> Schedule<'_> {
        self.refresh();
        Schedule {
            members: &self.members,
            groups: &self.groups,
        }
    }

    /// Get the order found by the first pass alone.
    ///
    /// Outside cycles, every connection points forward in this order. Members
    /// of a cycle are contiguous but in no particular order.
    pub fn topological_order(&mut self) -> impl ExactSizeIterator<Item = NodeHandle> + '_ {
        self.refresh();
        let nodes = &self.nodes;
        self.order.iter().map(move |&index| nodes[index].handle())
    }

    fn refresh(&mut self) {
        if !self.stale {
            trace!(passes = self.sort_passes, "reusing cached schedule");
            return;
        }

        self.order_pass();
        self.group_pass();
        self.stale = false;
        self.sort_passes += 1;

        if self.config.log_sort_passes {
            let feedback = self
                .groups
                .iter()
                .filter(|span| span.kind == GroupKind::Feedback)
                .count();
            debug!(
                nodes = self.nodes.len(),
                groups = self.groups.len(),
                feedback,
                "sorted patch graph"
            );
        }
    }

    fn reset_search_state(&mut self) {
        for node in &mut self.nodes {
            node.set_search_state(SearchState::Unseen);
        }
    }

    fn order_pass(&mut self) {
        self.reset_search_state();
        self.order.clear();

        for root in 0..self.nodes.len() {
            if self.nodes[root].search_state() == SearchState::Unseen {
                self.search(root, Direction::Downstream);
            }
        }

        self.order.reverse();
    }

    fn group_pass(&mut self) {
        self.reset_search_state();
        self.members.clear();
        self.groups.clear();

        for position in 0..self.order.len() {
            let root = self.order[position];
            if self.nodes[root].search_state() == SearchState::Seen {
                continue;
            }

            let start = self.members.len();
            self.search(root, Direction::Upstream);
            let end = self.members.len();

            let kind = if end - start > 1 || self.nodes[root].has_self_connection() {
                GroupKind::Feedback
            } else {
                GroupKind::Chain
            };
            self.groups.push(GroupSpan { start, end, kind });
        }
    }

    /// Depth-first search from `root`, emitting every newly reached node in
    /// post-order: into `order` going downstream, into `members` going
    /// upstream.
    fn search(&mut self, root: usize, direction: Direction) {
        self.nodes[root].set_search_state(SearchState::Seen);
        self.stack.push((root, 0));

        while let Some(&(index, position)) = self.stack.last() {
            match direction.neighbor(&self.nodes[index], position) {
                Some(neighbor) => {
                    if let Some(frame) = self.stack.last_mut() {
                        frame.1 += 1;
                    }
                    if let Some(next) = self.resolve(neighbor) {
                        if self.nodes[next].search_state() == SearchState::Unseen {
                            self.nodes[next].set_search_state(SearchState::Seen);
                            self.stack.push((next, 0));
                        }
                    }
                }
                None => {
                    self.stack.pop();
                    match direction {
                        Direction::Downstream => self.order.push(index),
                        Direction::Upstream => {
                            let handle = self.nodes[index].handle();
                            self.members.push(handle);
                        }
                    }
                }
            }
        }
    }
}

/// The graph partitioned into groups, in execution order.
///
/// Borrowed from the graph's scratch buffers; it lives until the next
/// mutation.
#[derive(Debug, Clone, Copy)]
pub struct Schedule<'a> {
    members: &'a [NodeHandle],
    groups: &'a [GroupSpan],
}

impl<'a> Schedule<'a> {
    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the schedule has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Get the group at `index`, in execution order.
    pub fn group(&self, index: usize) -> Option<Group<'a>> {
        self.groups.get(index).map(|span| span.view(self.members))
    }

    /// Get the groups in execution order.
    pub fn groups(&self) -> impl ExactSizeIterator<Item = Group<'a>> + 'a {
        let (members, groups) = (self.members, self.groups);
        groups.iter().map(move |span| span.view(members))
    }

    /// Every node, group after group.
    pub fn nodes(&self) -> &'a [NodeHandle] {
        self.members
    }

    pub fn node_count(&self) -> usize {
        self.members.len()
    }

    /// Number of groups that need single-sample processing.
    pub fn feedback_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|span| span.kind == GroupKind::Feedback)
            .count()
    }
}

/// One strongly-connected group of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group<'a> {
    nodes: &'a [NodeHandle],
    kind: GroupKind,
}

impl<'a> Group<'a> {
    /// Get the member nodes.
    pub fn nodes(&self) -> &'a [NodeHandle] {
        self.nodes
    }

    /// Get the number of member nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get whether this group is a chain link or a feedback loop.
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn is_feedback(&self) -> bool {
        self.kind == GroupKind::Feedback
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains(&handle)
    }
}
