//! Patch Graph
//!
//! This module implements the graph of signal-processing nodes that make up
//! a patch, and the scheduler that decides the order they run in.
//!
//! # Overview
//!
//! The patch graph is a directed graph where:
//!
//! - Nodes represent processing units (oscillators, filters, mixers)
//! - Edges represent signal flow: if A feeds B, there is an edge from A to B
//!
//! Unlike a pure dependency DAG, a patch may contain feedback loops. The
//! scheduler therefore produces groups rather than a flat order: each group
//! is a strongly-connected component, and a group holding more than one node
//! (or a node wired to itself) is a loop the engine must run sample by
//! sample.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a dense registry so the sort passes walk plain indices.
//!    Callers hold generation-checked [`NodeHandle`]s instead, which stay
//!    valid while indices shift and go stale once their node is removed.
//!
//! 2. Every connection is stored on both endpoints, so upstream and
//!    downstream neighbors are equally cheap to enumerate.
//!
//! 3. The schedule is memoized and rebuilt into reused buffers, so asking
//!    for it every audio cycle costs nothing while the patch is unchanged.

mod node;
mod scheduler;
mod sort;

pub use node::{Connection, Node, NodeHandle, SearchState};
pub use scheduler::{Graph, GraphSnapshot};
pub use sort::{Group, GroupKind, Schedule};
