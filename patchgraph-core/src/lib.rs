//! Patchgraph Core
//!
//! This crate provides the patch-graph scheduler of a modular synthesizer.
//! It implements:
//!
//! - A mutable graph of processing nodes and their signal connections
//! - Topological ordering of the patch
//! - Grouping into strongly-connected components, so feedback loops can be
//!   told apart from feed-forward chains
//! - A memoized schedule and a dirty flag for the audio engine to poll
//!
//! The scheduler never interprets node payloads and performs no I/O. It is
//! single-threaded; use [`SharedGraph`] when edits and the audio callback
//! run on different threads.
//!
//! # Architecture
//!
//! - `graph`: nodes, connections, mutation and the sort passes
//! - `shared`: the exclusive-lock wrapper for cross-thread access
//! - `config`: construction-time settings
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use patchgraph_core::{Graph, GroupKind};
//!
//! let mut graph = Graph::new();
//! let osc = graph.new_node("osc");
//! let filter = graph.new_node("filter");
//! let delay = graph.new_node("delay");
//!
//! graph.new_connection(osc, filter)?;
//! graph.new_connection(filter, delay)?;
//! graph.new_connection(delay, filter)?;
//!
//! if graph.has_changed() {
//!     let schedule = graph.sorted();
//!     assert_eq!(schedule.len(), 2);
//!     assert_eq!(schedule.group(0).unwrap().nodes(), &[osc]);
//!     assert_eq!(schedule.group(1).unwrap().kind(), GroupKind::Feedback);
//!     graph.ack_change();
//! }
//! # Ok::<(), patchgraph_core::GraphError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod shared;

pub use config::GraphConfig;
pub use error::{ConfigError, GraphError, Result};
pub use graph::{Connection, Graph, GraphSnapshot, Group, GroupKind, Node, NodeHandle, Schedule};
pub use shared::SharedGraph;
