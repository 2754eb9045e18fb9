//! Shared Graph
//!
//! The graph itself has no internal locking. Patch edits arrive from editing
//! threads (the scripting REPL, a control server) while the audio callback
//! reads the schedule, so every access must go through one exclusive lock.
//! [`SharedGraph`] is that lock.
//!
//! Editing threads block on [`SharedGraph::lock`] or use
//! [`SharedGraph::edit`]. The audio thread must never block, so it uses
//! [`SharedGraph::try_lock`] and keeps running its previous plan for the
//! current block if an edit is in progress.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::config::GraphConfig;
use crate::graph::Graph;

/// A graph behind a single exclusive lock, cheap to clone across threads.
pub struct SharedGraph<T> {
    inner: Arc<Mutex<Graph<T>>>,
}

impl<T> SharedGraph<T> {
    /// Create a shared, empty graph.
    pub fn new() -> Self {
        Self::from_graph(Graph::new())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self::from_graph(Graph::with_config(config))
    }

    /// Share an existing graph.
    pub fn from_graph(graph: Graph<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    /// Lock the graph, blocking until no other thread holds it.
    pub fn lock(&self) -> MutexGuard<'_, Graph<T>> {
        self.inner.lock()
    }

    /// Lock the graph if it is free right now.
    ///
    /// Returns `None` while another thread holds the lock.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Graph<T>>> {
        self.inner.try_lock()
    }

    /// Run `f` with exclusive access, so a batch of edits is applied as one
    /// unit from the reader's point of view.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Graph<T>) -> R) -> R {
        let mut graph = self.inner.lock();
        f(&mut graph)
    }
}

impl<T> Clone for SharedGraph<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SharedGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}
