//! Graph Configuration
//!
//! Sizing and logging knobs for a [`Graph`](crate::graph::Graph). The
//! configuration is plain data so it can be embedded in a larger host config
//! file and loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Construction-time settings for a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Number of nodes to reserve room for up front.
    ///
    /// The registry, the slot table and the sort scratch buffers are all
    /// reserved to this size, so a patch that stays below it never allocates
    /// while sorting.
    pub node_capacity: usize,

    /// Emit a `debug!` event each time a sort pass actually runs.
    pub log_sort_passes: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            node_capacity: 64,
            log_sort_passes: true,
        }
    }
}

impl GraphConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the number of nodes to reserve room for.
    pub fn with_node_capacity(mut self, node_capacity: usize) -> Self {
        self.node_capacity = node_capacity;
        self
    }
}
