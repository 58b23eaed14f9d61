//! Per-node configuration staging area
//!
//! The cache maps a node id to the last parameter map saved from its
//! configuration panel. It lives for one editing session and is independent
//! of whether a panel is currently shown, so edits survive close and reopen.
//! Deleting a node leaves its entry orphaned; ids are never reused, so an
//! orphan can never be picked up by a different node.

use std::collections::HashMap;

use crate::graph::{GraphStore, NodeId};
use crate::schema::ParameterMap;

/// Session-scoped map of node id to last-saved parameters
#[derive(Debug, Clone, Default)]
pub struct ConfigCache {
    entries: HashMap<NodeId, ParameterMap>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node's parameters, replacing any previous entry
    pub fn save(&mut self, node_id: &str, parameters: ParameterMap) {
        log::debug!(
            "Config cache save for '{}' ({} keys)",
            node_id,
            parameters.len()
        );
        self.entries.insert(node_id.to_string(), parameters);
    }

    /// Last saved parameters, or `None` if the node was never saved
    pub fn load(&self, node_id: &str) -> Option<&ParameterMap> {
        let entry = self.entries.get(node_id);
        log::debug!(
            "Config cache load for '{}': {}",
            node_id,
            if entry.is_some() { "hit" } else { "miss" }
        );
        entry
    }

    pub fn remove(&mut self, node_id: &str) -> Option<ParameterMap> {
        self.entries.remove(node_id)
    }

    pub fn clear(&mut self) {
        log::debug!("Config cache cleared ({} entries)", self.entries.len());
        self.entries.clear();
    }

    /// Reset the cache to the committed parameters of every node in `graph`
    pub fn seed_from_graph(&mut self, graph: &GraphStore) {
        self.clear();
        for node in graph.nodes() {
            self.save(&node.id, node.parameters.clone());
        }
    }

    /// Parameters a configuration panel should open with
    ///
    /// Prefers the cached entry and falls back to the node's committed
    /// parameters. Returns `None` when the node does not exist.
    pub fn snapshot_for_panel(&self, graph: &GraphStore, node_id: &str) -> Option<ParameterMap> {
        let node = graph.node(node_id)?;
        Some(
            self.load(node_id)
                .cloned()
                .unwrap_or_else(|| node.parameters.clone()),
        )
    }

    /// Save panel edits to the cache and the graph in one step
    ///
    /// After a successful commit the cache entry and the node's parameters
    /// are equal. An unknown node leaves both untouched and returns `false`.
    pub fn commit(&mut self, graph: &mut GraphStore, node_id: &str, parameters: ParameterMap) -> bool {
        if graph.node(node_id).is_none() {
            log::debug!("commit: no node '{}'", node_id);
            return false;
        }
        graph.replace_parameters(node_id, parameters.clone());
        self.save(node_id, parameters);
        true
    }

    /// Merge parameters into a node and re-save its cache entry
    ///
    /// The entry becomes the node's merged parameters, so a panel opened
    /// afterwards starts from them. Unknown nodes touch neither store.
    pub fn merge_commit(&mut self, graph: &mut GraphStore, node_id: &str, partial: ParameterMap) -> bool {
        if !graph.update_parameters(node_id, partial) {
            return false;
        }
        if let Some(node) = graph.node(node_id) {
            self.save(node_id, node.parameters.clone());
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids with a cached entry, sorted
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
