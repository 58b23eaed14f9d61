//! Execution result projection
//!
//! Writes the outcome of a run back onto graph nodes as display-only
//! annotations, and tracks which nodes and edges are shown as executing
//! while a run is in flight. Committed parameters are never touched.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::backend::ExecutionResponse;
use crate::graph::{EdgeId, GraphStore, NodeAnnotations, NodeId};
use crate::schema::is_blank;

/// What a projection changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    /// Number of nodes that received annotations
    pub annotated: usize,
    /// Result ids with no matching node (deleted during the run)
    pub skipped: Vec<NodeId>,
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Annotate nodes with the results of a run
///
/// Annotations from earlier runs are cleared first. Ids of nodes that no
/// longer exist are skipped.
pub fn project(graph: &mut GraphStore, response: &ExecutionResponse) -> ProjectionSummary {
    graph.clear_annotations();

    let mut pending: BTreeMap<NodeId, NodeAnnotations> = BTreeMap::new();

    for (node_id, inputs) in &response.data.response_inputs {
        let final_response = inputs.get("final_response");
        if is_blank(final_response) {
            continue;
        }
        let final_response = final_response.map(display_text).unwrap_or_default();
        let content = inputs
            .get("response_content")
            .filter(|v| !is_blank(Some(*v)))
            .map(display_text)
            .unwrap_or_else(|| final_response.clone());

        let entry = pending.entry(node_id.clone()).or_default();
        entry.response = Some(final_response);
        entry.response_content = Some(content);
    }

    for (node_id, error) in &response.data.errors {
        pending.entry(node_id.clone()).or_default().error = Some(display_text(error));
    }

    let mut summary = ProjectionSummary::default();
    for (node_id, annotations) in pending {
        if graph.annotate(&node_id, annotations) {
            summary.annotated += 1;
        } else {
            log::debug!("Skipping result for missing node '{}'", node_id);
            summary.skipped.push(node_id);
        }
    }
    summary
}

/// Transient "executing" highlight of nodes and edges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionIndicator {
    nodes: BTreeSet<NodeId>,
    edges: BTreeSet<EdgeId>,
}

impl ExecutionIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every node and edge of the graph as executing
    pub fn start(&mut self, graph: &GraphStore) {
        self.nodes = graph.nodes().iter().map(|n| n.id.clone()).collect();
        self.edges = graph.edges().iter().map(|e| e.id.clone()).collect();
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.nodes.is_empty() || !self.edges.is_empty()
    }

    pub fn is_node_executing(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn is_edge_executing(&self, id: &str) -> bool {
        self.edges.contains(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.nodes.iter()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = &EdgeId> + '_ {
        self.edges.iter()
    }
}
