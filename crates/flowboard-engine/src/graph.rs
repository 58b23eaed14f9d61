//! Canonical in-memory workflow graph
//!
//! `GraphStore` owns the nodes, edges and committed parameter values of a
//! canvas. Every mutation is applied in one step, so no partially applied
//! edge or parameter state is ever observable between calls.
//!
//! Operations addressed to ids that no longer exist are silent no-ops.
//! They can legitimately arise when a UI event races with async settling,
//! so they report `false` instead of failing.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::NodeCatalog;
use crate::error::{EngineError, Result};
use crate::schema::{NodeSchema, ParameterMap};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Canvas position of a node; opaque to the compiler
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Display-only data written back from an execution run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeAnnotations {
    pub fn is_empty(&self) -> bool {
        self.response.is_none() && self.response_content.is_none() && self.error.is_none()
    }
}

/// A node instance on the canvas
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Unique identifier, stable for the node's lifetime
    pub id: NodeId,
    /// Shared schema of this node's type
    pub schema: Arc<NodeSchema>,
    pub position: Position,
    /// Committed parameter values; may be incomplete relative to the schema
    pub parameters: ParameterMap,
    /// Output of the last run, never part of `parameters`
    pub annotations: NodeAnnotations,
}

impl GraphNode {
    /// Node type key of the schema
    pub fn node_type(&self) -> &str {
        &self.schema.node_id
    }
}

/// An edge connecting an output handle to an input handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Source handle (e.g., "output-result"); unset handles are allowed
    #[serde(default)]
    pub source_handle: Option<String>,
    /// Target handle (e.g., "input-query")
    #[serde(default)]
    pub target_handle: Option<String>,
}

/// A connection request coming from the canvas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Connection {
    /// Create a connection between two handles
    pub fn new(
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: Some(source_handle.into()),
            target_handle: Some(target_handle.into()),
        }
    }
}

/// Canonical graph of one canvas
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// Node targeted by the open configuration panel
    panel_target: Option<NodeId>,
}

impl GraphStore {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from persisted nodes and edges
    ///
    /// Edges whose endpoints are missing are dropped, and so are nodes
    /// whose id repeats an earlier one.
    pub fn from_parts(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut kept_nodes = Vec::with_capacity(nodes.len());
        for node in nodes {
            if seen.insert(node.id.clone()) {
                kept_nodes.push(node);
            } else {
                log::warn!("Dropping duplicate node id '{}'", node.id);
            }
        }

        let kept_edges = edges
            .into_iter()
            .filter(|edge| {
                let ok = seen.contains(&edge.source) && seen.contains(&edge.target);
                if !ok {
                    log::warn!(
                        "Dropping dangling edge '{}' ({} -> {})",
                        edge.id,
                        edge.source,
                        edge.target
                    );
                }
                ok
            })
            .collect();

        Self {
            nodes: kept_nodes,
            edges: kept_edges,
            panel_target: None,
        }
    }

    /// Add a node for a catalog type
    pub fn add_node(&mut self, catalog: &NodeCatalog, node_type: &str) -> Result<NodeId> {
        let schema = catalog
            .get(node_type)
            .ok_or_else(|| EngineError::UnknownSchema(node_type.to_string()))?;
        Ok(self.add_node_from_schema(schema))
    }

    /// Add a node for a schema, seeding parameters from declared defaults
    pub fn add_node_from_schema(&mut self, schema: Arc<NodeSchema>) -> NodeId {
        let token = Uuid::new_v4();
        let id = format!("{}_{}", schema.node_id, token.simple());
        let position = default_position(&token);
        let parameters = schema.default_parameters();

        self.nodes.push(GraphNode {
            id: id.clone(),
            schema,
            position,
            parameters,
            annotations: NodeAnnotations::default(),
        });
        id
    }

    /// Remove a node together with every incident edge
    ///
    /// Closes the configuration panel if it targets this node. Returns
    /// whether the node existed.
    pub fn delete_node(&mut self, id: &str) -> bool {
        let Some(pos) = self.nodes.iter().position(|n| n.id == id) else {
            log::debug!("delete_node: no node '{}'", id);
            return false;
        };
        self.nodes.remove(pos);
        self.edges.retain(|e| e.source != id && e.target != id);
        if self.panel_target.as_deref() == Some(id) {
            self.panel_target = None;
        }
        true
    }

    /// Append an edge between two existing nodes
    ///
    /// Duplicate and cyclic connections are accepted; the compiler and
    /// `lint` deal with them.
    pub fn connect(&mut self, connection: Connection) -> Result<EdgeId> {
        for endpoint in [&connection.source, &connection.target] {
            if self.node(endpoint).is_none() {
                return Err(EngineError::DanglingEdge {
                    node_id: endpoint.clone(),
                });
            }
        }

        let id = format!("edge_{}", Uuid::new_v4().simple());
        self.edges.push(GraphEdge {
            id: id.clone(),
            source: connection.source,
            target: connection.target,
            source_handle: connection.source_handle,
            target_handle: connection.target_handle,
        });
        Ok(id)
    }

    /// Remove a single edge
    pub fn remove_edge(&mut self, id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != id);
        self.edges.len() != before
    }

    /// Shallow-merge parameter values into a node
    pub fn update_parameters(&mut self, id: &str, partial: ParameterMap) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.parameters.extend(partial);
                true
            }
            None => {
                log::debug!("update_parameters: no node '{}'", id);
                false
            }
        }
    }

    /// Replace a node's parameter map wholesale
    pub fn replace_parameters(&mut self, id: &str, parameters: ParameterMap) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.parameters = parameters;
                true
            }
            None => {
                log::debug!("replace_parameters: no node '{}'", id);
                false
            }
        }
    }

    /// Move a node on the canvas
    pub fn set_position(&mut self, id: &str, position: Position) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Attach run output to a node
    pub fn annotate(&mut self, id: &str, annotations: NodeAnnotations) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.annotations = annotations;
                true
            }
            None => false,
        }
    }

    /// Drop run output from every node
    pub fn clear_annotations(&mut self) {
        for node in &mut self.nodes {
            node.annotations = NodeAnnotations::default();
        }
    }

    /// Point the configuration panel at a node
    pub fn open_panel(&mut self, id: &str) -> bool {
        if self.node(id).is_some() {
            self.panel_target = Some(id.to_string());
            true
        } else {
            log::debug!("open_panel: no node '{}'", id);
            false
        }
    }

    pub fn close_panel(&mut self) {
        self.panel_target = None;
    }

    pub fn panel_target(&self) -> Option<&str> {
        self.panel_target.as_deref()
    }

    /// Find a node by ID
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Find an edge by ID
    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Edges in insertion order
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Get the IDs of nodes that this node depends on (upstream nodes)
    pub fn dependencies(&self, node_id: &str) -> Vec<NodeId> {
        self.incoming_edges(node_id).map(|e| e.source.clone()).collect()
    }

    /// Get the IDs of nodes that depend on this node (downstream nodes)
    pub fn dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_edges(node_id).map(|e| e.target.clone()).collect()
    }
}

/// Spread new nodes over the visible band instead of stacking them
fn default_position(token: &Uuid) -> Position {
    let bytes = token.as_bytes();
    let x = 200.0 + f64::from(bytes[0]) / 256.0 * 300.0;
    let y = 150.0 + f64::from(bytes[1]) / 256.0 * 200.0;
    Position::new(x, y)
}
