//! Persisted workflow format
//!
//! The same node and edge shapes are used for exported files and backend
//! persistence. Each node carries its full schema, so a workflow can be
//! rebuilt without consulting the catalog.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{GraphEdge, GraphNode, GraphStore, NodeAnnotations, NodeId, Position};
use crate::schema::{NodeSchema, ParameterMap};

/// Canvas node type used for every schema-driven node
pub const CUSTOM_NODE_TYPE: &str = "custom";

fn custom_node_type() -> String {
    CUSTOM_NODE_TYPE.to_string()
}

/// Node payload stored under `data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNodeData {
    #[serde(rename = "nodeSchema")]
    pub node_schema: NodeSchema,
    #[serde(default)]
    pub parameters: ParameterMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A node in persisted form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub id: NodeId,
    #[serde(rename = "type", default = "custom_node_type")]
    pub kind: String,
    #[serde(default)]
    pub position: Position,
    pub data: PersistedNodeData,
}

impl From<&GraphNode> for PersistedNode {
    fn from(node: &GraphNode) -> Self {
        Self {
            id: node.id.clone(),
            kind: custom_node_type(),
            position: node.position,
            data: PersistedNodeData {
                node_schema: node.schema.as_ref().clone(),
                parameters: node.parameters.clone(),
                response: node.annotations.response.clone(),
                response_content: node.annotations.response_content.clone(),
                error: node.annotations.error.clone(),
            },
        }
    }
}

/// Nodes and edges of a workflow, as saved to the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraphData {
    #[serde(default)]
    pub nodes: Vec<PersistedNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraphData {
    /// Capture the persisted form of a graph
    pub fn from_graph(graph: &GraphStore) -> Self {
        Self {
            nodes: graph.nodes().iter().map(PersistedNode::from).collect(),
            edges: graph.edges().to_vec(),
        }
    }

    /// Rebuild a graph; nodes with identical schemas share one `Arc`
    pub fn into_graph(self) -> GraphStore {
        let mut shared: HashMap<String, Vec<Arc<NodeSchema>>> = HashMap::new();
        let nodes = self
            .nodes
            .into_iter()
            .map(|persisted| {
                let data = persisted.data;
                let candidates = shared.entry(data.node_schema.node_id.clone()).or_default();
                let schema = match candidates.iter().find(|s| ***s == data.node_schema) {
                    Some(existing) => Arc::clone(existing),
                    None => {
                        let schema = Arc::new(data.node_schema);
                        candidates.push(Arc::clone(&schema));
                        schema
                    }
                };
                GraphNode {
                    id: persisted.id,
                    schema,
                    position: persisted.position,
                    parameters: data.parameters,
                    annotations: NodeAnnotations {
                        response: data.response,
                        response_content: data.response_content,
                        error: data.error,
                    },
                }
            })
            .collect();

        GraphStore::from_parts(nodes, self.edges)
    }
}

/// Exported workflow document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFile {
    #[serde(default)]
    pub nodes: Vec<PersistedNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    /// RFC 3339 export time
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub name: String,
}

impl WorkflowFile {
    /// Export a graph, naming it `Workflow_{date}_{millis}` unless a name is given
    pub fn from_graph(graph: &GraphStore, name: Option<String>, now: DateTime<Utc>) -> Self {
        let data = WorkflowGraphData::from_graph(graph);
        Self {
            nodes: data.nodes,
            edges: data.edges,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            name: name.unwrap_or_else(|| default_workflow_name(now)),
        }
    }

    /// Nodes and edges without the document metadata
    pub fn graph_data(&self) -> WorkflowGraphData {
        WorkflowGraphData {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn into_graph(self) -> GraphStore {
        WorkflowGraphData {
            nodes: self.nodes,
            edges: self.edges,
        }
        .into_graph()
    }

    /// Parse an exported document
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize with two-space indentation
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Default export name, e.g. `Workflow_2024-05-01_1714521600000`
pub fn default_workflow_name(now: DateTime<Utc>) -> String {
    format!(
        "Workflow_{}_{}",
        now.format("%Y-%m-%d"),
        now.timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Connection;
    use crate::schema::ParameterSpec;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_graph() -> GraphStore {
        let query = Arc::new(
            NodeSchema::new("query_node", "QueryNode")
                .with_output("result", "string")
                .with_parameter(ParameterSpec::required("query", "string")),
        );
        let response =
            Arc::new(NodeSchema::new("response_node", "ResponseNode").with_input("query", "string"));

        let mut graph = GraphStore::new();
        let q = graph.add_node_from_schema(query);
        let r = graph.add_node_from_schema(Arc::clone(&response));
        graph.add_node_from_schema(response);
        let mut params = ParameterMap::new();
        params.insert("query".into(), json!("hello"));
        graph.update_parameters(&q, params);
        graph
            .connect(Connection::new(&q, "output-result", &r, "input-query"))
            .unwrap();
        graph.annotate(
            &r,
            NodeAnnotations {
                response: Some("hi".into()),
                ..Default::default()
            },
        );
        graph
    }

    #[test]
    fn test_default_name_and_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let file = WorkflowFile::from_graph(&GraphStore::new(), None, now);

        assert_eq!(file.name, format!("Workflow_2024-05-01_{}", now.timestamp_millis()));
        assert_eq!(file.timestamp, "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_export_import_round_trip() {
        let graph = sample_graph();
        let file = WorkflowFile::from_graph(&graph, Some("demo".into()), Utc::now());
        let json = file.to_json_pretty().unwrap();

        let restored = WorkflowFile::from_json(&json).unwrap().into_graph();
        assert_eq!(restored.nodes().len(), graph.nodes().len());
        for (a, b) in graph.nodes().iter().zip(restored.nodes()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.node_type(), b.node_type());
            assert_eq!(a.parameters, b.parameters);
            assert_eq!(a.annotations, b.annotations);
            assert_eq!(a.position, b.position);
        }
        assert_eq!(restored.edges(), graph.edges());
    }

    #[test]
    fn test_import_shares_identical_schemas() {
        let graph = sample_graph();
        let restored = WorkflowGraphData::from_graph(&graph).into_graph();

        let responses: Vec<_> = restored
            .nodes()
            .iter()
            .filter(|n| n.node_type() == "response_node")
            .collect();
        assert!(Arc::ptr_eq(&responses[0].schema, &responses[1].schema));
    }

    #[test]
    fn test_persisted_wire_shape() {
        let graph = sample_graph();
        let json = serde_json::to_value(WorkflowGraphData::from_graph(&graph)).unwrap();

        assert_eq!(json["nodes"][0]["type"], "custom");
        assert_eq!(json["nodes"][0]["data"]["nodeSchema"]["name"], "QueryNode");
        assert_eq!(json["nodes"][0]["data"]["parameters"]["query"], "hello");
        assert_eq!(json["edges"][0]["sourceHandle"], "output-result");
        assert_eq!(json["edges"][0]["targetHandle"], "input-query");
    }

    #[test]
    fn test_import_drops_dangling_edges() {
        let json = json!({
            "nodes": [{
                "id": "a",
                "position": {"x": 1.0, "y": 2.0},
                "data": {"nodeSchema": {"node_id": "query_node", "name": "QueryNode"}}
            }],
            "edges": [{"id": "e", "source": "a", "target": "b", "sourceHandle": null, "targetHandle": null}],
            "timestamp": "2024-05-01T12:00:00.000Z",
            "name": "broken"
        });
        let file: WorkflowFile = serde_json::from_value(json).unwrap();
        let graph = file.into_graph();

        assert_eq!(graph.nodes().len(), 1);
        assert!(graph.nodes()[0].parameters.is_empty());
        assert!(graph.edges().is_empty());
    }
}
