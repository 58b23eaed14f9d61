//! Graph-to-execution compiler
//!
//! Turns a [`GraphStore`] into the [`ExecutionDescriptor`] the execution
//! engine consumes. Compilation is a pure function of the graph and the
//! [`CompilerRules`]: it performs no I/O and fails before anything is sent
//! when the graph cannot run.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::{GraphStore, NodeId};
use crate::schema::{is_blank, ParameterMap};

/// Reason a graph cannot be submitted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The graph has no nodes
    #[error("Please add nodes to the workflow before executing")]
    EmptyGraph,
    /// A required parameter has no value, fallback or default
    #[error("Node \"{node_name}\" ({node_id}) is missing required parameter: {parameter}")]
    MissingRequiredParameter {
        node_id: NodeId,
        node_name: String,
        parameter: String,
    },
    /// No node of an entry or terminal category is present
    #[error("Workflow must include at least one {role} node ({})", .expected.join(" or "))]
    MissingCategory {
        role: CategoryRole,
        expected: Vec<String>,
    },
}

/// Structural role a node category plays in a runnable graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryRole {
    Entry,
    Terminal,
}

impl std::fmt::Display for CategoryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

/// Non-blocking structural observation about a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    /// The graph contains at least one cycle
    CycleDetected,
    /// Two edges connect the same pair of handles
    DuplicateEdge { edge_id: String, duplicate_of: String },
    /// A node has no incoming or outgoing edges
    IsolatedNode { node_id: NodeId },
}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected => write!(f, "Cycle detected in graph"),
            Self::DuplicateEdge {
                edge_id,
                duplicate_of,
            } => write!(f, "Edge '{}' duplicates edge '{}'", edge_id, duplicate_of),
            Self::IsolatedNode { node_id } => write!(f, "Node '{}' has no connections", node_id),
        }
    }
}

/// Tables that drive compilation
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerRules {
    /// Schema name to registry key; unlisted names are lower-cased
    pub aliases: BTreeMap<String, String>,
    /// Literal values for required parameters, keyed by (registry key, parameter)
    pub fallbacks: BTreeMap<(String, String), Value>,
    /// Registry keys of which at least one node must be present
    pub entry_categories: Vec<String>,
    pub terminal_categories: Vec<String>,
    /// Prefix stripped from source handles to get the output port
    pub output_handle_prefix: String,
    /// Prefix stripped from target handles to get the input port
    pub input_handle_prefix: String,
    /// Output port used when a source handle is unset
    pub fallback_output: String,
    /// Input port used when a target handle is unset
    pub fallback_input: String,
}

impl Default for CompilerRules {
    fn default() -> Self {
        let aliases = [
            ("QueryNode", "querynode"),
            ("ResponseNode", "responsenode"),
            ("LanguageModelNode", "languagemodelnode"),
        ]
        .into_iter()
        .map(|(name, key)| (name.to_string(), key.to_string()))
        .collect();

        let fallbacks = [
            ("querynode", "query", "Hi there!"),
            ("languagemodelnode", "service", "openai"),
        ]
        .into_iter()
        .map(|(key, param, value)| ((key.to_string(), param.to_string()), Value::from(value)))
        .collect();

        Self {
            aliases,
            fallbacks,
            entry_categories: vec!["querynode".to_string()],
            terminal_categories: vec!["responsenode".to_string()],
            output_handle_prefix: "output-".to_string(),
            input_handle_prefix: "input-".to_string(),
            fallback_output: "result".to_string(),
            fallback_input: "query".to_string(),
        }
    }
}

impl CompilerRules {
    /// Backend registry key for a schema name
    pub fn registry_key(&self, schema_name: &str) -> String {
        self.aliases
            .get(schema_name)
            .cloned()
            .unwrap_or_else(|| schema_name.to_lowercase())
    }

    fn fallback(&self, registry_key: &str, parameter: &str) -> Option<&Value> {
        self.fallbacks
            .get(&(registry_key.to_string(), parameter.to_string()))
    }

    fn port_name(handle: Option<&str>, prefix: &str, fallback: &str) -> String {
        let stripped = handle.map(|h| h.strip_prefix(prefix).unwrap_or(h));
        match stripped {
            Some(port) if !port.is_empty() => port.to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// A node as the execution engine sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorNode {
    /// Registry key of the node implementation
    #[serde(rename = "type")]
    pub node_type: String,
    /// Fully resolved parameters
    pub parameters: ParameterMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSource {
    pub node: NodeId,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTarget {
    pub node: NodeId,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorEdge {
    pub from: EdgeSource,
    pub to: EdgeTarget,
}

/// Backend-ready form of a graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDescriptor {
    pub nodes: BTreeMap<NodeId, DescriptorNode>,
    pub edges: Vec<DescriptorEdge>,
}

/// Compile a graph into an execution descriptor
///
/// Steps run in a fixed order: reject an empty graph, resolve registry keys
/// and parameters (failing on the first unresolved required parameter),
/// check entry and terminal categories, then translate edges.
pub fn compile(
    graph: &GraphStore,
    rules: &CompilerRules,
) -> std::result::Result<ExecutionDescriptor, ValidationError> {
    if graph.is_empty() {
        return Err(ValidationError::EmptyGraph);
    }

    let mut nodes = BTreeMap::new();
    for node in graph.nodes() {
        let schema = &node.schema;
        let registry_key = rules.registry_key(&schema.name);
        let mut parameters = node.parameters.clone();

        for param in schema.parameters.iter().filter(|p| p.required) {
            if !is_blank(parameters.get(&param.name)) {
                continue;
            }
            let resolved = rules
                .fallback(&registry_key, &param.name)
                .or_else(|| param.default_value.as_ref().filter(|v| !v.is_null()));

            match resolved {
                Some(value) => {
                    parameters.insert(param.name.clone(), value.clone());
                }
                None => {
                    return Err(ValidationError::MissingRequiredParameter {
                        node_id: node.id.clone(),
                        node_name: schema.name.clone(),
                        parameter: param.name.clone(),
                    });
                }
            }
        }

        nodes.insert(
            node.id.clone(),
            DescriptorNode {
                node_type: registry_key,
                parameters,
            },
        );
    }

    check_category(&nodes, CategoryRole::Entry, &rules.entry_categories)?;
    check_category(&nodes, CategoryRole::Terminal, &rules.terminal_categories)?;

    let edges = graph
        .edges()
        .iter()
        .map(|edge| DescriptorEdge {
            from: EdgeSource {
                node: edge.source.clone(),
                output: CompilerRules::port_name(
                    edge.source_handle.as_deref(),
                    &rules.output_handle_prefix,
                    &rules.fallback_output,
                ),
            },
            to: EdgeTarget {
                node: edge.target.clone(),
                input: CompilerRules::port_name(
                    edge.target_handle.as_deref(),
                    &rules.input_handle_prefix,
                    &rules.fallback_input,
                ),
            },
        })
        .collect();

    Ok(ExecutionDescriptor { nodes, edges })
}

fn check_category(
    nodes: &BTreeMap<NodeId, DescriptorNode>,
    role: CategoryRole,
    expected: &[String],
) -> std::result::Result<(), ValidationError> {
    let present = nodes.values().any(|node| {
        expected
            .iter()
            .any(|category| category.eq_ignore_ascii_case(&node.node_type))
    });
    if present || expected.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingCategory {
            role,
            expected: expected.to_vec(),
        })
    }
}

/// Collect structural warnings and log them
///
/// Warnings never block compilation.
pub fn lint(graph: &GraphStore) -> Vec<GraphWarning> {
    let mut warnings = Vec::new();

    detect_cycles(graph, &mut warnings);
    detect_duplicate_edges(graph, &mut warnings);

    if graph.nodes().len() > 1 {
        let connected: HashSet<&str> = graph
            .edges()
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();
        for node in graph.nodes() {
            if !connected.contains(node.id.as_str()) {
                warnings.push(GraphWarning::IsolatedNode {
                    node_id: node.id.clone(),
                });
            }
        }
    }

    for warning in &warnings {
        log::warn!("{}", warning);
    }
    warnings
}

/// Detect cycles using Kahn's algorithm (topological sort)
fn detect_cycles(graph: &GraphStore, warnings: &mut Vec<GraphWarning>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in graph.nodes() {
        in_degree.insert(&node.id, 0);
    }
    for edge in graph.edges() {
        *in_degree.entry(&edge.target).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for edge in graph.outgoing_edges(node_id) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(&edge.target);
                }
            }
        }
    }

    if visited < graph.nodes().len() {
        warnings.push(GraphWarning::CycleDetected);
    }
}

fn detect_duplicate_edges(graph: &GraphStore, warnings: &mut Vec<GraphWarning>) {
    let mut seen: HashMap<(&str, Option<&str>, &str, Option<&str>), &str> = HashMap::new();
    for edge in graph.edges() {
        let key = (
            edge.source.as_str(),
            edge.source_handle.as_deref(),
            edge.target.as_str(),
            edge.target_handle.as_deref(),
        );
        if let Some(first) = seen.get(&key) {
            warnings.push(GraphWarning::DuplicateEdge {
                edge_id: edge.id.clone(),
                duplicate_of: (*first).to_string(),
            });
        } else {
            seen.insert(key, &edge.id);
        }
    }
}
