//! Backend seam
//!
//! [`WorkflowBackend`] is everything a canvas session needs from the
//! outside world: the node catalog, execution, and workflow persistence.
//! Dynamic option lists come through the [`OptionsProvider`] supertrait.
//! Hosts plug in a transport (the HTTP adapter, or an in-memory fake in
//! tests); the engine itself performs no I/O.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::CatalogData;
use crate::compiler::ExecutionDescriptor;
use crate::error::Result;
use crate::graph::NodeId;
use crate::options::OptionsProvider;
use crate::workflow_file::WorkflowGraphData;

fn default_success() -> bool {
    true
}

/// Per-node results of an execution run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionData {
    /// Inputs received by terminal nodes, keyed by node id
    #[serde(default)]
    pub response_inputs: BTreeMap<NodeId, Value>,
    /// Error per failed node
    #[serde(default)]
    pub errors: BTreeMap<NodeId, Value>,
    #[serde(default)]
    pub executed_nodes: Vec<NodeId>,
}

/// Response of the execute endpoint
///
/// A missing `success` flag counts as success and a missing `data` block
/// as an empty result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub data: ExecutionData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResponse {
    /// Failed run that never reached the engine
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: ExecutionData::default(),
            error: Some(error.into()),
        }
    }
}

/// Request body of the workflow save endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveWorkflowRequest {
    pub name: String,
    pub data: WorkflowGraphData,
}

/// A workflow stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data: WorkflowGraphData,
}

/// Entry of the workflow listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Backend id; numeric or string depending on the store
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl WorkflowSummary {
    /// Id in the form used to build URLs
    pub fn id_text(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Network collaborator of a canvas session
#[async_trait]
pub trait WorkflowBackend: OptionsProvider {
    /// Fetch the node catalog
    async fn fetch_catalog(&self) -> Result<CatalogData>;

    /// Submit a compiled workflow
    ///
    /// Transport failures are errors; a run the engine reports as failed
    /// is an `Ok` response with `success == false`.
    async fn execute(&self, descriptor: &ExecutionDescriptor) -> Result<ExecutionResponse>;

    /// Persist a workflow under a name; returns the backend's response body
    async fn save_workflow(&self, request: &SaveWorkflowRequest) -> Result<Value>;

    /// Load a stored workflow by id
    async fn load_workflow(&self, id: &str) -> Result<StoredWorkflow>;

    /// List stored workflows
    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>>;
}
