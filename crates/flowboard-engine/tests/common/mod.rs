//! Shared fixtures for engine scenario tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use flowboard_engine::{
    CatalogData, EngineError, ExecutionDescriptor, ExecutionResponse, NodeSchema, OptionKey,
    OptionsProvider, ParameterSpec, Result, SaveWorkflowRequest, StoredWorkflow, UiComponent,
    UiGroup, UiOption, WorkflowBackend, WorkflowSummary,
};
use flowboard_engine::schema::NodeUiConfig;
use serde_json::{json, Value};

pub fn query_schema() -> NodeSchema {
    NodeSchema::new("query_node", "QueryNode")
        .with_output("result", "string")
        .with_parameter(ParameterSpec::required("query", "string"))
}

pub fn response_schema() -> NodeSchema {
    NodeSchema::new("response_node", "ResponseNode").with_input("query", "string")
}

pub fn llm_schema() -> NodeSchema {
    let mut service = UiComponent::new("select", "service");
    service.options = Some(vec![UiOption::plain("openai"), UiOption::plain("ollama")]);
    let model = UiComponent::new("select", "model");

    NodeSchema::new("llm_node", "LanguageModelNode")
        .with_input("query", "string")
        .with_output("result", "string")
        .with_parameter(ParameterSpec::required("service", "string").with_default(json!("openai")))
        .with_parameter(ParameterSpec::required("model", "string"))
        .with_ui_config(NodeUiConfig {
            node_id: "llm_node".into(),
            node_name: "LanguageModelNode".into(),
            groups: vec![UiGroup {
                name: "model".into(),
                label: "Model".into(),
                description: None,
                components: vec![service, model],
                collapsible: false,
                collapsed: false,
                extra: Default::default(),
            }],
            ..Default::default()
        })
}

pub fn catalog_data() -> CatalogData {
    let schemas = [query_schema(), response_schema(), llm_schema()];
    CatalogData {
        nodes: schemas.iter().map(|s| s.node_id.clone()).collect(),
        total_count: schemas.len(),
        schemas: schemas
            .into_iter()
            .map(|s| (s.node_id.clone(), s))
            .collect(),
    }
}

/// In-memory backend that counts every call
pub struct FakeBackend {
    pub catalog: Mutex<Result<CatalogData>>,
    pub execute_result: Mutex<Option<Result<ExecutionResponse>>>,
    pub models: HashMap<String, Vec<String>>,
    pub saved: Mutex<Vec<SaveWorkflowRequest>>,
    pub catalog_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub option_calls: AtomicUsize,
    pub last_descriptor: Mutex<Option<ExecutionDescriptor>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let mut models = HashMap::new();
        models.insert("openai".to_string(), vec!["gpt-4o".to_string(), "gpt-4".to_string()]);
        models.insert("ollama".to_string(), vec!["llama3".to_string()]);
        Self {
            catalog: Mutex::new(Ok(catalog_data())),
            execute_result: Mutex::new(None),
            models,
            saved: Mutex::new(Vec::new()),
            catalog_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
            option_calls: AtomicUsize::new(0),
            last_descriptor: Mutex::new(None),
        }
    }

    pub fn fail_catalog(&self, message: &str) {
        *self.catalog.lock().unwrap() = Err(EngineError::schema_fetch(message));
    }

    pub fn respond_with(&self, result: Result<ExecutionResponse>) {
        *self.execute_result.lock().unwrap() = Some(result);
    }

    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn option_calls(&self) -> usize {
        self.option_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OptionsProvider for FakeBackend {
    async fn fetch_options(&self, key: &OptionKey) -> Result<Vec<UiOption>> {
        self.option_calls.fetch_add(1, Ordering::SeqCst);
        let service = key.dependent_value.clone().unwrap_or_default();
        self.models
            .get(&service)
            .map(|models| models.iter().map(UiOption::plain).collect())
            .ok_or_else(|| EngineError::schema_fetch(format!("unknown service {}", service)))
    }
}

#[async_trait]
impl WorkflowBackend for FakeBackend {
    async fn fetch_catalog(&self) -> Result<CatalogData> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.catalog.lock().unwrap() {
            Ok(data) => Ok(data.clone()),
            Err(e) => Err(EngineError::schema_fetch(e.to_string())),
        }
    }

    async fn execute(&self, descriptor: &ExecutionDescriptor) -> Result<ExecutionResponse> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_descriptor.lock().unwrap() = Some(descriptor.clone());
        match self.execute_result.lock().unwrap().take() {
            Some(result) => result,
            None => Ok(echo_response(descriptor)),
        }
    }

    async fn save_workflow(&self, request: &SaveWorkflowRequest) -> Result<Value> {
        let mut saved = self.saved.lock().unwrap();
        saved.push(request.clone());
        Ok(json!({"success": true, "id": saved.len()}))
    }

    async fn load_workflow(&self, id: &str) -> Result<StoredWorkflow> {
        let index: usize = id
            .parse()
            .map_err(|_| EngineError::backend(format!("bad id {}", id)))?;
        let saved = self.saved.lock().unwrap();
        let request = saved
            .get(index.wrapping_sub(1))
            .ok_or_else(|| EngineError::backend("404 Not Found"))?;
        Ok(StoredWorkflow {
            id: Some(json!(index)),
            name: Some(request.name.clone()),
            data: request.data.clone(),
        })
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>> {
        Ok(self
            .saved
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, r)| WorkflowSummary {
                id: json!(i + 1),
                name: r.name.clone(),
                created_at: None,
            })
            .collect())
    }
}

/// Success response that echoes each response node's query back
fn echo_response(descriptor: &ExecutionDescriptor) -> ExecutionResponse {
    let mut response_inputs = serde_json::Map::new();
    for (id, node) in &descriptor.nodes {
        if node.node_type == "responsenode" {
            response_inputs.insert(id.clone(), json!({"final_response": "Echo: Hi there!"}));
        }
    }
    serde_json::from_value(json!({
        "success": true,
        "data": {
            "response_inputs": response_inputs,
            "executed_nodes": descriptor.nodes.keys().collect::<Vec<_>>()
        }
    }))
    .unwrap()
}
