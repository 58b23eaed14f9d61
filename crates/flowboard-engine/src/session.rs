//! Canvas session
//!
//! A [`CanvasSession`] holds the complete editing state of one canvas: the
//! catalog, the graph, the configuration cache, the open panel and the
//! execution highlight. Hosts keep one session per canvas and pass it by
//! reference; nothing is shared between sessions.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::backend::{ExecutionResponse, SaveWorkflowRequest, WorkflowBackend, WorkflowSummary};
use crate::catalog::NodeCatalog;
use crate::compiler::{self, CompilerRules, ExecutionDescriptor, GraphWarning, ValidationError};
use crate::config_cache::ConfigCache;
use crate::error::{EngineError, Result};
use crate::events::{CanvasEvent, EventSink, GraphChange};
use crate::form::{resolve_options, FieldInput, FormState, RenderedGroup};
use crate::graph::{Connection, EdgeId, GraphStore, NodeId, Position};
use crate::options::{OptionCache, OptionsProvider};
use crate::projector::{self, ExecutionIndicator, ProjectionSummary};
use crate::schema::ParameterMap;
use crate::workflow_file::{WorkflowFile, WorkflowGraphData};

/// Result of an execution attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The engine ran the workflow and reported success
    Completed {
        response: ExecutionResponse,
        summary: ProjectionSummary,
    },
    /// The engine reported failure, or the request never completed
    ///
    /// For transport failures `response` is synthesized and nothing was
    /// projected onto the graph.
    Failed {
        error: String,
        response: ExecutionResponse,
        summary: ProjectionSummary,
    },
    /// Validation rejected the graph; no request was sent
    Invalid(ValidationError),
    /// Another run of this session is still in flight
    AlreadyExecuting,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// User-facing error text, if the attempt did not succeed
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error, .. } => Some(error.clone()),
            Self::Invalid(e) => Some(e.to_string()),
            Self::AlreadyExecuting => Some("Workflow is already executing".to_string()),
        }
    }

    /// Collapse into an engine result; every unsuccessful attempt is an error
    pub fn into_result(self) -> Result<ExecutionResponse> {
        match self {
            Self::Completed { response, .. } => Ok(response),
            Self::Invalid(e) => Err(e.into()),
            Self::Failed { error, .. } => Err(EngineError::Execution(error)),
            Self::AlreadyExecuting => Err(EngineError::Execution(
                "Workflow is already executing".to_string(),
            )),
        }
    }
}

/// A run that has been validated and marked in flight
///
/// Returned by [`CanvasSession::begin_execution`]; hand the backend's
/// answer to [`CanvasSession::finish_execution`].
#[derive(Debug, Clone)]
pub struct PendingExecution {
    pub descriptor: ExecutionDescriptor,
    pub warnings: Vec<GraphWarning>,
}

/// Editing state of one canvas
pub struct CanvasSession {
    catalog: NodeCatalog,
    graph: GraphStore,
    config: ConfigCache,
    options: OptionCache,
    panel: Option<FormState>,
    indicator: ExecutionIndicator,
    executing: bool,
    rules: CompilerRules,
    events: Arc<dyn EventSink>,
}

impl CanvasSession {
    /// Create a session with an empty catalog and graph
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self::with_catalog(events, NodeCatalog::new())
    }

    pub fn with_catalog(events: Arc<dyn EventSink>, catalog: NodeCatalog) -> Self {
        Self {
            catalog,
            graph: GraphStore::new(),
            config: ConfigCache::new(),
            options: OptionCache::new(),
            panel: None,
            indicator: ExecutionIndicator::new(),
            executing: false,
            rules: CompilerRules::default(),
            events,
        }
    }

    /// Replace the compiler tables
    pub fn with_rules(mut self, rules: CompilerRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn catalog(&self) -> &NodeCatalog {
        &self.catalog
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn config_cache(&self) -> &ConfigCache {
        &self.config
    }

    pub fn option_cache(&self) -> &OptionCache {
        &self.options
    }

    pub fn indicator(&self) -> &ExecutionIndicator {
        &self.indicator
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn rules(&self) -> &CompilerRules {
        &self.rules
    }

    fn emit(&self, event: CanvasEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Dropping canvas event: {}", e);
        }
    }

    fn structural_edit(&self, change: GraphChange) {
        self.emit(CanvasEvent::graph_changed(change));
    }

    // --- Catalog ---

    /// Reload the node catalog
    ///
    /// On failure the previous catalog stays in place and the error is
    /// returned for display.
    pub async fn refresh_catalog(&mut self, backend: &dyn WorkflowBackend) -> Result<usize> {
        match backend.fetch_catalog().await {
            Ok(data) => {
                self.catalog = NodeCatalog::from_data(data);
                log::info!("Loaded catalog with {} node types", self.catalog.len());
                self.emit(CanvasEvent::CatalogLoaded {
                    node_types: self.catalog.len(),
                });
                Ok(self.catalog.len())
            }
            Err(e) => {
                let message = e.to_string();
                log::warn!("Catalog fetch failed, keeping last known catalog: {}", message);
                self.emit(CanvasEvent::CatalogFetchFailed {
                    error: message.clone(),
                });
                Err(match e {
                    EngineError::SchemaFetch(_) => e,
                    other => EngineError::SchemaFetch(other.to_string()),
                })
            }
        }
    }

    // --- Graph edits ---

    /// Add a node of a catalog type
    pub fn add_node(&mut self, node_type: &str) -> Result<NodeId> {
        let id = self.graph.add_node(&self.catalog, node_type)?;
        self.structural_edit(GraphChange::NodeAdded {
            node_id: id.clone(),
            node_type: node_type.to_string(),
        });
        Ok(id)
    }

    /// Delete a node, its edges, and its panel if open
    pub fn delete_node(&mut self, id: &str) -> bool {
        if !self.graph.delete_node(id) {
            return false;
        }
        if self.panel.as_ref().is_some_and(|form| form.node_id() == id) {
            self.panel = None;
            self.emit(CanvasEvent::PanelClosed {
                node_id: id.to_string(),
                saved: false,
            });
        }
        self.structural_edit(GraphChange::NodeDeleted {
            node_id: id.to_string(),
        });
        true
    }

    pub fn connect(&mut self, connection: Connection) -> Result<EdgeId> {
        let edge_id = self.graph.connect(connection)?;
        self.structural_edit(GraphChange::EdgeAdded {
            edge_id: edge_id.clone(),
        });
        Ok(edge_id)
    }

    pub fn remove_edge(&mut self, id: &str) -> bool {
        if !self.graph.remove_edge(id) {
            return false;
        }
        self.structural_edit(GraphChange::EdgeRemoved {
            edge_id: id.to_string(),
        });
        true
    }

    /// Merge parameter values into a node outside the panel flow
    ///
    /// The node's cache entry is refreshed with the merged map, so a panel
    /// opened later shows these values.
    pub fn update_parameters(&mut self, id: &str, partial: ParameterMap) -> bool {
        if !self.config.merge_commit(&mut self.graph, id, partial) {
            return false;
        }
        self.structural_edit(GraphChange::ParametersUpdated {
            node_id: id.to_string(),
        });
        true
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> bool {
        if !self.graph.set_position(id, position) {
            return false;
        }
        self.structural_edit(GraphChange::NodeMoved {
            node_id: id.to_string(),
        });
        true
    }

    // --- Configuration panel ---

    /// Open the configuration panel of a node
    ///
    /// Any other open panel is abandoned. The form starts from the cached
    /// entry, or the committed parameters when the node was never saved.
    pub fn open_panel(&mut self, id: &str) -> bool {
        let Some(values) = self.config.snapshot_for_panel(&self.graph, id) else {
            log::debug!("open_panel: no node '{}'", id);
            return false;
        };
        let Some(schema) = self.graph.node(id).map(|n| Arc::clone(&n.schema)) else {
            return false;
        };

        if self.panel.as_ref().is_some_and(|form| form.node_id() != id) {
            self.close_panel();
        }
        self.graph.open_panel(id);
        self.panel = Some(FormState::new(id, schema, values));
        self.emit(CanvasEvent::PanelOpened {
            node_id: id.to_string(),
        });
        true
    }

    pub fn panel(&self) -> Option<&FormState> {
        self.panel.as_ref()
    }

    /// Display model of the open panel
    pub fn render_panel(&self) -> Option<Vec<RenderedGroup>> {
        self.panel.as_ref().map(|form| form.render(&self.options))
    }

    pub fn toggle_panel_group(&mut self, group: &str) -> Option<bool> {
        self.panel.as_mut()?.toggle_group(group)
    }

    /// Apply an edit to the open panel
    ///
    /// Dependent fields whose loaded options no longer include their value
    /// are cleared right away.
    pub fn edit_panel(&mut self, field: &str, input: FieldInput) -> bool {
        let Some(form) = self.panel.as_mut() else {
            return false;
        };
        if !form.edit(field, input) {
            return false;
        }
        let reset = form.reconcile(&self.options);
        if !reset.is_empty() {
            let node_id = form.node_id().to_string();
            self.emit(CanvasEvent::FieldsReset {
                node_id,
                fields: reset,
            });
        }
        true
    }

    /// Fetch missing option lists for the open panel
    ///
    /// Returns the fields that were cleared because their value is not in
    /// the loaded options.
    pub async fn resolve_panel_options(&mut self, provider: &dyn OptionsProvider) -> Vec<String> {
        let Some(form) = self.panel.as_mut() else {
            return Vec::new();
        };
        let reset = resolve_options(form, &mut self.options, provider).await;
        if !reset.is_empty() {
            let node_id = form.node_id().to_string();
            self.emit(CanvasEvent::FieldsReset {
                node_id,
                fields: reset.clone(),
            });
        }
        reset
    }

    /// Close the panel, abandoning unsaved edits
    pub fn close_panel(&mut self) {
        if let Some(form) = self.panel.take() {
            self.graph.close_panel();
            self.emit(CanvasEvent::PanelClosed {
                node_id: form.node_id().to_string(),
                saved: false,
            });
        }
    }

    /// Commit the open panel to the cache and the graph, then close it
    ///
    /// Returns `false` when no panel is open or its node has been deleted.
    pub fn save_panel(&mut self) -> bool {
        let Some(form) = self.panel.take() else {
            return false;
        };
        self.graph.close_panel();
        let node_id = form.node_id().to_string();
        let saved = self
            .config
            .commit(&mut self.graph, &node_id, form.into_values());

        self.emit(CanvasEvent::PanelClosed {
            node_id: node_id.clone(),
            saved,
        });
        if saved {
            self.structural_edit(GraphChange::ParametersUpdated { node_id });
        }
        saved
    }

    // --- Compilation & execution ---

    /// Compile the graph, logging structural warnings
    pub fn compile(&self) -> std::result::Result<ExecutionDescriptor, ValidationError> {
        compiler::lint(&self.graph);
        compiler::compile(&self.graph, &self.rules)
    }

    /// Validate the graph and mark a run in flight
    ///
    /// Fails with `AlreadyExecuting` or `Invalid` without changing any state.
    pub fn begin_execution(&mut self) -> std::result::Result<PendingExecution, ExecutionOutcome> {
        if self.executing {
            return Err(ExecutionOutcome::AlreadyExecuting);
        }
        let warnings = compiler::lint(&self.graph);
        let descriptor =
            compiler::compile(&self.graph, &self.rules).map_err(ExecutionOutcome::Invalid)?;

        self.executing = true;
        self.indicator.start(&self.graph);
        self.emit(CanvasEvent::ExecutionStarted {
            node_ids: self.indicator.node_ids().cloned().collect(),
            edge_ids: self.indicator.edge_ids().cloned().collect(),
        });
        log::info!(
            "Submitting workflow with {} nodes and {} edges",
            descriptor.nodes.len(),
            descriptor.edges.len()
        );
        Ok(PendingExecution {
            descriptor,
            warnings,
        })
    }

    /// Finish a run: clear the highlight and project the backend's answer
    pub fn finish_execution(
        &mut self,
        _pending: PendingExecution,
        result: Result<ExecutionResponse>,
    ) -> ExecutionOutcome {
        self.executing = false;
        self.indicator.clear();

        let outcome = match result {
            Ok(response) if response.success => {
                let summary = projector::project(&mut self.graph, &response);
                ExecutionOutcome::Completed { response, summary }
            }
            Ok(response) => {
                let error = response
                    .error
                    .clone()
                    .unwrap_or_else(|| "Execution failed".to_string());
                log::warn!("Backend reported failed execution: {}", error);
                let summary = projector::project(&mut self.graph, &response);
                ExecutionOutcome::Failed {
                    error,
                    response,
                    summary,
                }
            }
            Err(e) => {
                let error = e.to_string();
                log::warn!("Execution request failed: {}", error);
                ExecutionOutcome::Failed {
                    response: ExecutionResponse::failure(error.clone()),
                    error,
                    summary: ProjectionSummary::default(),
                }
            }
        };

        log::info!("Execution finished (success: {})", outcome.is_success());
        self.emit(CanvasEvent::ExecutionFinished {
            success: outcome.is_success(),
            error: outcome.error_message(),
        });
        outcome
    }

    /// Release the in-flight flag of a run whose request was abandoned
    pub fn cancel_execution(&mut self) {
        if self.executing {
            self.executing = false;
            self.indicator.clear();
            self.emit(CanvasEvent::ExecutionFinished {
                success: false,
                error: Some("Execution cancelled".to_string()),
            });
        }
    }

    /// Validate, submit and project one run
    ///
    /// Validation failures return before any request is made. Transport
    /// errors become `ExecutionOutcome::Failed`, so the executing highlight
    /// is always cleared when this returns.
    pub async fn execute(&mut self, backend: &dyn WorkflowBackend) -> ExecutionOutcome {
        let pending = match self.begin_execution() {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        };
        let result = backend.execute(&pending.descriptor).await;
        self.finish_execution(pending, result)
    }

    // --- Persistence ---

    /// Export the graph as a workflow document
    pub fn export_file(&self, name: Option<String>) -> WorkflowFile {
        let file = WorkflowFile::from_graph(&self.graph, name, Utc::now());
        log::info!("Exported workflow '{}'", file.name);
        file
    }

    /// Replace the graph with an imported document
    pub fn import_file(&mut self, file: WorkflowFile) {
        log::info!("Importing workflow '{}'", file.name);
        self.replace_graph(file.into_graph());
    }

    pub async fn save_to_backend(
        &self,
        backend: &dyn WorkflowBackend,
        name: impl Into<String>,
    ) -> Result<Value> {
        let request = SaveWorkflowRequest {
            name: name.into(),
            data: WorkflowGraphData::from_graph(&self.graph),
        };
        let response = backend.save_workflow(&request).await?;
        log::info!("Saved workflow '{}' to backend", request.name);
        Ok(response)
    }

    /// Replace the graph with a workflow stored by the backend
    pub async fn load_from_backend(&mut self, backend: &dyn WorkflowBackend, id: &str) -> Result<()> {
        let stored = backend.load_workflow(id).await?;
        log::info!("Loaded workflow '{}' from backend", id);
        self.replace_graph(stored.data.into_graph());
        Ok(())
    }

    pub async fn list_backend_workflows(
        &self,
        backend: &dyn WorkflowBackend,
    ) -> Result<Vec<WorkflowSummary>> {
        backend.list_workflows().await
    }

    fn replace_graph(&mut self, graph: GraphStore) {
        self.close_panel();
        self.graph = graph;
        self.config.seed_from_graph(&self.graph);
        self.structural_edit(GraphChange::Replaced);
    }
}
