//! Flowboard engine - core of a visual workflow builder
//!
//! Users place nodes from a backend-served schema catalog on a canvas,
//! connect them, configure each node through a schema-driven form, and
//! submit the result to an external execution engine. This crate holds all
//! of that state and logic without doing any I/O of its own:
//!
//! - `NodeCatalog` / `NodeSchema`: read-only node type descriptions
//! - `GraphStore`: nodes, edges and committed parameters
//! - `ConfigCache`: per-node staging of panel edits
//! - `FormState`: schema-driven form with dynamic, dependent option lists
//! - `compile`: graph to `ExecutionDescriptor`, with pre-submission validation
//! - `project`: run results back onto nodes for display
//! - `CanvasSession`: one canvas, tying the above together
//!
//! Network access goes through the `WorkflowBackend` trait.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flowboard_engine::{CanvasSession, Connection, NullEventSink};
//!
//! let mut session = CanvasSession::new(Arc::new(NullEventSink));
//! session.refresh_catalog(&backend).await?;
//! let q = session.add_node("query_node")?;
//! let r = session.add_node("response_node")?;
//! session.connect(Connection::new(&q, "output-result", &r, "input-query"))?;
//! let outcome = session.execute(&backend).await;
//! ```

pub mod backend;
pub mod catalog;
pub mod compiler;
pub mod config_cache;
pub mod error;
pub mod events;
pub mod form;
pub mod graph;
pub mod options;
pub mod projector;
pub mod schema;
pub mod session;
pub mod workflow_file;

// Re-export key types
pub use backend::{
    ExecutionData, ExecutionResponse, SaveWorkflowRequest, StoredWorkflow, WorkflowBackend,
    WorkflowSummary,
};
pub use catalog::{CatalogData, CatalogResponse, NodeCatalog};
pub use compiler::{
    compile, lint, CategoryRole, CompilerRules, ExecutionDescriptor, GraphWarning, ValidationError,
};
pub use config_cache::ConfigCache;
pub use error::{EngineError, Result};
pub use events::{CanvasEvent, EventSink, GraphChange, NullEventSink, VecEventSink};
pub use form::{ComponentKind, FieldInput, FormState, RenderedField, RenderedGroup, Widget};
pub use graph::{Connection, EdgeId, GraphEdge, GraphNode, GraphStore, NodeAnnotations, NodeId, Position};
pub use options::{dependent_reset, OptionCache, OptionKey, OptionSlot, OptionsProvider};
pub use projector::{project, ExecutionIndicator, ProjectionSummary};
pub use schema::{NodeSchema, ParameterMap, ParameterSpec, UiComponent, UiGroup, UiOption};
pub use session::{CanvasSession, ExecutionOutcome, PendingExecution};
pub use workflow_file::{WorkflowFile, WorkflowGraphData};
