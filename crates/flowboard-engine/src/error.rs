//! Error types for the flowboard engine

use thiserror::Error;

use crate::compiler::ValidationError;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while editing, compiling or submitting a workflow
#[derive(Debug, Error)]
pub enum EngineError {
    /// A node was requested for a schema the catalog does not know
    #[error("Unknown node schema: {0}")]
    UnknownSchema(String),

    /// An edge endpoint references a node that does not exist
    #[error("Cannot connect to missing node '{node_id}'")]
    DanglingEdge { node_id: String },

    /// Pre-submission validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The catalog or a dynamic option list could not be fetched
    #[error("Schema fetch failed: {0}")]
    SchemaFetch(String),

    /// The execution engine rejected or failed the run
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Any other backend transport or persistence failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a backend error with a message
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a schema fetch error with a message
    pub fn schema_fetch(msg: impl Into<String>) -> Self {
        Self::SchemaFetch(msg.into())
    }

    /// Whether this error came from pre-submission validation
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
