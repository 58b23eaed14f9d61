//! Subcommand implementations
//!
//! Each command drives a headless [`CanvasSession`] and writes its
//! report to the given writer.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use flowboard_engine::{
    CanvasSession, EngineError, NullEventSink, ValidationError, WorkflowBackend, WorkflowFile,
};
use flowboard_http_adapter::HttpAdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid workflow: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Backend(#[from] HttpAdapterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code; validation failures are distinguished from the rest
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Engine(e) if e.is_validation() => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

fn new_session() -> CanvasSession {
    CanvasSession::new(Arc::new(NullEventSink))
}

async fn read_workflow(path: &Path) -> Result<WorkflowFile> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(WorkflowFile::from_json(&content)?)
}

async fn open_session(path: &Path) -> Result<(CanvasSession, String)> {
    let file = read_workflow(path).await?;
    let name = file.name.clone();
    let mut session = new_session();
    session.import_file(file);
    Ok((session, name))
}

pub async fn compile(path: &Path, out: &mut dyn Write) -> Result<()> {
    let (session, _) = open_session(path).await?;
    let descriptor = session.compile()?;
    writeln!(
        out,
        "{}",
        serde_json::to_string_pretty(&descriptor).map_err(EngineError::from)?
    )?;
    Ok(())
}

pub async fn catalog(backend: &dyn WorkflowBackend, out: &mut dyn Write) -> Result<()> {
    let mut session = new_session();
    session.refresh_catalog(backend).await?;
    for node_type in session.catalog().node_types() {
        if let Some(schema) = session.catalog().get(node_type) {
            writeln!(out, "{}\t{}\t{}", node_type, schema.name, schema.description)?;
        }
    }
    Ok(())
}

pub async fn run(path: &Path, backend: &dyn WorkflowBackend, out: &mut dyn Write) -> Result<()> {
    let (mut session, _) = open_session(path).await?;
    let outcome = session.execute(backend).await;

    for node in session.graph().nodes() {
        let annotations = &node.annotations;
        if let Some(content) = &annotations.response_content {
            writeln!(out, "{} [{}]: {}", node.id, node.node_type(), content)?;
        }
        if let Some(error) = &annotations.error {
            writeln!(out, "{} [{}] error: {}", node.id, node.node_type(), error)?;
        }
    }

    outcome.into_result()?;
    Ok(())
}

pub async fn push(
    path: &Path,
    name: Option<String>,
    backend: &dyn WorkflowBackend,
    out: &mut dyn Write,
) -> Result<()> {
    let (session, file_name) = open_session(path).await?;
    let name = name.unwrap_or(file_name);
    let response = session.save_to_backend(backend, name.as_str()).await?;
    match response.get("id") {
        Some(id) => writeln!(out, "Saved '{}' as {}", name, id)?,
        None => writeln!(out, "Saved '{}'", name)?,
    }
    Ok(())
}

pub async fn pull(
    id: &str,
    output: &Path,
    backend: &dyn WorkflowBackend,
    out: &mut dyn Write,
) -> Result<()> {
    let mut session = new_session();
    session.load_from_backend(backend, id).await?;
    let file = session.export_file(None);
    tokio::fs::write(output, file.to_json_pretty()?).await?;
    writeln!(
        out,
        "Wrote {} nodes and {} edges to {}",
        file.nodes.len(),
        file.edges.len(),
        output.display()
    )?;
    Ok(())
}

pub async fn list(backend: &dyn WorkflowBackend, out: &mut dyn Write) -> Result<()> {
    let session = new_session();
    for summary in session.list_backend_workflows(backend).await? {
        writeln!(
            out,
            "{}\t{}\t{}",
            summary.id_text(),
            summary.name,
            summary.created_at.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}
