//! Events emitted by a canvas session
//!
//! Each session owns its sink, so listeners only ever see the events of
//! the canvas they subscribed to.

use serde::{Deserialize, Serialize};

use crate::graph::{EdgeId, NodeId};

/// Trait for receiving session events
///
/// This abstracts over the transport mechanism (UI channel, mpsc, log, etc.)
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: CanvasEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

/// Structural change applied to the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GraphChange {
    #[serde(rename_all = "camelCase")]
    NodeAdded { node_id: NodeId, node_type: String },
    #[serde(rename_all = "camelCase")]
    NodeDeleted { node_id: NodeId },
    #[serde(rename_all = "camelCase")]
    EdgeAdded { edge_id: EdgeId },
    #[serde(rename_all = "camelCase")]
    EdgeRemoved { edge_id: EdgeId },
    #[serde(rename_all = "camelCase")]
    ParametersUpdated { node_id: NodeId },
    #[serde(rename_all = "camelCase")]
    NodeMoved { node_id: NodeId },
    /// The whole graph was replaced (import, load)
    Replaced,
}

/// Events emitted by a canvas session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CanvasEvent {
    /// A fresh catalog was loaded
    #[serde(rename_all = "camelCase")]
    CatalogLoaded { node_types: usize },

    /// The catalog could not be fetched; the previous one is kept
    #[serde(rename_all = "camelCase")]
    CatalogFetchFailed { error: String },

    #[serde(rename_all = "camelCase")]
    GraphChanged { change: GraphChange },

    #[serde(rename_all = "camelCase")]
    PanelOpened { node_id: NodeId },

    /// The panel closed; `saved` is false when edits were abandoned
    #[serde(rename_all = "camelCase")]
    PanelClosed { node_id: NodeId, saved: bool },

    /// Dependent fields were cleared after their options reloaded
    #[serde(rename_all = "camelCase")]
    FieldsReset { node_id: NodeId, fields: Vec<String> },

    #[serde(rename_all = "camelCase")]
    ExecutionStarted {
        node_ids: Vec<NodeId>,
        edge_ids: Vec<EdgeId>,
    },

    #[serde(rename_all = "camelCase")]
    ExecutionFinished {
        success: bool,
        error: Option<String>,
    },
}

impl CanvasEvent {
    pub fn graph_changed(change: GraphChange) -> Self {
        Self::GraphChanged { change }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: CanvasEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<CanvasEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<CanvasEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: CanvasEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
        Ok(())
    }
}
