//! Node schema catalog
//!
//! The catalog is the read-only set of node types served by the backend.
//! Lookups hand out `Arc<NodeSchema>` so every node instance of a type
//! shares one immutable schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::NodeSchema;

/// Payload of the catalog endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogData {
    /// Node type keys in backend display order
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Schemas keyed by node type
    #[serde(default)]
    pub schemas: BTreeMap<String, NodeSchema>,
    #[serde(default)]
    pub total_count: usize,
}

/// Envelope returned by `GET /api/v1/nodes/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub success: bool,
    #[serde(default)]
    pub data: CatalogData,
}

/// Read-only registry of node schemas
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    schemas: BTreeMap<String, Arc<NodeSchema>>,
    order: Vec<String>,
}

impl NodeCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the backend payload
    ///
    /// Types listed in `nodes` keep their order; schemas not listed there
    /// are appended in key order.
    pub fn from_data(data: CatalogData) -> Self {
        let mut catalog = Self::new();
        let mut schemas = data.schemas;
        for key in &data.nodes {
            if let Some(schema) = schemas.remove(key) {
                catalog.insert_keyed(key.clone(), schema);
            } else {
                log::warn!("Catalog lists node type '{}' without a schema", key);
            }
        }
        for (key, schema) in schemas {
            catalog.insert_keyed(key, schema);
        }
        catalog
    }

    /// Register a schema under its own `node_id`
    pub fn insert(&mut self, schema: NodeSchema) {
        let key = schema.node_id.clone();
        self.insert_keyed(key, schema);
    }

    fn insert_keyed(&mut self, key: String, schema: NodeSchema) {
        if !self.schemas.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.schemas.insert(key, Arc::new(schema));
    }

    /// Look up a schema by node type key
    pub fn get(&self, node_type: &str) -> Option<Arc<NodeSchema>> {
        self.schemas.get(node_type).cloned()
    }

    /// Check if a node type is registered
    pub fn contains(&self, node_type: &str) -> bool {
        self.schemas.contains_key(node_type)
    }

    /// Node type keys in display order
    pub fn node_types(&self) -> &[String] {
        &self.order
    }

    /// Schemas in display order
    pub fn schemas(&self) -> impl Iterator<Item = &Arc<NodeSchema>> + '_ {
        self.order.iter().filter_map(|key| self.schemas.get(key))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_response_keeps_listed_order() {
        let response: CatalogResponse = serde_json::from_value(json!({
            "success": true,
            "data": {
                "nodes": ["response_node", "query_node"],
                "schemas": {
                    "query_node": {"node_id": "query_node", "name": "QueryNode"},
                    "response_node": {"node_id": "response_node", "name": "ResponseNode"},
                    "extra_node": {"node_id": "extra_node", "name": "ExtraNode"}
                },
                "total_count": 3
            }
        }))
        .unwrap();

        let catalog = NodeCatalog::from_data(response.data);
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.node_types(),
            &["response_node", "query_node", "extra_node"]
        );
        assert_eq!(catalog.get("query_node").unwrap().name, "QueryNode");
    }

    #[test]
    fn test_lookups_share_one_schema() {
        let mut catalog = NodeCatalog::new();
        catalog.insert(NodeSchema::new("query_node", "QueryNode"));

        let a = catalog.get("query_node").unwrap();
        let b = catalog.get("query_node").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_missing_data_is_empty_catalog() {
        let response: CatalogResponse =
            serde_json::from_value(json!({"success": false})).unwrap();
        assert!(NodeCatalog::from_data(response.data).is_empty());
    }
}
