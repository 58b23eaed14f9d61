//! Node schema types
//!
//! These types mirror the declarative node descriptions served by the
//! backend catalog: ports, parameters, styling and the optional UI layout
//! used by the configuration form. Schemas are immutable once loaded and
//! are shared between node instances through `Arc<NodeSchema>`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter values keyed by parameter name
pub type ParameterMap = Map<String, Value>;

/// Whether a parameter value counts as unset
///
/// Absent, `null`, `""` and `[]` are all blank.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Definition of an input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPort {
    /// Port name (e.g., "query")
    pub name: String,
    /// Declared data type, as reported by the backend
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// Definition of an output port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPort {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
}

/// Definition of a configurable parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name, also the key in a node's parameter map
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Declared default. A JSON `null` default is treated as no default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Static choices, if the parameter is an enumeration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl ParameterSpec {
    /// Create a required parameter without a default
    pub fn required(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: String::new(),
            required: true,
            default_value: None,
            options: None,
        }
    }

    /// Create an optional parameter without a default
    pub fn optional(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, data_type)
        }
    }

    /// Set a default value for this parameter
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Presentation hints for a node on the canvas
///
/// Only the commonly used keys are typed; anything else the backend sends
/// is kept in `extra` so styling survives export and import unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStyling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A selectable option in a select, multi-select or radio component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl UiOption {
    /// Create an option whose label equals its value
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
            disabled: false,
        }
    }
}

/// Marker declaring that a component's options are fetched at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsSource {
    /// Option family served by the backend (e.g., "models")
    pub family: String,
    /// Name of the field whose current value selects the option set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
}

/// A single declarative form component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiComponent {
    /// Raw component tag (e.g., "text_input", "select")
    #[serde(rename = "type")]
    pub component_type: String,
    /// Parameter this component is bound to
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    #[serde(default)]
    pub multiple: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<UiOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_source: Option<OptionsSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unchecked_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,

    /// Presentation keys the engine does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_visible() -> bool {
    true
}

impl UiComponent {
    /// Create a component with the given tag and binding and no constraints
    pub fn new(component_type: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            component_type: component_type.into(),
            label: name.clone(),
            name,
            description: None,
            required: false,
            default_value: None,
            placeholder: None,
            disabled: false,
            visible: true,
            rows: None,
            min_length: None,
            max_length: None,
            pattern: None,
            min_value: None,
            max_value: None,
            step: None,
            min_date: None,
            max_date: None,
            max_selections: None,
            accept: None,
            multiple: false,
            options: None,
            options_source: None,
            checked_value: None,
            unchecked_value: None,
            on_value: None,
            off_value: None,
            text: None,
            button_text: None,
            extra: Map::new(),
        }
    }
}

/// A titled group of form components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiGroup {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub components: Vec<UiComponent>,
    #[serde(default)]
    pub collapsible: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declarative configuration form for a node type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUiConfig {
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub groups: Vec<UiGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Backend-declared description of a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    /// Unique type key (e.g., "query_node")
    pub node_id: String,
    /// Display name (e.g., "QueryNode")
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<InputPort>,
    #[serde(default)]
    pub outputs: Vec<OutputPort>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub styling: NodeStyling,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_config: Option<NodeUiConfig>,
}

impl NodeSchema {
    /// Create a schema with no ports or parameters
    pub fn new(node_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            name: name.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
            styling: NodeStyling::default(),
            ui_config: None,
        }
    }

    /// Add a parameter definition
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Add an input port
    pub fn with_input(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            data_type: data_type.into(),
            description: String::new(),
            required: false,
            default_value: None,
        });
        self
    }

    /// Add an output port
    pub fn with_output(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.outputs.push(OutputPort {
            name: name.into(),
            data_type: data_type.into(),
            description: String::new(),
        });
        self
    }

    /// Attach a UI layout
    pub fn with_ui_config(mut self, ui_config: NodeUiConfig) -> Self {
        self.ui_config = Some(ui_config);
        self
    }

    /// Find a parameter definition by name
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameter map seeded from declared defaults
    ///
    /// Parameters without a default are absent from the map, never null.
    pub fn default_parameters(&self) -> ParameterMap {
        self.parameters
            .iter()
            .filter_map(|p| p.default_value.clone().map(|v| (p.name.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_parameters_skip_missing_and_null_defaults() {
        let schema: NodeSchema = serde_json::from_value(json!({
            "node_id": "llm",
            "name": "LanguageModelNode",
            "parameters": [
                {"name": "service", "type": "string", "required": true, "default_value": "openai"},
                {"name": "model", "type": "string", "required": true},
                {"name": "temperature", "type": "float", "default_value": null},
                {"name": "max_tokens", "type": "int", "default_value": 0}
            ]
        }))
        .unwrap();

        let defaults = schema.default_parameters();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults["service"], "openai");
        assert_eq!(defaults["max_tokens"], 0);
        assert!(!defaults.contains_key("model"));
        assert!(!defaults.contains_key("temperature"));
    }

    #[test]
    fn test_blank_values() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&Value::Null)));
        assert!(is_blank(Some(&json!(""))));
        assert!(is_blank(Some(&json!([]))));
        assert!(!is_blank(Some(&json!(0))));
        assert!(!is_blank(Some(&json!(false))));
        assert!(!is_blank(Some(&json!(" "))));
    }

    #[test]
    fn test_component_visible_defaults_to_true() {
        let component: UiComponent =
            serde_json::from_value(json!({"type": "text_input", "name": "query"})).unwrap();
        assert!(component.visible);
        assert!(!component.required);
    }

    #[test]
    fn test_styling_preserves_unknown_keys() {
        let styling: NodeStyling = serde_json::from_value(json!({
            "icon": "🔎",
            "html_template": "<div/>"
        }))
        .unwrap();
        assert_eq!(styling.icon.as_deref(), Some("🔎"));

        let json = serde_json::to_value(&styling).unwrap();
        assert_eq!(json["html_template"], "<div/>");
        assert!(json.get("background_color").is_none());
    }
}
