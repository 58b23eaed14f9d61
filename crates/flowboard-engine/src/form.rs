//! Schema-driven configuration form
//!
//! A [`FormState`] is the editable copy of one node's parameters while its
//! configuration panel is open. The layout comes from the schema's
//! `ui_config`; schemas without one get a plain layout derived from their
//! parameter list.
//!
//! Each component tag maps to a [`ComponentKind`]. Tags the engine does not
//! know become [`ComponentKind::Unsupported`]: the field is still rendered
//! and its value is kept as-is, only the editor degrades.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::graph::NodeId;
use crate::options::{dependent_reset, option_text, OptionCache, OptionKey, OptionSlot, OptionsProvider};
use crate::schema::{is_blank, NodeSchema, OptionsSource, ParameterMap, UiComponent, UiGroup, UiOption};

/// Declared kind of a form component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    TextInput,
    Textarea,
    Select,
    MultiSelect,
    Checkbox,
    Radio,
    NumberInput,
    Slider,
    ColorPicker,
    FileUpload,
    DatePicker,
    Label,
    Divider,
    Button,
    Toggle,
    /// Tag the engine cannot edit; the raw tag is kept for display
    Unsupported(String),
}

impl ComponentKind {
    /// Parse a component tag
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "text_input" => Self::TextInput,
            "textarea" => Self::Textarea,
            "select" => Self::Select,
            "multi_select" => Self::MultiSelect,
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "number_input" => Self::NumberInput,
            "slider" => Self::Slider,
            "color_picker" => Self::ColorPicker,
            "file_upload" => Self::FileUpload,
            "date_picker" => Self::DatePicker,
            "label" => Self::Label,
            "divider" => Self::Divider,
            "button" => Self::Button,
            "toggle" => Self::Toggle,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Components that never hold a parameter value
    pub fn is_display_only(&self) -> bool {
        matches!(self, Self::Label | Self::Divider | Self::Button)
    }

    /// Components that choose from an option list
    pub fn is_select_like(&self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect | Self::Radio)
    }
}

/// A user edit delivered to a form field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    /// Typed or chosen text (text, textarea, select, radio, color, date,
    /// and the raw text of a number input)
    Text(String),
    /// A numeric value (number input, slider)
    Number(f64),
    /// Checkbox state
    Checked(bool),
    /// Flip a toggle
    Toggle,
    /// Chosen values of a multi-select
    Selections(Vec<String>),
    /// Names of uploaded files
    Files(Vec<String>),
    /// Replace the value verbatim; the only edit an unsupported field takes
    Raw(Value),
}

/// Current options of a select-like widget
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "options", rename_all = "snake_case")]
pub enum OptionState {
    /// Options declared in the schema
    Static(Vec<UiOption>),
    /// Dynamic options not requested yet (e.g., the controlling field is empty)
    NotRequested,
    Loading,
    Ready(Vec<UiOption>),
    Failed(String),
}

impl OptionState {
    pub fn options(&self) -> &[UiOption] {
        match self {
            Self::Static(options) | Self::Ready(options) => options,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Editor for one field, carrying its current value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    TextInput { value: String },
    Textarea { value: String, rows: u32 },
    Select { value: String, options: OptionState },
    MultiSelect {
        values: Vec<String>,
        options: OptionState,
        max_selections: Option<usize>,
    },
    Radio { value: String, options: OptionState },
    Checkbox { checked: bool },
    Toggle { on: bool },
    NumberInput {
        value: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    Slider { value: f64, min: f64, max: f64, step: f64 },
    ColorPicker { value: String },
    FileUpload {
        files: Vec<String>,
        accept: Option<String>,
        multiple: bool,
    },
    DatePicker { value: String },
    Label { text: String },
    Divider,
    Button { text: String },
    Unsupported { tag: String, value: Option<Value> },
}

/// A field ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedField {
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub disabled: bool,
    pub widget: Widget,
}

/// A group ready for display; collapsed groups carry no fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedGroup {
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub collapsible: bool,
    pub collapsed: bool,
    pub fields: Vec<RenderedField>,
}

/// Advisory constraint violation on a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

const SLIDER_MIN: f64 = 0.0;
const SLIDER_MAX: f64 = 100.0;
const SLIDER_STEP: f64 = 1.0;
const TEXTAREA_ROWS: u32 = 3;

/// Editable parameters of one node while its panel is open
#[derive(Debug, Clone)]
pub struct FormState {
    node_id: NodeId,
    schema: Arc<NodeSchema>,
    groups: Vec<UiGroup>,
    values: ParameterMap,
    collapsed: HashMap<String, bool>,
    dirty: bool,
}

impl FormState {
    /// Open a form over the given parameter values
    pub fn new(node_id: impl Into<NodeId>, schema: Arc<NodeSchema>, values: ParameterMap) -> Self {
        let groups = match &schema.ui_config {
            Some(ui) if !ui.groups.is_empty() => ui.groups.clone(),
            _ => derived_layout(&schema),
        };
        let collapsed = groups
            .iter()
            .map(|g| (g.name.clone(), g.collapsed))
            .collect();

        Self {
            node_id: node_id.into(),
            schema,
            groups,
            values,
            collapsed,
            dirty: false,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn schema(&self) -> &Arc<NodeSchema> {
        &self.schema
    }

    pub fn groups(&self) -> &[UiGroup] {
        &self.groups
    }

    /// Parameter values as edited so far
    pub fn values(&self) -> &ParameterMap {
        &self.values
    }

    pub fn into_values(self) -> ParameterMap {
        self.values
    }

    /// Whether any edit or reset happened since the form was opened
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn component(&self, name: &str) -> Option<&UiComponent> {
        self.groups
            .iter()
            .flat_map(|g| g.components.iter())
            .find(|c| c.name == name && !ComponentKind::from_tag(&c.component_type).is_display_only())
    }

    fn components(&self) -> impl Iterator<Item = &UiComponent> + '_ {
        self.groups.iter().flat_map(|g| g.components.iter())
    }

    /// Effective value of a field: the edited value, else the component default
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .get(name)
            .or_else(|| self.component(name).and_then(|c| c.default_value.as_ref()))
    }

    /// Apply a user edit to a field
    ///
    /// Returns `false` when the field is unknown, display-only, or the input
    /// does not fit the component kind; the value is left unchanged then.
    pub fn edit(&mut self, name: &str, input: FieldInput) -> bool {
        let Some(component) = self.component(name) else {
            log::debug!("edit: no field '{}' on node '{}'", name, self.node_id);
            return false;
        };
        let kind = ComponentKind::from_tag(&component.component_type);
        let next = map_input(&kind, component, self.value(name), input);

        match next {
            Some(value) => {
                self.values.insert(name.to_string(), value);
                self.dirty = true;
                true
            }
            None => {
                log::debug!("edit: input does not fit field '{}' ({:?})", name, kind);
                false
            }
        }
    }

    pub fn is_collapsed(&self, group: &str) -> bool {
        self.collapsed.get(group).copied().unwrap_or(false)
    }

    /// Flip a collapsible group; returns the new collapsed state
    pub fn toggle_group(&mut self, group: &str) -> Option<bool> {
        let collapsible = self.groups.iter().any(|g| g.name == group && g.collapsible);
        if !collapsible {
            return None;
        }
        let state = self.collapsed.entry(group.to_string()).or_insert(false);
        *state = !*state;
        Some(*state)
    }

    /// Option source of a component, if its choices are fetched at runtime
    fn dynamic_source(component: &UiComponent) -> Option<OptionsSource> {
        if let Some(source) = &component.options_source {
            return Some(source.clone());
        }
        let kind = ComponentKind::from_tag(&component.component_type);
        if !kind.is_select_like() || component.options.as_ref().is_some_and(|o| !o.is_empty()) {
            return None;
        }
        // Layouts without an explicit marker rely on these field names
        match component.name.as_str() {
            "model" => Some(OptionsSource {
                family: "models".to_string(),
                depends_on: Some("service".to_string()),
            }),
            "collection_name" => Some(OptionsSource {
                family: "collections".to_string(),
                depends_on: None,
            }),
            _ => None,
        }
    }

    /// Cache key a dynamic component needs right now
    ///
    /// `None` when the component has static options or its controlling
    /// field is still empty.
    pub fn option_key(&self, component: &UiComponent) -> Option<OptionKey> {
        let source = Self::dynamic_source(component)?;
        match &source.depends_on {
            Some(field) => {
                let value = self.value(field).and_then(option_text).filter(|v| !v.is_empty())?;
                Some(OptionKey::dependent(source.family, value))
            }
            None => Some(OptionKey::independent(source.family)),
        }
    }

    /// Keys of visible dynamic fields that have not been requested yet
    pub fn missing_option_keys(&self, cache: &OptionCache) -> Vec<OptionKey> {
        let mut seen = HashSet::new();
        self.components()
            .filter(|c| c.visible)
            .filter_map(|c| self.option_key(c))
            .filter(|key| cache.slot(key).is_none())
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Reset dependent fields whose value left their loaded option set
    ///
    /// Returns the names of the fields that were reset to `""`.
    pub fn reconcile(&mut self, cache: &OptionCache) -> Vec<String> {
        let mut stale = Vec::new();
        for component in self.components() {
            let Some(source) = Self::dynamic_source(component) else {
                continue;
            };
            if source.depends_on.is_none() {
                continue;
            }
            let Some(key) = self.option_key(component) else {
                continue;
            };
            if dependent_reset(self.value(&component.name), cache.slot(&key)) {
                stale.push(component.name.clone());
            }
        }

        for name in &stale {
            log::debug!("Resetting '{}' on node '{}': value no longer offered", name, self.node_id);
            self.values.insert(name.clone(), Value::String(String::new()));
            self.dirty = true;
        }
        stale
    }

    fn option_state(&self, component: &UiComponent, cache: &OptionCache) -> OptionState {
        if Self::dynamic_source(component).is_none() {
            return OptionState::Static(component.options.clone().unwrap_or_default());
        }
        let Some(key) = self.option_key(component) else {
            return OptionState::NotRequested;
        };
        match cache.slot(&key) {
            None => OptionState::NotRequested,
            Some(OptionSlot::Loading) => OptionState::Loading,
            Some(OptionSlot::Ready(options)) => OptionState::Ready(options.clone()),
            Some(OptionSlot::Failed(message)) => OptionState::Failed(message.clone()),
        }
    }

    fn widget(&self, component: &UiComponent, cache: &OptionCache) -> Widget {
        let kind = ComponentKind::from_tag(&component.component_type);
        let value = self.value(&component.name);
        let text = || value.and_then(option_text).unwrap_or_default();

        match kind {
            ComponentKind::TextInput => Widget::TextInput { value: text() },
            ComponentKind::Textarea => Widget::Textarea {
                value: text(),
                rows: component.rows.unwrap_or(TEXTAREA_ROWS),
            },
            ComponentKind::Select => Widget::Select {
                value: text(),
                options: self.option_state(component, cache),
            },
            ComponentKind::MultiSelect => Widget::MultiSelect {
                values: string_list(value),
                options: self.option_state(component, cache),
                max_selections: component.max_selections,
            },
            ComponentKind::Radio => Widget::Radio {
                value: text(),
                options: self.option_state(component, cache),
            },
            ComponentKind::Checkbox => Widget::Checkbox {
                checked: value == Some(&checked_value(component)),
            },
            ComponentKind::Toggle => Widget::Toggle {
                on: value == Some(&on_value(component)),
            },
            ComponentKind::NumberInput => Widget::NumberInput {
                value: value.and_then(Value::as_f64),
                min: component.min_value,
                max: component.max_value,
                step: component.step,
            },
            ComponentKind::Slider => {
                let (min, max) = slider_bounds(component);
                Widget::Slider {
                    value: value.and_then(Value::as_f64).unwrap_or(min).clamp(min, max),
                    min,
                    max,
                    step: component.step.unwrap_or(SLIDER_STEP),
                }
            }
            ComponentKind::ColorPicker => Widget::ColorPicker { value: text() },
            ComponentKind::FileUpload => Widget::FileUpload {
                files: string_list(value),
                accept: component.accept.clone(),
                multiple: component.multiple,
            },
            ComponentKind::DatePicker => Widget::DatePicker { value: text() },
            ComponentKind::Label => Widget::Label {
                text: component.text.clone().unwrap_or_else(|| component.label.clone()),
            },
            ComponentKind::Divider => Widget::Divider,
            ComponentKind::Button => Widget::Button {
                text: component
                    .button_text
                    .clone()
                    .unwrap_or_else(|| component.label.clone()),
            },
            ComponentKind::Unsupported(tag) => Widget::Unsupported {
                tag,
                value: value.cloned(),
            },
        }
    }

    /// Build the display model of the form
    pub fn render(&self, cache: &OptionCache) -> Vec<RenderedGroup> {
        self.groups
            .iter()
            .map(|group| {
                let collapsed = self.is_collapsed(&group.name);
                let fields = if collapsed {
                    Vec::new()
                } else {
                    group
                        .components
                        .iter()
                        .filter(|c| c.visible)
                        .map(|c| RenderedField {
                            name: c.name.clone(),
                            label: c.label.clone(),
                            description: c.description.clone(),
                            placeholder: c.placeholder.clone(),
                            required: c.required,
                            disabled: c.disabled,
                            widget: self.widget(c, cache),
                        })
                        .collect()
                };
                RenderedGroup {
                    name: group.name.clone(),
                    label: group.label.clone(),
                    description: group.description.clone(),
                    collapsible: group.collapsible,
                    collapsed,
                    fields,
                }
            })
            .collect()
    }

    /// Check declared constraints of every visible field
    pub fn validate(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        for component in self.components().filter(|c| c.visible) {
            let kind = ComponentKind::from_tag(&component.component_type);
            if kind.is_display_only() {
                continue;
            }
            let value = self.value(&component.name);
            let mut violate = |message: String| {
                violations.push(FieldViolation {
                    field: component.name.clone(),
                    message,
                })
            };

            if is_blank(value) {
                if component.required {
                    violate(format!("{} is required", component.label));
                }
                continue;
            }

            if let Some(Value::String(s)) = value {
                let len = s.chars().count();
                if let Some(min) = component.min_length.filter(|min| len < *min) {
                    violate(format!("{} must be at least {} characters", component.label, min));
                }
                if let Some(max) = component.max_length.filter(|max| len > *max) {
                    violate(format!("{} must be at most {} characters", component.label, max));
                }
                if let Some(pattern) = &component.pattern {
                    match regex::Regex::new(pattern) {
                        Ok(re) if !re.is_match(s) => {
                            violate(format!("{} has an invalid format", component.label))
                        }
                        Ok(_) => {}
                        Err(e) => log::debug!("Ignoring invalid pattern on '{}': {}", component.name, e),
                    }
                }
            }

            if let Some(n) = value.and_then(Value::as_f64) {
                if let Some(min) = component.min_value.filter(|min| n < *min) {
                    violate(format!("{} must be at least {}", component.label, min));
                }
                if let Some(max) = component.max_value.filter(|max| n > *max) {
                    violate(format!("{} must be at most {}", component.label, max));
                }
            }
        }
        violations
    }
}

/// Fetch every missing option list for an open form, then reconcile it
///
/// Each result is stored under its own key, so the order of completions
/// is irrelevant. Returns the fields that were reset.
pub async fn resolve_options(
    form: &mut FormState,
    cache: &mut OptionCache,
    provider: &dyn OptionsProvider,
) -> Vec<String> {
    for key in form.missing_option_keys(cache) {
        if !cache.begin_fetch(&key) {
            continue;
        }
        let outcome = provider
            .fetch_options(&key)
            .await
            .map_err(|e| e.to_string());
        cache.complete(key, outcome);
    }
    form.reconcile(cache)
}

/// Layout used for schemas that declare no UI groups
fn derived_layout(schema: &NodeSchema) -> Vec<UiGroup> {
    if schema.parameters.is_empty() {
        return Vec::new();
    }
    let components = schema
        .parameters
        .iter()
        .map(|param| {
            let tag = match (param.options.as_ref(), param.data_type.as_str()) {
                (Some(_), _) => "select",
                (None, "bool" | "boolean") => "checkbox",
                (None, "int" | "integer" | "float" | "number") => "number_input",
                _ => "text_input",
            };
            let mut component = UiComponent::new(tag, param.name.clone());
            component.required = param.required;
            component.default_value = param.default_value.clone();
            if !param.description.is_empty() {
                component.description = Some(param.description.clone());
            }
            component.options = param
                .options
                .as_ref()
                .map(|opts| opts.iter().map(UiOption::plain).collect());
            component
        })
        .collect();

    vec![UiGroup {
        name: "parameters".to_string(),
        label: "Parameters".to_string(),
        description: None,
        components,
        collapsible: false,
        collapsed: false,
        extra: Default::default(),
    }]
}

/// Map a user edit to the parameter value a component stores
fn map_input(
    kind: &ComponentKind,
    component: &UiComponent,
    current: Option<&Value>,
    input: FieldInput,
) -> Option<Value> {
    if kind.is_display_only() {
        return None;
    }
    match (kind, input) {
        (_, FieldInput::Raw(value)) => Some(value),
        (
            ComponentKind::TextInput
            | ComponentKind::Textarea
            | ComponentKind::Select
            | ComponentKind::Radio
            | ComponentKind::ColorPicker
            | ComponentKind::DatePicker,
            FieldInput::Text(text),
        ) => Some(Value::String(text)),
        (ComponentKind::NumberInput, FieldInput::Text(text)) => Some(number_value(parse_number(&text))),
        (ComponentKind::NumberInput, FieldInput::Number(n)) => {
            Some(number_value(if n.is_finite() { n } else { 0.0 }))
        }
        (ComponentKind::Slider, FieldInput::Number(n)) => Some(number_value(clamp_slider(component, n))),
        (ComponentKind::Slider, FieldInput::Text(text)) => {
            Some(number_value(clamp_slider(component, parse_number(&text))))
        }
        (ComponentKind::Checkbox, FieldInput::Checked(checked)) => Some(if checked {
            checked_value(component)
        } else {
            component.unchecked_value.clone().unwrap_or(Value::Bool(false))
        }),
        (ComponentKind::Toggle, FieldInput::Toggle) => {
            let on = on_value(component);
            Some(if current == Some(&on) {
                component.off_value.clone().unwrap_or(Value::Bool(false))
            } else {
                on
            })
        }
        (ComponentKind::Toggle, FieldInput::Checked(state)) => Some(if state {
            on_value(component)
        } else {
            component.off_value.clone().unwrap_or(Value::Bool(false))
        }),
        (ComponentKind::MultiSelect, FieldInput::Selections(mut values)) => {
            if let Some(max) = component.max_selections {
                values.truncate(max);
            }
            Some(Value::Array(values.into_iter().map(Value::String).collect()))
        }
        (ComponentKind::FileUpload, FieldInput::Files(mut names)) => {
            if !component.multiple {
                names.truncate(1);
            }
            Some(Value::Array(names.into_iter().map(Value::String).collect()))
        }
        _ => None,
    }
}

fn parse_number(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Store whole numbers as integers so they serialize the way they were typed
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}

fn slider_bounds(component: &UiComponent) -> (f64, f64) {
    let min = component.min_value.unwrap_or(SLIDER_MIN);
    let max = component.max_value.unwrap_or(SLIDER_MAX).max(min);
    (min, max)
}

fn clamp_slider(component: &UiComponent, n: f64) -> f64 {
    let (min, max) = slider_bounds(component);
    if n.is_finite() {
        n.clamp(min, max)
    } else {
        min
    }
}

fn checked_value(component: &UiComponent) -> Value {
    component.checked_value.clone().unwrap_or(Value::Bool(true))
}

fn on_value(component: &UiComponent) -> Value {
    component.on_value.clone().unwrap_or(Value::Bool(true))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(option_text).collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, Result};
    use crate::schema::{NodeUiConfig, ParameterSpec};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn component(tag: &str, name: &str) -> UiComponent {
        UiComponent::new(tag, name)
    }

    fn llm_schema() -> Arc<NodeSchema> {
        let mut service = component("select", "service");
        service.options = Some(vec![UiOption::plain("openai"), UiOption::plain("ollama")]);
        let model = component("select", "model");

        let mut temperature = component("slider", "temperature");
        temperature.min_value = Some(0.0);
        temperature.max_value = Some(2.0);

        let mut advanced = UiGroup {
            name: "advanced".into(),
            label: "Advanced".into(),
            description: None,
            components: vec![temperature, component("sparkline", "history")],
            collapsible: true,
            collapsed: true,
            extra: Default::default(),
        };
        advanced.components.push(component("divider", ""));

        let ui = NodeUiConfig {
            node_id: "llm".into(),
            node_name: "LanguageModelNode".into(),
            groups: vec![
                UiGroup {
                    name: "model".into(),
                    label: "Model".into(),
                    description: None,
                    components: vec![service, model],
                    collapsible: false,
                    collapsed: false,
                    extra: Default::default(),
                },
                advanced,
            ],
            ..Default::default()
        };
        Arc::new(NodeSchema::new("llm", "LanguageModelNode").with_ui_config(ui))
    }

    fn values(pairs: &[(&str, Value)]) -> ParameterMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_component_tags_map_to_kinds() {
        assert_eq!(ComponentKind::from_tag("multi_select"), ComponentKind::MultiSelect);
        assert_eq!(ComponentKind::from_tag("toggle"), ComponentKind::Toggle);
        assert_eq!(
            ComponentKind::from_tag("sparkline"),
            ComponentKind::Unsupported("sparkline".into())
        );
    }

    #[test]
    fn test_number_input_parses_or_zero() {
        let schema = Arc::new(NodeSchema::new("n", "N").with_parameter(ParameterSpec::optional("top_k", "int")));
        let mut form = FormState::new("n_1", schema, ParameterMap::new());

        assert!(form.edit("top_k", FieldInput::Text("7".into())));
        assert_eq!(form.values()["top_k"], json!(7));
        form.edit("top_k", FieldInput::Text("0.25".into()));
        assert_eq!(form.values()["top_k"], json!(0.25));
        form.edit("top_k", FieldInput::Text("abc".into()));
        assert_eq!(form.values()["top_k"], json!(0));
    }

    #[test]
    fn test_slider_is_clamped() {
        let mut form = FormState::new("n", llm_schema(), ParameterMap::new());
        form.edit("temperature", FieldInput::Number(5.0));
        assert_eq!(form.values()["temperature"], json!(2));
        form.edit("temperature", FieldInput::Number(-1.0));
        assert_eq!(form.values()["temperature"], json!(0));
    }

    #[test]
    fn test_checkbox_and_toggle_values() {
        let mut flag = component("checkbox", "stream");
        flag.checked_value = Some(json!("yes"));
        flag.unchecked_value = Some(json!("no"));
        let mut toggle = component("toggle", "enabled");
        toggle.on_value = Some(json!("on"));
        toggle.off_value = Some(json!("off"));

        let ui = NodeUiConfig {
            groups: vec![UiGroup {
                name: "g".into(),
                label: "G".into(),
                description: None,
                components: vec![flag, toggle],
                collapsible: false,
                collapsed: false,
                extra: Default::default(),
            }],
            ..Default::default()
        };
        let schema = Arc::new(NodeSchema::new("n", "N").with_ui_config(ui));
        let mut form = FormState::new("n", schema, ParameterMap::new());

        form.edit("stream", FieldInput::Checked(true));
        assert_eq!(form.values()["stream"], "yes");
        form.edit("stream", FieldInput::Checked(false));
        assert_eq!(form.values()["stream"], "no");

        form.edit("enabled", FieldInput::Toggle);
        assert_eq!(form.values()["enabled"], "on");
        form.edit("enabled", FieldInput::Toggle);
        assert_eq!(form.values()["enabled"], "off");
    }

    #[test]
    fn test_multi_select_is_capped() {
        let mut tags = component("multi_select", "tags");
        tags.max_selections = Some(2);
        let ui = NodeUiConfig {
            groups: vec![UiGroup {
                name: "g".into(),
                label: "G".into(),
                description: None,
                components: vec![tags],
                collapsible: false,
                collapsed: false,
                extra: Default::default(),
            }],
            ..Default::default()
        };
        let schema = Arc::new(NodeSchema::new("n", "N").with_ui_config(ui));
        let mut form = FormState::new("n", schema, ParameterMap::new());

        form.edit(
            "tags",
            FieldInput::Selections(vec!["a".into(), "b".into(), "c".into()]),
        );
        assert_eq!(form.values()["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_unsupported_field_keeps_value() {
        let mut form = FormState::new(
            "n",
            llm_schema(),
            values(&[("history", json!({"points": [1, 2, 3]}))]),
        );
        form.toggle_group("advanced");

        assert!(!form.edit("history", FieldInput::Text("x".into())));
        assert_eq!(form.values()["history"], json!({"points": [1, 2, 3]}));

        let groups = form.render(&OptionCache::new());
        let field = groups[1].fields.iter().find(|f| f.name == "history").unwrap();
        assert_eq!(
            field.widget,
            Widget::Unsupported {
                tag: "sparkline".into(),
                value: Some(json!({"points": [1, 2, 3]})),
            }
        );

        assert!(form.edit("history", FieldInput::Raw(json!(null))));
        assert_eq!(form.values()["history"], Value::Null);
    }

    #[test]
    fn test_collapse_defaults_to_declared_flag() {
        let mut form = FormState::new("n", llm_schema(), values(&[("temperature", json!(0.7))]));
        assert!(form.is_collapsed("advanced"));
        assert!(!form.is_collapsed("model"));

        let groups = form.render(&OptionCache::new());
        assert!(groups[1].fields.is_empty());
        assert_eq!(form.values()["temperature"], json!(0.7));

        assert_eq!(form.toggle_group("advanced"), Some(false));
        assert_eq!(form.toggle_group("model"), None);
        let groups = form.render(&OptionCache::new());
        assert_eq!(groups[1].fields.len(), 3);
    }

    #[test]
    fn test_invisible_components_are_skipped() {
        let mut hidden = component("text_input", "secret");
        hidden.visible = false;
        let ui = NodeUiConfig {
            groups: vec![UiGroup {
                name: "g".into(),
                label: "G".into(),
                description: None,
                components: vec![hidden, component("text_input", "query")],
                collapsible: false,
                collapsed: false,
                extra: Default::default(),
            }],
            ..Default::default()
        };
        let schema = Arc::new(NodeSchema::new("n", "N").with_ui_config(ui));
        let form = FormState::new("n", schema, values(&[("secret", json!("s"))]));

        let groups = form.render(&OptionCache::new());
        assert_eq!(groups[0].fields.len(), 1);
        assert_eq!(groups[0].fields[0].name, "query");
        assert_eq!(form.values()["secret"], "s");
    }

    #[test]
    fn test_saved_model_survives_first_render() {
        let form_values = values(&[("service", json!("openai")), ("model", json!("gpt-4o"))]);
        let mut form = FormState::new("n", llm_schema(), form_values);
        let mut cache = OptionCache::new();

        let keys = form.missing_option_keys(&cache);
        assert_eq!(keys, vec![OptionKey::dependent("models", "openai")]);

        cache.begin_fetch(&keys[0]);
        assert!(form.reconcile(&cache).is_empty());
        assert_eq!(form.values()["model"], "gpt-4o");

        cache.complete(
            keys[0].clone(),
            Ok(vec![UiOption::plain("gpt-4o"), UiOption::plain("gpt-4")]),
        );
        assert!(form.reconcile(&cache).is_empty());
        assert_eq!(form.values()["model"], "gpt-4o");
        assert!(!form.is_dirty());
    }

    #[test]
    fn test_dependency_change_resets_only_after_load() {
        let form_values = values(&[("service", json!("openai")), ("model", json!("gpt-4o"))]);
        let mut form = FormState::new("n", llm_schema(), form_values);
        let mut cache = OptionCache::new();

        form.edit("service", FieldInput::Text("ollama".into()));
        let key = OptionKey::dependent("models", "ollama");
        assert_eq!(form.missing_option_keys(&cache), vec![key.clone()]);

        cache.begin_fetch(&key);
        assert!(form.reconcile(&cache).is_empty());
        assert_eq!(form.values()["model"], "gpt-4o");

        cache.complete(key, Ok(vec![UiOption::plain("llama3")]));
        assert_eq!(form.reconcile(&cache), vec!["model".to_string()]);
        assert_eq!(form.values()["model"], "");
    }

    #[test]
    fn test_empty_dependency_requests_nothing() {
        let form = FormState::new("n", llm_schema(), ParameterMap::new());
        assert!(form.missing_option_keys(&OptionCache::new()).is_empty());

        let groups = form.render(&OptionCache::new());
        let model = &groups[0].fields[1];
        assert_eq!(
            model.widget,
            Widget::Select {
                value: String::new(),
                options: OptionState::NotRequested,
            }
        );
    }

    #[test]
    fn test_validate_reports_constraints() {
        let mut query = component("text_input", "query");
        query.required = true;
        let mut code = component("text_input", "code");
        code.pattern = Some("^[A-Z]{3}$".into());
        code.max_length = Some(3);
        let mut count = component("number_input", "count");
        count.min_value = Some(1.0);

        let ui = NodeUiConfig {
            groups: vec![UiGroup {
                name: "g".into(),
                label: "G".into(),
                description: None,
                components: vec![query, code, count],
                collapsible: false,
                collapsed: false,
                extra: Default::default(),
            }],
            ..Default::default()
        };
        let schema = Arc::new(NodeSchema::new("n", "N").with_ui_config(ui));
        let form = FormState::new(
            "n",
            schema,
            values(&[("code", json!("abcd")), ("count", json!(0))]),
        );

        let fields: Vec<_> = form.validate().into_iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["query", "code", "code", "count"]);
    }

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OptionsProvider for CountingProvider {
        async fn fetch_options(&self, key: &OptionKey) -> Result<Vec<UiOption>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match key.dependent_value.as_deref() {
                Some("openai") => Ok(vec![UiOption::plain("gpt-4o")]),
                _ => Err(EngineError::schema_fetch("unknown service")),
            }
        }
    }

    #[tokio::test]
    async fn test_resolve_options_caches_by_key() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };
        let mut cache = OptionCache::new();
        let mut form = FormState::new(
            "n",
            llm_schema(),
            values(&[("service", json!("openai")), ("model", json!("gpt-4o"))]),
        );

        assert!(resolve_options(&mut form, &mut cache, &provider).await.is_empty());
        assert!(resolve_options(&mut form, &mut cache, &provider).await.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        form.edit("service", FieldInput::Text("ollama".into()));
        assert!(resolve_options(&mut form, &mut cache, &provider).await.is_empty());
        assert_eq!(form.values()["model"], "gpt-4o");
        assert!(matches!(
            cache.slot(&OptionKey::dependent("models", "ollama")),
            Some(OptionSlot::Failed(_))
        ));

        form.edit("service", FieldInput::Text("openai".into()));
        resolve_options(&mut form, &mut cache, &provider).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_derived_layout_without_ui_config() {
        let schema = Arc::new(
            NodeSchema::new("n", "N")
                .with_parameter(ParameterSpec::required("query", "string"))
                .with_parameter(ParameterSpec::optional("stream", "bool"))
                .with_parameter(ParameterSpec {
                    options: Some(vec!["a".into(), "b".into()]),
                    ..ParameterSpec::optional("mode", "string")
                }),
        );
        let form = FormState::new("n", schema, ParameterMap::new());
        let groups = form.render(&OptionCache::new());
        let widgets: Vec<_> = groups[0].fields.iter().map(|f| &f.widget).collect();

        assert!(matches!(widgets[0], Widget::TextInput { .. }));
        assert!(matches!(widgets[1], Widget::Checkbox { checked: false }));
        assert!(matches!(widgets[2], Widget::Select { options: OptionState::Static(o), .. } if o.len() == 2));
    }
}
