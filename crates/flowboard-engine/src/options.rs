//! Dynamic option lists for select-like form components
//!
//! Some components fetch their choices from the backend at runtime, and
//! some of those choices depend on another field (the models offered for
//! the currently selected service, for example). Fetched lists are cached
//! under an [`OptionKey`] made of the option family and the controlling
//! value, so a late response for a value the user has already moved away
//! from lands in its own slot and cannot overwrite a newer one.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::schema::UiOption;

/// Cache key of one fetched option list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionKey {
    /// Option family (e.g., "models", "collections")
    pub family: String,
    /// Value of the controlling field, for dependent lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_value: Option<String>,
}

impl OptionKey {
    /// Key for a list that does not depend on another field
    pub fn independent(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            dependent_value: None,
        }
    }

    /// Key for a list selected by another field's value
    pub fn dependent(family: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            dependent_value: Some(value.into()),
        }
    }
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.dependent_value {
            Some(value) => write!(f, "{}_{}", self.family, value),
            None => write!(f, "{}", self.family),
        }
    }
}

/// Fetch state of one option list
#[derive(Debug, Clone, PartialEq)]
pub enum OptionSlot {
    Loading,
    Ready(Vec<UiOption>),
    Failed(String),
}

/// Option lists keyed by family and controlling value
#[derive(Debug, Clone, Default)]
pub struct OptionCache {
    slots: HashMap<OptionKey, OptionSlot>,
}

impl OptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as loading
    ///
    /// Returns `false` when the key is already loading or loaded, in which
    /// case the caller must not issue another request. A failed key may be
    /// retried.
    pub fn begin_fetch(&mut self, key: &OptionKey) -> bool {
        match self.slots.get(key) {
            Some(OptionSlot::Loading) | Some(OptionSlot::Ready(_)) => false,
            Some(OptionSlot::Failed(_)) | None => {
                self.slots.insert(key.clone(), OptionSlot::Loading);
                true
            }
        }
    }

    /// Record the outcome of a fetch under its own key
    pub fn complete(&mut self, key: OptionKey, outcome: std::result::Result<Vec<UiOption>, String>) {
        let slot = match outcome {
            Ok(options) => OptionSlot::Ready(options),
            Err(message) => {
                log::warn!("Failed to load options for '{}': {}", key, message);
                OptionSlot::Failed(message)
            }
        };
        self.slots.insert(key, slot);
    }

    pub fn slot(&self, key: &OptionKey) -> Option<&OptionSlot> {
        self.slots.get(key)
    }

    /// Loaded options for a key, if the fetch has finished successfully
    pub fn options(&self, key: &OptionKey) -> Option<&[UiOption]> {
        match self.slots.get(key) {
            Some(OptionSlot::Ready(options)) => Some(options),
            _ => None,
        }
    }

    /// Forget a key so the next resolve fetches it again
    pub fn invalidate(&mut self, key: &OptionKey) {
        self.slots.remove(key);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Source of dynamic option lists
#[async_trait]
pub trait OptionsProvider: Send + Sync {
    /// Fetch the options for one key
    async fn fetch_options(&self, key: &OptionKey) -> Result<Vec<UiOption>>;
}

/// Text form of a parameter value used for option matching
pub(crate) fn option_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Whether a dependent field must be reset after its option list changed
///
/// Only a finished, successful load can trigger a reset, and only when a
/// non-empty current value is missing from the loaded list. Loading and
/// failed slots always keep the value. The result depends on nothing but
/// the arguments, so the order in which responses arrive does not matter.
pub fn dependent_reset(current: Option<&Value>, slot: Option<&OptionSlot>) -> bool {
    let Some(OptionSlot::Ready(options)) = slot else {
        return false;
    };
    let Some(current) = current.and_then(option_text).filter(|s| !s.is_empty()) else {
        return false;
    };
    !options.iter().any(|option| option.value == current)
}
