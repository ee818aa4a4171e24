/// Feature descriptors and their settings schema
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use yew::Html;

use crate::error::MountError;
use crate::url_matcher::MatchRule;

/// Raw settings for one feature as they sit in storage.
pub type StoredSettings = HashMap<String, Value>;

/// A single setting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SettingValue {
    pub fn from_json(value: &Value) -> Option<SettingValue> {
        match value {
            Value::Bool(flag) => Some(SettingValue::Bool(*flag)),
            Value::Number(number) => number.as_f64().map(SettingValue::Number),
            Value::String(text) => Some(SettingValue::Text(text.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SettingValue::Bool(flag) => Value::Bool(*flag),
            SettingValue::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SettingValue::Text(text) => Value::String(text.clone()),
        }
    }

    /// Text form used to fill popup inputs
    pub fn display(&self) -> String {
        match self {
            SettingValue::Bool(flag) => flag.to_string(),
            SettingValue::Number(number) => number.to_string(),
            SettingValue::Text(text) => text.clone(),
        }
    }
}

/// The input type of a setting
#[derive(Debug, Clone, PartialEq)]
pub enum SettingKind {
    Color,
    Text,
    Number,
    Range { min: f64, max: f64, step: f64 },
    Toggle,
}

impl SettingKind {
    /// Check a stored value against this kind.
    ///
    /// Returns `None` when the value has the wrong type, so the caller falls
    /// back to the schema default. Range values are clamped into bounds.
    pub fn coerce(&self, value: &SettingValue) -> Option<SettingValue> {
        match (self, value) {
            (SettingKind::Color | SettingKind::Text, SettingValue::Text(_)) => Some(value.clone()),
            (SettingKind::Number, SettingValue::Number(n)) if n.is_finite() => Some(value.clone()),
            (SettingKind::Range { min, max, .. }, SettingValue::Number(n)) if n.is_finite() => {
                Some(SettingValue::Number(n.clamp(*min, *max)))
            }
            (SettingKind::Toggle, SettingValue::Bool(_)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Parse the raw string of a form input
    pub fn parse_input(&self, raw: &str) -> Option<SettingValue> {
        let value = match self {
            SettingKind::Color | SettingKind::Text => SettingValue::Text(raw.to_string()),
            SettingKind::Number | SettingKind::Range { .. } => {
                SettingValue::Number(raw.trim().parse::<f64>().ok()?)
            }
            SettingKind::Toggle => match raw.trim() {
                "true" | "on" => SettingValue::Bool(true),
                "false" | "off" | "" => SettingValue::Bool(false),
                _ => return None,
            },
        };
        self.coerce(&value)
    }
}

/// One entry in a feature's settings schema
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: SettingKind,
    pub default: SettingValue,
}

impl SettingDescriptor {
    pub fn new(key: &'static str, label: &'static str, kind: SettingKind, default: SettingValue) -> SettingDescriptor {
        SettingDescriptor {
            key,
            label,
            kind,
            default,
        }
    }

    /// Stored value if it fits this descriptor, otherwise the default
    pub fn resolve(&self, stored: Option<&Value>) -> SettingValue {
        stored
            .and_then(SettingValue::from_json)
            .and_then(|value| self.kind.coerce(&value))
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Fully resolved settings handed to a feature payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureSettings(BTreeMap<String, SettingValue>);

impl FeatureSettings {
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.0.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(SettingValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(SettingValue::Number(number)) => Some(*number),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, SettingValue)> for FeatureSettings {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        FeatureSettings(iter.into_iter().collect())
    }
}

/// Payload driven through explicit enable/disable routines.
///
/// `execute` is called again with fresh settings while the feature is
/// already active, so implementations must be idempotent.
pub trait ImperativeFeature {
    fn execute(&self, settings: &FeatureSettings) -> Result<(), MountError>;

    fn cleanup(&self) -> Result<(), MountError>;
}

/// Stateless render function for declarative payloads
pub type RenderFn = fn(&FeatureSettings) -> Html;

pub enum Behavior {
    Imperative(Box<dyn ImperativeFeature>),
    Render(RenderFn),
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Imperative(_) => f.write_str("Imperative"),
            Behavior::Render(_) => f.write_str("Render"),
        }
    }
}

/// A registered page-modification feature. Immutable once registered.
#[derive(Debug)]
pub struct FeatureDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub match_rules: Vec<MatchRule>,
    pub initial_state: bool,
    pub settings_schema: Vec<SettingDescriptor>,
    pub behavior: Behavior,
}

impl FeatureDescriptor {
    pub fn new(id: &'static str, name: &'static str, description: &'static str, behavior: Behavior) -> FeatureDescriptor {
        FeatureDescriptor {
            id,
            name,
            description,
            match_rules: Vec::new(),
            initial_state: false,
            settings_schema: Vec::new(),
            behavior,
        }
    }

    pub fn matching(mut self, rule: MatchRule) -> Self {
        self.match_rules.push(rule);
        self
    }

    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.initial_state = enabled;
        self
    }

    pub fn setting(mut self, setting: SettingDescriptor) -> Self {
        self.settings_schema.push(setting);
        self
    }

    /// Resolve every schema entry against the stored blob.
    /// Keys outside the schema are dropped.
    pub fn resolve_settings(&self, stored: Option<&StoredSettings>) -> FeatureSettings {
        self.settings_schema
            .iter()
            .map(|setting| {
                let raw = stored.and_then(|values| values.get(setting.key));
                (setting.key.to_string(), setting.resolve(raw))
            })
            .collect()
    }
}
