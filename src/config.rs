/// Host configuration passed in from the JS entry point
use serde::Deserialize;
use wasm_bindgen::JsValue;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostConfig {
    /// chrome.storage area holding feature state
    pub storage_area: String,
    /// Key of the enabled-flag map
    pub states_key: String,
    /// Key of the per-feature settings map
    pub settings_key: String,
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            storage_area: "local".to_string(),
            states_key: "feature_states".to_string(),
            settings_key: "feature_settings".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl HostConfig {
    pub fn from_js(value: JsValue) -> Result<HostConfig, ConfigError> {
        if value.is_undefined() || value.is_null() {
            return Ok(HostConfig::default());
        }
        serde_wasm_bindgen::from_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }
}
