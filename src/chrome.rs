/// chrome.storage / chrome.runtime access through the JS bridge
use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use crate::config::HostConfig;
use crate::error::{MountError, StoreError};
use crate::feature::SettingValue;
use crate::storage::{EnabledMap, SettingsMap, SettingsStore, StoreChange};

// Import JS bridge functions
#[wasm_bindgen(module = "/extension.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(area: &str, key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(area: &str, key: &str, value: JsValue) -> Result<(), JsValue>;

    fn onStorageChanged(callback: &js_sys::Function) -> bool;

    fn offStorageChanged(callback: &js_sys::Function);

    #[wasm_bindgen(catch)]
    fn runtimeUrl(path: &str) -> Result<String, JsValue>;
}

/// `chrome.storage` backed settings store
#[derive(Debug, Clone)]
pub struct ChromeStore {
    config: HostConfig,
}

impl ChromeStore {
    pub fn new(config: HostConfig) -> Self {
        ChromeStore { config }
    }

    async fn read<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StoreError> {
        let value = getStorage(&self.config.storage_area, key)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{:?}", e)))?;

        if value.is_null() || value.is_undefined() {
            return Ok(T::default());
        }

        serde_wasm_bindgen::from_value(value).map_err(|e| StoreError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = value
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        setStorage(&self.config.storage_area, key, value)
            .await
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
    }
}

impl SettingsStore for ChromeStore {
    async fn enabled_map(&self) -> Result<EnabledMap, StoreError> {
        self.read(&self.config.states_key).await
    }

    async fn settings_map(&self) -> Result<SettingsMap, StoreError> {
        self.read(&self.config.settings_key).await
    }

    async fn set_enabled(&self, feature_id: &str, enabled: bool) -> Result<(), StoreError> {
        let mut states = self.enabled_map().await?;
        states.insert(feature_id.to_string(), enabled);
        self.write(&self.config.states_key, &states).await
    }

    async fn set_setting(&self, feature_id: &str, key: &str, value: &SettingValue) -> Result<(), StoreError> {
        let mut settings = self.settings_map().await?;
        settings
            .entry(feature_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_json());
        self.write(&self.config.settings_key, &settings).await
    }
}

/// Keeps the change listener registered until dropped
pub struct StoreSubscription {
    closure: Closure<dyn FnMut(String, JsValue)>,
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        offStorageChanged(self.closure.as_ref().unchecked_ref());
    }
}

/// Register `on_change` for changes to the feature maps.
///
/// Returns `None` when the storage API is missing.
pub fn subscribe(config: HostConfig, mut on_change: impl FnMut(StoreChange) + 'static) -> Option<StoreSubscription> {
    let closure = Closure::wrap(Box::new(move |area: String, changes: JsValue| {
        let changes: serde_json::Value = match serde_wasm_bindgen::from_value(changes) {
            Ok(changes) => changes,
            Err(e) => {
                log::warn!("Unreadable storage change: {}", e);
                return;
            }
        };
        if let Some(change) = StoreChange::from_changes(&area, &changes, &config) {
            on_change(change);
        }
    }) as Box<dyn FnMut(String, JsValue)>);

    if onStorageChanged(closure.as_ref().unchecked_ref()) {
        Some(StoreSubscription { closure })
    } else {
        log::warn!("chrome.storage is unavailable; live updates disabled");
        None
    }
}

/// Resolve a file packaged with the extension
pub fn runtime_url(path: &str) -> Result<String, MountError> {
    runtimeUrl(path).map_err(|e| MountError::Script(format!("{:?}", e)))
}
