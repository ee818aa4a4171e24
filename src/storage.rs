/// Persisted feature state: enabled flags and per-feature settings
use std::cell::RefCell;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::HostConfig;
use crate::error::StoreError;
use crate::feature::{SettingValue, StoredSettings};

/// feature id -> enabled flag
pub type EnabledMap = HashMap<String, bool>;

/// feature id -> raw settings blob
pub type SettingsMap = HashMap<String, StoredSettings>;

/// Async key-value store for feature state.
///
/// Writes read the latest map and write the whole map back, so concurrent
/// writers race and the last write wins.
#[allow(async_fn_in_trait)]
pub trait SettingsStore {
    async fn enabled_map(&self) -> Result<EnabledMap, StoreError>;

    async fn settings_map(&self) -> Result<SettingsMap, StoreError>;

    async fn feature_settings(&self, feature_id: &str) -> Result<Option<StoredSettings>, StoreError> {
        let mut settings = self.settings_map().await?;
        Ok(settings.remove(feature_id))
    }

    async fn set_enabled(&self, feature_id: &str, enabled: bool) -> Result<(), StoreError>;

    async fn set_setting(&self, feature_id: &str, key: &str, value: &SettingValue) -> Result<(), StoreError>;
}

/// New values of whichever maps changed in one storage event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreChange {
    pub enabled: Option<EnabledMap>,
    pub settings: Option<SettingsMap>,
}

impl StoreChange {
    pub fn enabled(enabled: EnabledMap) -> Self {
        StoreChange {
            enabled: Some(enabled),
            settings: None,
        }
    }

    pub fn settings(settings: SettingsMap) -> Self {
        StoreChange {
            enabled: None,
            settings: Some(settings),
        }
    }

    /// Parse a `chrome.storage.onChanged` payload.
    ///
    /// Returns `None` for other storage areas or when neither map changed.
    /// A removed map (no `newValue`) is reported as empty.
    pub fn from_changes(area: &str, changes: &Value, config: &HostConfig) -> Option<StoreChange> {
        if area != config.storage_area {
            return None;
        }

        let change = StoreChange {
            enabled: new_value(changes, &config.states_key),
            settings: new_value(changes, &config.settings_key),
        };

        if change.enabled.is_none() && change.settings.is_none() {
            None
        } else {
            Some(change)
        }
    }
}

fn new_value<T: DeserializeOwned + Default>(changes: &Value, key: &str) -> Option<T> {
    let entry = changes.get(key)?;
    let value = match entry.get("newValue") {
        None | Some(Value::Null) => return Some(T::default()),
        Some(value) => value.clone(),
    };

    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("Ignoring malformed `{}` change: {}", key, e);
            Some(T::default())
        }
    }
}

/// In-process store. Also stands in for a missing storage API.
#[derive(Debug)]
pub struct MemoryStore {
    enabled: RefCell<EnabledMap>,
    settings: RefCell<SettingsMap>,
    available: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            enabled: RefCell::new(EnabledMap::new()),
            settings: RefCell::new(SettingsMap::new()),
            available: true,
        }
    }

    /// A store whose every call fails
    pub fn unavailable() -> Self {
        MemoryStore {
            available: false,
            ..MemoryStore::new()
        }
    }

    pub fn with_enabled(self, feature_id: &str, enabled: bool) -> Self {
        self.enabled.borrow_mut().insert(feature_id.to_string(), enabled);
        self
    }

    pub fn with_setting(self, feature_id: &str, key: &str, value: Value) -> Self {
        self.settings
            .borrow_mut()
            .entry(feature_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store disabled".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemoryStore {
    async fn enabled_map(&self) -> Result<EnabledMap, StoreError> {
        self.check()?;
        Ok(self.enabled.borrow().clone())
    }

    async fn settings_map(&self) -> Result<SettingsMap, StoreError> {
        self.check()?;
        Ok(self.settings.borrow().clone())
    }

    async fn set_enabled(&self, feature_id: &str, enabled: bool) -> Result<(), StoreError> {
        self.check()?;
        self.enabled.borrow_mut().insert(feature_id.to_string(), enabled);
        Ok(())
    }

    async fn set_setting(&self, feature_id: &str, key: &str, value: &SettingValue) -> Result<(), StoreError> {
        self.check()?;
        self.settings
            .borrow_mut()
            .entry(feature_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_json());
        Ok(())
    }
}
