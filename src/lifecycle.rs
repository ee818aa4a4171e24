//! Feature lifecycle controller.
//!
//! Keeps every URL-matched feature's activation in line with the persisted
//! enabled flags and settings. Each feature owns one slot behind an async
//! mutex, so transitions for the same feature never interleave while
//! different features proceed independently.
//!
//! Failures are logged and contained per feature; nothing here propagates out
//! of a batch evaluation.

use std::collections::HashMap;
use std::rc::Rc;

use futures::lock::Mutex;
use log::{debug, error, info, warn};

use crate::error::LifecycleError;
use crate::feature::{FeatureDescriptor, FeatureSettings, StoredSettings};
use crate::mount::MountAdapter;
use crate::registry::FeatureRegistry;
use crate::storage::{EnabledMap, SettingsStore, StoreChange};
use crate::url_matcher;

/// What a single transition did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activated,
    Updated,
    Deactivated,
    Unchanged,
}

/// Activation state of one feature. Active iff a resource is mounted.
#[derive(Debug)]
pub struct ActivationState<H> {
    mounted: Option<H>,
}

impl<H> ActivationState<H> {
    fn inactive() -> Self {
        ActivationState { mounted: None }
    }

    pub fn is_active(&self) -> bool {
        self.mounted.is_some()
    }
}

/// Persisted flag for the feature, or its initial state when none is stored
pub fn resolve_desired_state(feature: &FeatureDescriptor, enabled: &EnabledMap) -> bool {
    enabled.get(feature.id).copied().unwrap_or(feature.initial_state)
}

pub struct LifecycleController<S, M: MountAdapter> {
    registry: Rc<FeatureRegistry>,
    store: S,
    mounter: M,
    page_url: String,
    slots: HashMap<&'static str, Mutex<ActivationState<M::Handle>>>,
}

impl<S: SettingsStore, M: MountAdapter> LifecycleController<S, M> {
    pub fn new(registry: Rc<FeatureRegistry>, store: S, mounter: M, page_url: impl Into<String>) -> Self {
        let slots = registry
            .iter()
            .map(|feature| (feature.id, Mutex::new(ActivationState::inactive())))
            .collect();

        LifecycleController {
            registry,
            store,
            mounter,
            page_url: page_url.into(),
            slots,
        }
    }

    pub fn is_matched(&self, feature: &FeatureDescriptor) -> bool {
        url_matcher::matches(&self.page_url, &feature.match_rules)
    }

    fn matched_features(&self) -> impl Iterator<Item = &FeatureDescriptor> {
        self.registry.iter().filter(|feature| self.is_matched(feature))
    }

    fn slot(&self, feature_id: &str) -> Result<&Mutex<ActivationState<M::Handle>>, LifecycleError> {
        self.slots
            .get(feature_id)
            .ok_or_else(|| LifecycleError::UnknownFeature(feature_id.to_string()))
    }

    /// Latest enabled flags; a failing store counts as nothing persisted
    async fn enabled_snapshot(&self) -> EnabledMap {
        self.store.enabled_map().await.unwrap_or_else(|e| {
            warn!("{}; using initial feature states", e);
            EnabledMap::new()
        })
    }

    async fn stored_settings(&self, feature: &FeatureDescriptor) -> Option<StoredSettings> {
        self.store.feature_settings(feature.id).await.unwrap_or_else(|e| {
            warn!("{}; using default settings for {}", e, feature.id);
            None
        })
    }

    /// Drive one feature towards `desired`.
    ///
    /// Activation fetches fresh settings. An already active feature is
    /// updated in place with fresh settings instead of being remounted.
    /// A feature that does not match the page is never activated.
    pub async fn transition(&self, feature: &FeatureDescriptor, desired: bool) -> Result<Transition, LifecycleError> {
        let slot = self.slot(feature.id)?;
        let mut guard = slot.lock().await;
        let state = &mut *guard;

        if !desired || !self.is_matched(feature) {
            return self.unmount(feature, state).await;
        }

        let stored = self.stored_settings(feature).await;
        let settings = feature.resolve_settings(stored.as_ref());
        self.mount_or_update(feature, state, &settings).await
    }

    async fn mount_or_update(
        &self,
        feature: &FeatureDescriptor,
        state: &mut ActivationState<M::Handle>,
        settings: &FeatureSettings,
    ) -> Result<Transition, LifecycleError> {
        if let Some(handle) = state.mounted.as_mut() {
            self.mounter
                .update(feature, handle, settings)
                .await
                .map_err(|source| LifecycleError::Update {
                    feature: feature.id.to_string(),
                    source,
                })?;
            return Ok(Transition::Updated);
        }

        let handle = self
            .mounter
            .activate(feature, settings)
            .await
            .map_err(|source| LifecycleError::Activate {
                feature: feature.id.to_string(),
                source,
            })?;
        state.mounted = Some(handle);
        Ok(Transition::Activated)
    }

    async fn unmount(
        &self,
        feature: &FeatureDescriptor,
        state: &mut ActivationState<M::Handle>,
    ) -> Result<Transition, LifecycleError> {
        // The handle is dropped even if cleanup fails, so the feature can be
        // activated again later.
        let Some(handle) = state.mounted.take() else {
            return Ok(Transition::Unchanged);
        };

        self.mounter
            .deactivate(feature, handle)
            .await
            .map_err(|source| LifecycleError::Deactivate {
                feature: feature.id.to_string(),
                source,
            })?;
        Ok(Transition::Deactivated)
    }

    /// Transition and log the outcome. Errors stop here.
    async fn settle(&self, feature: &FeatureDescriptor, desired: bool) {
        match self.transition(feature, desired).await {
            Ok(Transition::Activated) => info!("Executing feature: {}", feature.name),
            Ok(Transition::Updated) => info!("Updated feature: {}", feature.name),
            Ok(Transition::Deactivated) => info!("Disabling feature: {}", feature.name),
            Ok(Transition::Unchanged) => debug!("Feature {} unchanged", feature.id),
            Err(e) => error!("{}", e),
        }
    }

    /// Evaluate every matched feature against the persisted flags
    pub async fn on_initial_load(&self) {
        info!("Content script loaded for: {}", self.page_url);
        let enabled = self.enabled_snapshot().await;

        for feature in self.matched_features() {
            let desired = resolve_desired_state(feature, &enabled);
            self.settle(feature, desired).await;
        }
    }

    /// React to a storage change made elsewhere (e.g. the popup).
    ///
    /// New enabled flags re-run transitions for matched features. New
    /// settings only touch features that are currently active and have an
    /// entry in the changed map; inactive features pick them up on their
    /// next activation.
    pub async fn on_store_change(&self, change: StoreChange) {
        if let Some(enabled) = change.enabled.as_ref() {
            for feature in self.matched_features() {
                let desired = resolve_desired_state(feature, enabled);
                self.settle(feature, desired).await;
            }
        }

        if let Some(settings) = change.settings.as_ref() {
            for feature in self.registry.iter() {
                if let Some(stored) = settings.get(feature.id) {
                    self.refresh(feature, stored).await;
                }
            }
        }
    }

    async fn refresh(&self, feature: &FeatureDescriptor, stored: &StoredSettings) {
        let Ok(slot) = self.slot(feature.id) else {
            return;
        };
        let mut guard = slot.lock().await;
        let Some(handle) = guard.mounted.as_mut() else {
            debug!("Settings for inactive feature {} stored for later", feature.id);
            return;
        };

        let settings = feature.resolve_settings(Some(stored));
        match self.mounter.update(feature, handle, &settings).await {
            Ok(()) => info!("Updated feature: {}", feature.name),
            Err(source) => error!(
                "{}",
                LifecycleError::Update {
                    feature: feature.id.to_string(),
                    source,
                }
            ),
        }
    }

    pub async fn is_active(&self, feature_id: &str) -> bool {
        match self.slots.get(feature_id) {
            Some(slot) => slot.lock().await.is_active(),
            None => false,
        }
    }

    /// Ids of active features in registry order
    pub async fn active_features(&self) -> Vec<&'static str> {
        let mut active = Vec::new();
        for id in self.registry.ids() {
            if self.is_active(id).await {
                active.push(id);
            }
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Behavior, SettingDescriptor, SettingKind, SettingValue};
    use crate::mount::recording::{MountEvent, RecordingMounter};
    use crate::storage::{MemoryStore, SettingsMap};
    use crate::url_matcher::MatchRule;
    use futures::executor::block_on;
    use serde_json::json;
    use yew::html;

    const PAGE: &str = "https://example.com/watch";

    fn banner() -> FeatureDescriptor {
        FeatureDescriptor::new("banner", "Banner", "", Behavior::Render(|_| html! {}))
            .enabled_by_default(true)
            .setting(SettingDescriptor::new(
                "text",
                "Text",
                SettingKind::Text,
                SettingValue::Text("hello".to_string()),
            ))
    }

    fn audio() -> FeatureDescriptor {
        FeatureDescriptor::new("audio", "Audio", "", Behavior::Render(|_| html! {})).setting(
            SettingDescriptor::new(
                "level",
                "Level",
                SettingKind::Range { min: 1.0, max: 5.0, step: 0.1 },
                SettingValue::Number(1.0),
            ),
        )
    }

    fn elsewhere() -> FeatureDescriptor {
        FeatureDescriptor::new("elsewhere", "Elsewhere", "", Behavior::Render(|_| html! {}))
            .matching(MatchRule::substring("other.org"))
            .enabled_by_default(true)
    }

    fn controller(
        features: Vec<FeatureDescriptor>,
        store: MemoryStore,
    ) -> (LifecycleController<MemoryStore, RecordingMounter>, RecordingMounter) {
        let mut registry = FeatureRegistry::new();
        for feature in features {
            registry.register(feature).unwrap();
        }
        let mounter = RecordingMounter::new();
        let controller = LifecycleController::new(Rc::new(registry), store, mounter.clone(), PAGE);
        (controller, mounter)
    }

    fn activations(mounter: &RecordingMounter, id: &str) -> usize {
        mounter.count(|e| matches!(e, MountEvent::Activate { feature, .. } if feature == id))
    }

    fn feature<'a>(c: &'a LifecycleController<MemoryStore, RecordingMounter>, id: &str) -> &'a FeatureDescriptor {
        c.registry.get(id).unwrap()
    }

    #[test]
    fn test_resolve_desired_state() {
        let feature = audio();
        let mut enabled = EnabledMap::new();

        assert!(!resolve_desired_state(&feature, &enabled));

        enabled.insert("audio".to_string(), true);
        assert!(resolve_desired_state(&feature, &enabled));
    }

    #[test]
    fn test_initial_load_uses_schema_defaults() {
        let (c, mounter) = controller(vec![banner()], MemoryStore::new());

        block_on(c.on_initial_load());

        assert!(block_on(c.is_active("banner")));
        match &mounter.events()[0] {
            MountEvent::Activate { settings, .. } => assert_eq!(settings.text("text"), Some("hello")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_initial_load_uses_persisted_state() {
        let store = MemoryStore::new()
            .with_enabled("audio", true)
            .with_setting("audio", "level", json!(2.5));
        let (c, mounter) = controller(vec![audio()], store);

        block_on(c.on_initial_load());

        assert!(block_on(c.is_active("audio")));
        match &mounter.events()[0] {
            MountEvent::Activate { settings, .. } => assert_eq!(settings.number("level"), Some(2.5)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unmatched_feature_never_activates() {
        let (c, mounter) = controller(vec![elsewhere()], MemoryStore::new().with_enabled("elsewhere", true));

        block_on(c.on_initial_load());
        let result = block_on(c.transition(feature(&c, "elsewhere"), true)).unwrap();

        assert_eq!(result, Transition::Unchanged);
        assert!(!block_on(c.is_active("elsewhere")));
        assert!(mounter.events().is_empty());
    }

    #[test]
    fn test_double_activation_mounts_once() {
        let (c, mounter) = controller(vec![banner()], MemoryStore::new());
        let banner = feature(&c, "banner");

        assert_eq!(block_on(c.transition(banner, true)).unwrap(), Transition::Activated);
        assert_eq!(block_on(c.transition(banner, true)).unwrap(), Transition::Updated);

        assert_eq!(activations(&mounter, "banner"), 1);
        assert_eq!(
            mounter.events()[1],
            MountEvent::Update {
                feature: "banner".to_string(),
                handle: 1,
                settings: banner.resolve_settings(None),
            }
        );
    }

    #[test]
    fn test_disable_then_enable_remounts() {
        let (c, mounter) = controller(vec![banner()], MemoryStore::new());
        let banner = feature(&c, "banner");

        block_on(c.transition(banner, true)).unwrap();
        assert_eq!(block_on(c.transition(banner, false)).unwrap(), Transition::Deactivated);
        assert_eq!(block_on(c.transition(banner, false)).unwrap(), Transition::Unchanged);
        block_on(c.transition(banner, true)).unwrap();

        let events = mounter.events();
        assert_eq!(
            mounter.count(|e| matches!(e, MountEvent::Deactivate { handle: 1, .. })),
            1
        );
        assert!(matches!(events.last(), Some(MountEvent::Activate { handle: 2, .. })));
        assert!(block_on(c.is_active("banner")));
    }

    #[test]
    fn test_mount_failure_is_isolated() {
        let store = MemoryStore::new().with_enabled("audio", true);
        let (c, mounter) = controller(vec![banner(), audio()], store);
        mounter.fail_for("banner");

        block_on(c.on_initial_load());

        assert!(!block_on(c.is_active("banner")));
        assert!(block_on(c.is_active("audio")));
        assert_eq!(block_on(c.active_features()), vec!["audio"]);
    }

    #[test]
    fn test_unmount_failure_discards_handle() {
        let (c, mounter) = controller(vec![banner()], MemoryStore::new());
        let banner = feature(&c, "banner");
        block_on(c.transition(banner, true)).unwrap();
        mounter.fail_for("banner");

        let result = block_on(c.transition(banner, false));

        assert!(matches!(result, Err(LifecycleError::Deactivate { .. })));
        assert!(!block_on(c.is_active("banner")));
    }

    #[test]
    fn test_store_unavailable_falls_back_to_initial_state() {
        let (c, mounter) = controller(vec![banner(), audio()], MemoryStore::unavailable());

        block_on(c.on_initial_load());

        assert_eq!(block_on(c.active_features()), vec!["banner"]);
        match &mounter.events()[0] {
            MountEvent::Activate { settings, .. } => assert_eq!(settings.text("text"), Some("hello")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_enabled_change_toggles_features() {
        let (c, _mounter) = controller(vec![banner(), audio()], MemoryStore::new());
        block_on(c.on_initial_load());

        let mut enabled = EnabledMap::new();
        enabled.insert("banner".to_string(), false);
        enabled.insert("audio".to_string(), true);
        block_on(c.on_store_change(StoreChange::enabled(enabled)));

        assert_eq!(block_on(c.active_features()), vec!["audio"]);
    }

    #[test]
    fn test_enabled_change_removed_key_uses_default() {
        let store = MemoryStore::new().with_enabled("banner", false);
        let (c, _mounter) = controller(vec![banner()], store);
        block_on(c.on_initial_load());
        assert!(!block_on(c.is_active("banner")));

        block_on(c.on_store_change(StoreChange::enabled(EnabledMap::new())));

        assert!(block_on(c.is_active("banner")));
    }

    #[test]
    fn test_settings_change_updates_active_feature() {
        let store = MemoryStore::new().with_enabled("audio", true);
        let (c, mounter) = controller(vec![audio()], store);
        block_on(c.on_initial_load());

        let mut settings = SettingsMap::new();
        settings.insert("audio".to_string(), serde_json::from_value(json!({ "level": 4.0 })).unwrap());
        block_on(c.on_store_change(StoreChange::settings(settings)));

        assert_eq!(activations(&mounter, "audio"), 1);
        match mounter.events().last() {
            Some(MountEvent::Update { settings, handle, .. }) => {
                assert_eq!(*handle, 1);
                assert_eq!(settings.number("level"), Some(4.0));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_settings_change_while_inactive_is_deferred() {
        let store = MemoryStore::new();
        let (c, mounter) = controller(vec![audio()], store);
        block_on(c.on_initial_load());

        block_on(c.store.set_setting("audio", "x", &SettingValue::Number(5.0))).unwrap();
        block_on(c.store.set_setting("audio", "level", &SettingValue::Number(3.0))).unwrap();
        let settings = block_on(c.store.settings_map()).unwrap();
        block_on(c.on_store_change(StoreChange::settings(settings)));

        assert!(mounter.events().is_empty());
        assert!(!block_on(c.is_active("audio")));

        block_on(c.transition(feature(&c, "audio"), true)).unwrap();
        match &mounter.events()[0] {
            MountEvent::Activate { settings, .. } => assert_eq!(settings.number("level"), Some(3.0)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_settings_change_without_entry_is_ignored() {
        let (c, mounter) = controller(vec![banner()], MemoryStore::new());
        block_on(c.on_initial_load());

        block_on(c.on_store_change(StoreChange::settings(SettingsMap::new())));

        assert_eq!(mounter.events().len(), 1);
    }

    #[test]
    fn test_unknown_feature() {
        let (c, _mounter) = controller(vec![banner()], MemoryStore::new());
        let stranger = audio();

        let result = block_on(c.transition(&stranger, true));

        assert!(matches!(result, Err(LifecycleError::UnknownFeature(id)) if id == "audio"));
        assert!(!block_on(c.is_active("audio")));
    }

    #[test]
    fn test_concurrent_transitions_serialize() {
        use futures::future::join;

        let (c, mounter) = controller(vec![banner()], MemoryStore::new());
        let banner = feature(&c, "banner");

        let (first, second) = block_on(join(c.transition(banner, true), c.transition(banner, true)));

        assert_eq!(first.unwrap(), Transition::Activated);
        assert_eq!(second.unwrap(), Transition::Updated);
        assert_eq!(activations(&mounter, "banner"), 1);
    }
}
