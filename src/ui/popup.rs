/// Popup UI: feature toggles and settings forms

use std::rc::Rc;

use patternfly_yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::chrome::ChromeStore;
use crate::config::HostConfig;
use crate::feature::{SettingDescriptor, SettingValue};
use crate::lifecycle::resolve_desired_state;
use crate::registry::{self, FeatureRegistry};
use crate::storage::{EnabledMap, SettingsMap, SettingsStore};
use crate::ui::components::{FeatureToggle, SettingField};

/// What the popup shows for one feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub enabled: bool,
    pub fields: Vec<(SettingDescriptor, SettingValue)>,
}

/// Resolve every registered feature against the stored maps.
///
/// Missing flags fall back to the feature's initial state and missing
/// settings to their schema defaults.
pub fn popup_rows(registry: &FeatureRegistry, enabled: &EnabledMap, settings: &SettingsMap) -> Vec<FeatureRow> {
    registry
        .iter()
        .map(|feature| {
            let stored = settings.get(feature.id);
            FeatureRow {
                id: feature.id,
                name: feature.name,
                description: feature.description,
                enabled: resolve_desired_state(feature, enabled),
                fields: feature
                    .settings_schema
                    .iter()
                    .map(|setting| {
                        let raw = stored.and_then(|values| values.get(setting.key));
                        (setting.clone(), setting.resolve(raw))
                    })
                    .collect(),
            }
        })
        .collect()
}

#[derive(Clone, PartialEq)]
enum PopupState {
    Loading,
    Ready,
    Error(String),
}

#[derive(Properties, PartialEq)]
pub struct AppProps {
    #[prop_or_default]
    pub config: HostConfig,
}

#[function_component(App)]
pub fn app(props: &AppProps) -> Html {
    let state = use_state(|| PopupState::Loading);
    let enabled = use_state(EnabledMap::new);
    let settings = use_state(SettingsMap::new);
    let registry = use_memo((), |_| registry::builtin().map(Rc::new));
    let store = use_memo(props.config.clone(), |config| ChromeStore::new(config.clone()));

    // Load stored state on mount
    {
        let state = state.clone();
        let enabled = enabled.clone();
        let settings = settings.clone();
        let store = store.clone();

        use_effect_with((), move |_| {
            spawn_local(async move {
                let loaded = match store.enabled_map().await {
                    Ok(states) => store.settings_map().await.map(|values| (states, values)),
                    Err(e) => Err(e),
                };
                match loaded {
                    Ok((states, values)) => {
                        enabled.set(states);
                        settings.set(values);
                        state.set(PopupState::Ready);
                    }
                    Err(e) => {
                        log::warn!("Failed to load feature state: {}", e);
                        state.set(PopupState::Error(format!("Failed to load: {}", e)));
                    }
                }
            });
            || ()
        });
    }

    let on_toggle = {
        let enabled = enabled.clone();
        let state = state.clone();
        let store = store.clone();

        Callback::from(move |(feature_id, value): (&'static str, bool)| {
            let mut next = (*enabled).clone();
            next.insert(feature_id.to_string(), value);
            enabled.set(next);

            let state = state.clone();
            let store = store.clone();
            spawn_local(async move {
                if let Err(e) = store.set_enabled(feature_id, value).await {
                    state.set(PopupState::Error(format!("Failed to save: {}", e)));
                }
            });
        })
    };

    let on_setting = {
        let settings = settings.clone();
        let state = state.clone();
        let store = store.clone();

        Callback::from(move |(feature_id, key, value): (&'static str, &'static str, SettingValue)| {
            let mut next = (*settings).clone();
            next.entry(feature_id.to_string())
                .or_default()
                .insert(key.to_string(), value.to_json());
            settings.set(next);

            let state = state.clone();
            let store = store.clone();
            spawn_local(async move {
                if let Err(e) = store.set_setting(feature_id, key, &value).await {
                    state.set(PopupState::Error(format!("Failed to save: {}", e)));
                }
            });
        })
    };

    let registry = match &*registry {
        Ok(registry) => registry.clone(),
        Err(e) => {
            return html! {
                <div class="popup">
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {e.to_string()}
                    </Alert>
                </div>
            };
        }
    };

    let rows = popup_rows(&registry, &enabled, &settings);

    html! {
        <div class="popup">
            <header class="popup-header">
                <h1 class="popup-title">{"Page Features"}</h1>
            </header>

            {match &*state {
                PopupState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                PopupState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                PopupState::Ready => html! {}
            }}

            <div class="feature-list">
                {for rows.into_iter().map(|row| feature_card(row, &on_toggle, &on_setting))}
            </div>
        </div>
    }
}

fn feature_card(
    row: FeatureRow,
    on_toggle: &Callback<(&'static str, bool)>,
    on_setting: &Callback<(&'static str, &'static str, SettingValue)>,
) -> Html {
    let id = row.id;
    let toggle = on_toggle.reform(move |value: bool| (id, value));

    html! {
        <div class="feature-card" key={id}>
            <div class="feature-card__header">
                <div>
                    <div class="feature-card__name">{row.name}</div>
                    <p class="feature-card__description">{row.description}</p>
                </div>
                <FeatureToggle checked={row.enabled} onchange={toggle} label={row.name} />
            </div>

            if row.enabled && !row.fields.is_empty() {
                <div class="feature-card__settings">
                    {for row.fields.into_iter().map(|(setting, value)| {
                        let key = setting.key;
                        let onchange = on_setting.reform(move |value: SettingValue| (id, key, value));
                        html! { <SettingField key={key} {setting} {value} {onchange} /> }
                    })}
                </div>
            }
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_use_defaults() {
        let registry = registry::builtin().unwrap();

        let rows = popup_rows(&registry, &EnabledMap::new(), &SettingsMap::new());

        assert_eq!(rows.len(), 2);
        assert!(rows[0].enabled);
        assert!(!rows[1].enabled);
        assert_eq!(rows[1].fields[0].1, SettingValue::Number(1.0));
    }

    #[test]
    fn test_rows_use_stored_state() {
        let registry = registry::builtin().unwrap();
        let mut enabled = EnabledMap::new();
        enabled.insert("notice-banner".to_string(), false);
        enabled.insert("volume-booster".to_string(), true);
        let mut settings = SettingsMap::new();
        settings.insert(
            "volume-booster".to_string(),
            serde_json::from_value(json!({ "level": 2.5 })).unwrap(),
        );

        let rows = popup_rows(&registry, &enabled, &settings);

        assert!(!rows[0].enabled);
        assert!(rows[1].enabled);
        assert_eq!(rows[1].fields[0].0.key, "level");
        assert_eq!(rows[1].fields[0].1, SettingValue::Number(2.5));
    }
}
