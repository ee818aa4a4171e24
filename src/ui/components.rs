/// Reusable popup components

use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::feature::{SettingDescriptor, SettingKind, SettingValue};

#[derive(Properties, PartialEq)]
pub struct FeatureToggleProps {
    pub checked: bool,
    pub onchange: Callback<bool>,
    #[prop_or_default]
    pub label: AttrValue,
}

/// Switch-style checkbox for a feature's enabled flag
#[function_component(FeatureToggle)]
pub fn feature_toggle(props: &FeatureToggleProps) -> Html {
    let onchange = {
        let onchange = props.onchange.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                onchange.emit(input.checked());
            }
        })
    };

    html! {
        <label class="feature-toggle">
            <input
                type="checkbox"
                role="switch"
                aria-label={props.label.clone()}
                checked={props.checked}
                {onchange}
            />
            <span class="feature-toggle__track"></span>
        </label>
    }
}

#[derive(Properties, PartialEq)]
pub struct SettingFieldProps {
    pub setting: SettingDescriptor,
    pub value: SettingValue,
    pub onchange: Callback<SettingValue>,
}

/// One input in a feature's settings form, chosen by the setting kind
#[function_component(SettingField)]
pub fn setting_field(props: &SettingFieldProps) -> Html {
    let oninput = {
        let kind = props.setting.kind.clone();
        let onchange = props.onchange.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                // Half-typed numbers are skipped until they parse
                if let Some(value) = kind.parse_input(&input.value()) {
                    onchange.emit(value);
                }
            }
        })
    };

    let on_checked = {
        let onchange = props.onchange.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                onchange.emit(SettingValue::Bool(input.checked()));
            }
        })
    };

    let current = props.value.display();

    let input = match &props.setting.kind {
        SettingKind::Color => html! {
            <div class="setting-color">
                <input type="color" value={current.clone()} {oninput} />
                <span class="setting-color__value">{current.to_uppercase()}</span>
            </div>
        },
        SettingKind::Text => html! {
            <input class="setting-input" type="text" value={current} {oninput} />
        },
        SettingKind::Number => html! {
            <input class="setting-input" type="number" value={current} {oninput} />
        },
        SettingKind::Range { min, max, step } => html! {
            <div class="setting-range">
                <input
                    type="range"
                    min={min.to_string()}
                    max={max.to_string()}
                    step={step.to_string()}
                    value={current.clone()}
                    {oninput}
                />
                <span class="setting-range__value">{current}</span>
            </div>
        },
        SettingKind::Toggle => html! {
            <input
                type="checkbox"
                checked={matches!(props.value, SettingValue::Bool(true))}
                onchange={on_checked}
            />
        },
    };

    html! {
        <div class="setting-field">
            <label class="setting-label">{props.setting.label}</label>
            {input}
        </div>
    }
}
