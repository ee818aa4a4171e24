/// Notice banner shown at the top of every page
use yew::prelude::*;

use crate::feature::{Behavior, FeatureDescriptor, FeatureSettings, SettingDescriptor, SettingKind, SettingValue};

pub const ID: &str = "notice-banner";

const DEFAULT_BACKGROUND: &str = "#ffcc00";
const DEFAULT_TEXT: &str = "Page Features active: notice banner running";
const DEFAULT_FONT_SIZE: f64 = 14.0;

pub fn feature() -> FeatureDescriptor {
    FeatureDescriptor::new(
        ID,
        "Notice banner",
        "Shows a banner at the top of every page saying the extension is running.",
        Behavior::Render(render),
    )
    .enabled_by_default(true)
    .setting(SettingDescriptor::new(
        "backgroundColor",
        "Background color",
        SettingKind::Color,
        SettingValue::Text(DEFAULT_BACKGROUND.to_string()),
    ))
    .setting(SettingDescriptor::new(
        "text",
        "Banner text",
        SettingKind::Text,
        SettingValue::Text(DEFAULT_TEXT.to_string()),
    ))
    .setting(SettingDescriptor::new(
        "fontSize",
        "Font size (px)",
        SettingKind::Number,
        SettingValue::Number(DEFAULT_FONT_SIZE),
    ))
}

fn render(settings: &FeatureSettings) -> Html {
    let background = settings
        .text("backgroundColor")
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_BACKGROUND);
    let text = settings.text("text").filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TEXT);
    let font_size = settings
        .number("fontSize")
        .filter(|size| *size > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE);

    html! {
        <div class="pf-banner" style={format!("background-color: {};", background)}>
            <span class="pf-banner__text" style={format!("font-size: {}px;", font_size)}>
                {text}
            </span>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_descriptor() {
        let feature = feature();

        assert_eq!(feature.id, ID);
        assert!(feature.initial_state);
        assert!(feature.match_rules.is_empty());
        assert!(matches!(feature.behavior, Behavior::Render(_)));

        let defaults = feature.resolve_settings(None);
        assert_eq!(defaults.text("backgroundColor"), Some(DEFAULT_BACKGROUND));
        assert_eq!(defaults.number("fontSize"), Some(14.0));
    }
}
