/// Tab volume booster.
///
/// Audio nodes have to live in the page realm, so activation injects the page
/// agent (see `page_agent`) once and then drives it with gain messages.
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlScriptElement};

use crate::chrome;
use crate::dom::{self, Surface};
use crate::error::MountError;
use crate::feature::{
    Behavior, FeatureDescriptor, FeatureSettings, ImperativeFeature, SettingDescriptor, SettingKind, SettingValue,
};
use crate::messaging::{PageCommand, post_to_page};

pub const ID: &str = "volume-booster";

/// Element id of the injected agent script; also its idempotency marker
pub const AGENT_SCRIPT_ID: &str = "page-features-volume-agent";
/// Gain applied by the agent when it starts, before any message arrives
pub const LEVEL_ATTR: &str = "data-initial-level";

const AGENT_SCRIPT: &str = "volume-agent.js";
const BADGE_ID: &str = "volume-booster-badge";
const LEVEL: &str = "level";
const UNITY_GAIN: f64 = 1.0;

pub fn feature() -> FeatureDescriptor {
    FeatureDescriptor::new(
        ID,
        "Tab volume booster",
        "Amplifies the sound of the current tab up to 500%.",
        Behavior::Imperative(Box::new(VolumeBooster)),
    )
    .setting(SettingDescriptor::new(
        LEVEL,
        "Boost level (1.0 = normal)",
        SettingKind::Range {
            min: 1.0,
            max: 5.0,
            step: 0.1,
        },
        SettingValue::Number(UNITY_GAIN),
    ))
}

pub struct VolumeBooster;

impl ImperativeFeature for VolumeBooster {
    fn execute(&self, settings: &FeatureSettings) -> Result<(), MountError> {
        let level = settings.number(LEVEL).unwrap_or(UNITY_GAIN);

        ensure_agent(level)?;
        post_to_page(&PageCommand::VolumeBoost { level })?;

        if level > UNITY_GAIN {
            show_badge(level)
        } else {
            dom::remove_surface(BADGE_ID)
        }
    }

    fn cleanup(&self) -> Result<(), MountError> {
        // The agent stays installed; it is quiesced back to unity gain
        dom::remove_surface(BADGE_ID)?;
        if let Some(script) = dom::document()?.get_element_by_id(AGENT_SCRIPT_ID) {
            script.set_attribute(LEVEL_ATTR, &UNITY_GAIN.to_string())?;
        }
        post_to_page(&PageCommand::VolumeBoost { level: UNITY_GAIN })
    }
}

/// Inject the agent script unless a previous activation already did
fn ensure_agent(level: f64) -> Result<(), MountError> {
    let document = dom::document()?;

    if let Some(script) = document.get_element_by_id(AGENT_SCRIPT_ID) {
        script.set_attribute(LEVEL_ATTR, &level.to_string())?;
        return Ok(());
    }

    let script: HtmlScriptElement = document.create_element("script")?.unchecked_into();
    script.set_id(AGENT_SCRIPT_ID);
    script.set_type("module");
    script.set_attribute(LEVEL_ATTR, &level.to_string())?;
    script.set_src(&chrome::runtime_url(AGENT_SCRIPT)?);

    let parent: Element = match document.head() {
        Some(head) => head.into(),
        None => document
            .document_element()
            .ok_or_else(|| MountError::Dom("document has no root element".to_string()))?,
    };
    parent.append_child(&script)?;
    log::debug!("Injected volume agent from {}", script.src());
    Ok(())
}

fn show_badge(level: f64) -> Result<(), MountError> {
    let surface = Surface::attach(BADGE_ID)?;
    surface.container.set_class_name("pf-badge");
    surface.container.set_text_content(Some(&badge_text(level)));
    Ok(())
}

fn badge_text(level: f64) -> String {
    format!("🔊 {}%", (level * 100.0).round())
}
