/// One-way messages from the content script into the page realm
use serde::{Deserialize, Serialize};

use crate::error::MountError;

/// Upper bound for the gain the page agent will apply
pub const MAX_GAIN: f64 = 5.0;

/// `type` tag of [`PageCommand::VolumeBoost`]
pub const VOLUME_BOOST: &str = "PAGE_FEATURES_VOLUME_BOOST";

/// Envelope posted with `window.postMessage`, shaped `{ type, payload }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PageCommand {
    #[serde(rename = "PAGE_FEATURES_VOLUME_BOOST")]
    VolumeBoost { level: f64 },
}

impl PageCommand {
    /// Decode a message received in the page realm.
    ///
    /// Anything that is not one of our commands (other scripts post messages
    /// too) decodes to `None` and must be ignored.
    pub fn from_message(data: serde_json::Value) -> Option<PageCommand> {
        serde_json::from_value(data).ok()
    }

    /// Whether a message `type` names one of our commands
    pub fn is_known_type(kind: &str) -> bool {
        kind == VOLUME_BOOST
    }
}

/// Clamp a requested gain into the range the agent accepts
pub fn clamp_gain(level: f64) -> f32 {
    if level.is_finite() {
        level.clamp(0.0, MAX_GAIN) as f32
    } else {
        1.0
    }
}

/// Post a command to the page realm of the current window
pub fn post_to_page(command: &PageCommand) -> Result<(), MountError> {
    let window = web_sys::window().ok_or_else(|| MountError::Dom("no window".to_string()))?;
    let message = command
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| MountError::Script(e.to_string()))?;
    window.post_message(&message, "*")?;
    Ok(())
}
