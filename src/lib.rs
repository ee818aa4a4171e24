/// Page Features - browser extension feature host
/// Built with Rust + WASM + Yew

pub mod chrome;
pub mod config;
pub mod content;
pub mod dom;
pub mod error;
pub mod feature;
pub mod features;
pub mod lifecycle;
pub mod messaging;
pub mod mount;
pub mod page_agent;
pub mod registry;
pub mod storage;
pub mod ui;
pub mod url_matcher;

use std::sync::Once;

use wasm_bindgen::prelude::*;

use crate::config::HostConfig;

static LOGGER: Once = Once::new();

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
}

fn init(config: JsValue) -> HostConfig {
    let (config, problem) = match HostConfig::from_js(config) {
        Ok(config) => (config, None),
        Err(e) => (HostConfig::default(), Some(e)),
    };

    LOGGER.call_once(|| wasm_logger::init(wasm_logger::Config::new(config.level())));
    if let Some(e) = problem {
        log::warn!("{}; using defaults", e);
    }
    config
}

// Start the feature runtime in a content script
#[wasm_bindgen]
pub fn start_content(config: JsValue) {
    content::start(init(config));
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup(config: JsValue) {
    let config = init(config);
    yew::Renderer::<ui::popup::App>::with_props(ui::popup::AppProps { config }).render();
}

// Install the volume agent in the page realm
#[wasm_bindgen]
pub fn install_volume_agent() -> Result<(), JsValue> {
    init(JsValue::UNDEFINED);
    page_agent::install().map_err(|e| JsValue::from_str(&e.to_string()))
}
