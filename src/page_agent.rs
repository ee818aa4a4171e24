//! Volume agent running in the page realm.
//!
//! Routes every `<video>`/`<audio>` element through a shared gain node and
//! applies gain commands posted by the content script. The agent is a
//! page-wide singleton: a flag on `window` makes repeated installs no-ops.

use wasm_bindgen::prelude::*;
use web_sys::{
    AudioContext, Document, Element, GainNode, HtmlMediaElement, MessageEvent, MutationObserver,
    MutationObserverInit, MutationRecord, Node, NodeList,
};

use crate::error::MountError;
use crate::features::volume_booster::{AGENT_SCRIPT_ID, LEVEL_ATTR};
use crate::messaging::{PageCommand, clamp_gain};

const INSTALL_FLAG: &str = "__pageFeaturesVolumeAgent";
const CONNECTED_ATTR: &str = "data-page-features-boosted";
const MEDIA_SELECTOR: &str = "video, audio";

pub fn install() -> Result<(), MountError> {
    let window = web_sys::window().ok_or_else(|| MountError::Dom("no window".to_string()))?;
    let flag = JsValue::from_str(INSTALL_FLAG);
    if js_sys::Reflect::get(&window, &flag)?.is_truthy() {
        log::debug!("Volume agent already installed");
        return Ok(());
    }
    js_sys::Reflect::set(&window, &flag, &JsValue::TRUE)?;

    let document = window
        .document()
        .ok_or_else(|| MountError::Dom("no document".to_string()))?;

    let context = AudioContext::new()?;
    let gain = context.create_gain()?;
    gain.connect_with_audio_node(&context.destination())?;
    gain.gain().set_value(initial_level(&document));

    connect_all(&context, &gain, &document.query_selector_all(MEDIA_SELECTOR)?);
    observe_media(&document, context.clone(), gain.clone())?;

    let listener = Closure::wrap(Box::new(move |event: MessageEvent| {
        let data = event.data();
        // Throws for non-object data, which is never ours either
        let kind = js_sys::Reflect::get(&data, &JsValue::from_str("type"))
            .ok()
            .and_then(|kind| kind.as_string());
        if !kind.is_some_and(|kind| PageCommand::is_known_type(&kind)) {
            return;
        }
        let Ok(data) = serde_wasm_bindgen::from_value::<serde_json::Value>(data) else {
            return;
        };
        if let Some(PageCommand::VolumeBoost { level }) = PageCommand::from_message(data) {
            gain.gain().set_value(clamp_gain(level));
            // Autoplay policy may have left the context suspended
            let _ = context.resume();
        }
    }) as Box<dyn FnMut(MessageEvent)>);
    window.add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())?;
    listener.forget();

    log::info!("Volume agent installed");
    Ok(())
}

/// Level the content script left on our script tag
fn initial_level(document: &Document) -> f32 {
    document
        .get_element_by_id(AGENT_SCRIPT_ID)
        .and_then(|script| script.get_attribute(LEVEL_ATTR))
        .and_then(|raw| raw.parse::<f64>().ok())
        .map(clamp_gain)
        .unwrap_or(1.0)
}

fn connect_element(context: &AudioContext, gain: &GainNode, media: &HtmlMediaElement) {
    if media.has_attribute(CONNECTED_ATTR) {
        return;
    }

    // Fails when the element is already routed elsewhere
    let connected = context
        .create_media_element_source(media)
        .and_then(|source| source.connect_with_audio_node(gain));
    match connected {
        Ok(_) => {
            let _ = media.set_attribute(CONNECTED_ATTR, "");
            log::debug!("Connected media element {}", media.current_src());
        }
        Err(e) => log::warn!("Failed to connect media element: {:?}", e),
    }
}

fn connect_all(context: &AudioContext, gain: &GainNode, nodes: &NodeList) {
    for i in 0..nodes.length() {
        if let Some(media) = nodes.get(i).and_then(|node| node.dyn_into::<HtmlMediaElement>().ok()) {
            connect_element(context, gain, &media);
        }
    }
}

fn observe_media(document: &Document, context: AudioContext, gain: GainNode) -> Result<(), MountError> {
    let callback = Closure::wrap(Box::new(move |records: js_sys::Array, _observer: MutationObserver| {
        for record in records.iter() {
            let record: MutationRecord = record.unchecked_into();
            let added = record.added_nodes();
            for i in 0..added.length() {
                let Some(node) = added.get(i) else {
                    continue;
                };
                if let Some(media) = node.dyn_ref::<HtmlMediaElement>() {
                    connect_element(&context, &gain, media);
                }
                if let Some(element) = node.dyn_ref::<Element>() {
                    if let Ok(nested) = element.query_selector_all(MEDIA_SELECTOR) {
                        connect_all(&context, &gain, &nested);
                    }
                }
            }
        }
    }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);

    let target: Node = match document.body() {
        Some(body) => body.into(),
        None => document
            .document_element()
            .ok_or_else(|| MountError::Dom("document has no root element".to_string()))?
            .into(),
    };
    observer.observe_with_options(&target, &options)?;
    callback.forget();
    Ok(())
}
