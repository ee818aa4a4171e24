/// Style-isolated rendering surfaces attached to the host page
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, ShadowRoot, ShadowRootInit, ShadowRootMode};

use crate::error::MountError;

const STYLE_MARKER: &str = "data-page-features-styles";

/// Scoped styles injected once into every surface's shadow root
const SURFACE_STYLES: &str = r#"
:host { all: initial; }
.pf-banner { box-sizing: border-box; width: 100%; padding: 12px; text-align: center;
  box-shadow: 0 2px 5px rgba(0, 0, 0, 0.2); font-family: system-ui, sans-serif; }
.pf-banner__text { font-weight: bold; color: #000; }
.pf-badge { position: fixed; top: 16px; right: 16px; padding: 6px 12px; border-radius: 9999px;
  background: #4f46e5; color: #fff; font: 14px ui-monospace, monospace; opacity: 0.9;
  box-shadow: 0 4px 12px rgba(0, 0, 0, 0.25); pointer-events: none; }
"#;

pub fn document() -> Result<Document, MountError> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| MountError::Dom("no document".to_string()))
}

/// Container inside a surface's shadow root that content renders into
pub struct Surface {
    pub container: Element,
}

impl Surface {
    /// Attach the surface with this id, or reuse it when it already exists.
    ///
    /// The host is a fixed, zero-height, click-through overlay; the container
    /// inside the shadow root re-enables pointer events for its content.
    pub fn attach(id: &str) -> Result<Surface, MountError> {
        let document = document()?;

        if let Some(existing) = document.get_element_by_id(id) {
            let host: HtmlElement = existing
                .dyn_into()
                .map_err(|_| MountError::Dom(format!("#{} is not an HTML element", id)))?;
            if let Some(shadow_root) = host.shadow_root() {
                if let Some(container) = shadow_root.query_selector("div")? {
                    return Ok(Surface { container });
                }
            }
            // Half-built leftover from a failed mount; rebuild from scratch
            host.remove();
        }

        let host: HtmlElement = document.create_element("div")?.unchecked_into();
        host.set_id(id);
        let style = host.style();
        style.set_property("position", "fixed")?;
        style.set_property("top", "0")?;
        style.set_property("left", "0")?;
        style.set_property("width", "100%")?;
        style.set_property("height", "0")?;
        style.set_property("z-index", "2147483647")?;
        style.set_property("pointer-events", "none")?;

        let mount_point: Element = match document.body() {
            Some(body) => body.into(),
            None => document
                .document_element()
                .ok_or_else(|| MountError::Dom("document has no root element".to_string()))?,
        };
        mount_point.append_child(&host)?;

        let shadow_root = host.attach_shadow(&ShadowRootInit::new(ShadowRootMode::Open))?;
        inject_styles(&document, &shadow_root)?;

        let container: HtmlElement = document.create_element("div")?.unchecked_into();
        container.style().set_property("pointer-events", "auto")?;
        shadow_root.append_child(&container)?;

        Ok(Surface {
            container: container.into(),
        })
    }
}

fn inject_styles(document: &Document, shadow_root: &ShadowRoot) -> Result<(), MountError> {
    let selector = format!("style[{}]", STYLE_MARKER);
    if shadow_root.query_selector(&selector)?.is_some() {
        return Ok(());
    }

    let style = document.create_element("style")?;
    style.set_attribute(STYLE_MARKER, "")?;
    style.set_text_content(Some(SURFACE_STYLES));
    shadow_root.append_child(&style)?;
    Ok(())
}

/// Remove the surface with this id, if present
pub fn remove_surface(id: &str) -> Result<(), MountError> {
    if let Some(host) = document()?.get_element_by_id(id) {
        host.remove();
    }
    Ok(())
}

/// Stable surface id for a feature
pub fn surface_id(feature_id: &str) -> String {
    format!("{}-root", feature_id)
}
