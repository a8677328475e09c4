//! Popup interceptor
//!
//! Turns popup-style `window.open` calls into plain new tabs. Independent of
//! the linker: no shared state beyond its own install flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use regex::Regex;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::dom::js_message;

/// Window-feature fragments that mark a popup request
const POPUP_FEATURES: &[&str] = &[
    "width=",
    "height=",
    "left=",
    "top=",
    "toolbar=",
    "menubar=",
    "scrollbars=",
    "resizable=",
    "location=",
    "status=",
    "popup",
    "modal",
    "dialog",
];

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Whether a `window.open` features string asks for a popup window.
pub fn should_force_tab(features: &str) -> bool {
    let features = features.to_lowercase();
    POPUP_FEATURES.iter().any(|f| features.contains(f))
}

/// First quoted URL passed to `window.open(...)` in an inline handler.
pub fn window_open_url(onclick: &str) -> Option<String> {
    static OPEN_CALL: OnceLock<Regex> = OnceLock::new();
    if !onclick.contains("window.open") {
        return None;
    }
    let re = OPEN_CALL.get_or_init(|| {
        Regex::new(r#"window\.open\s*\(\s*['"`]([^'"`]+)['"`]"#).expect("window.open pattern compiles")
    });
    re.captures(onclick).map(|cap| cap[1].to_string())
}

/// Claim the process-wide install slot. Only the first caller gets `true`.
pub fn install() -> bool {
    INSTALLED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
}

/// Release the install slot after a failed installation.
fn release() {
    INSTALLED.store(false, Ordering::SeqCst);
}

pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

// =============================================================================
// WASM Bindings
// =============================================================================

/// Wrap `window.open` and catch clicks on anchors whose inline handler
/// opens a window. Returns false when already installed.
#[wasm_bindgen(js_name = installPopupInterceptor)]
pub fn js_install_popup_interceptor() -> Result<bool, JsValue> {
    if !install() {
        return Ok(false);
    }
    match wire_browser() {
        Ok(()) => {
            crate::console_log!("Popup interceptor loaded");
            Ok(true)
        }
        Err(e) => {
            release();
            Err(e)
        }
    }
}

fn wire_browser() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let original: js_sys::Function =
        js_sys::Reflect::get(&window, &JsValue::from_str("open"))?.dyn_into()?;
    let context = window.clone();
    let open = Closure::wrap(Box::new(move |url: JsValue, target: JsValue, features: JsValue| -> JsValue {
        let forced = features
            .as_string()
            .map_or(false, |f| should_force_tab(&f));
        let result = if forced {
            original.call2(&context, &url, &JsValue::from_str("_blank"))
        } else {
            original.call3(&context, &url, &target, &features)
        };
        result.unwrap_or_else(|e| {
            crate::console_error!("window.open failed: {}", js_message(&e));
            JsValue::NULL
        })
    }) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>);
    js_sys::Reflect::set(&window, &JsValue::from_str("open"), open.as_ref())?;
    open.forget();

    let click_window = window.clone();
    let on_click = Closure::wrap(Box::new(move |event: web_sys::Event| {
        let Some(anchor) = event
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
            .and_then(|el| el.closest("a").ok().flatten())
        else {
            return;
        };
        let Some(url) = anchor
            .get_attribute("onclick")
            .and_then(|handler| window_open_url(&handler))
        else {
            return;
        };
        event.prevent_default();
        event.stop_immediate_propagation();
        if let Err(e) = click_window.open_with_url_and_target(&url, "_blank") {
            crate::console_error!("Failed to open {}: {}", url, js_message(&e));
        }
    }) as Box<dyn FnMut(web_sys::Event)>);
    document.add_event_listener_with_callback_and_bool("click", on_click.as_ref().unchecked_ref(), true)?;
    on_click.forget();
    Ok(())
}
