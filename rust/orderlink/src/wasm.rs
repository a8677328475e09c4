//! Browser entry points for the order linker

use std::cell::RefCell;

use js_sys::Array;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MutationObserver, Node};

use crate::config::LinkerConfig;
use crate::dom::{js_message, WebDocument, WebHost};
use crate::scanner::{extract, ChangeMonitor, Scanner, StartGate};

struct Linker {
    doc: WebDocument,
    monitor: ChangeMonitor<WebHost>,
}

thread_local! {
    static LINKER: RefCell<Option<Linker>> = const { RefCell::new(None) };
    static STARTED: StartGate = const { StartGate::new() };
}

fn on_linker_mutations(records: Array, _observer: MutationObserver) {
    LINKER.with(|cell| {
        // A batch that lands while we are rewriting is ours; skip it.
        let Ok(mut slot) = cell.try_borrow_mut() else {
            return;
        };
        if let Some(linker) = slot.as_mut() {
            let records = WebDocument::convert_records(&records);
            linker.monitor.on_mutations(&mut linker.doc, &records);
        }
    });
}

fn on_linker_tick() {
    LINKER.with(|cell| {
        let Ok(mut slot) = cell.try_borrow_mut() else {
            return;
        };
        if let Some(linker) = slot.as_mut() {
            linker.monitor.on_tick(&mut linker.doc);
        }
    });
}

fn on_unload() {
    LINKER.with(|cell| {
        if let Ok(mut slot) = cell.try_borrow_mut() {
            if let Some(mut linker) = slot.take() {
                linker.monitor.teardown();
                STARTED.with(StartGate::release);
            }
        }
    });
}

fn attach(config: LinkerConfig) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let mut doc = WebDocument::current().ok_or_else(|| JsValue::from_str("no document"))?;
    let body: Node = doc
        .inner()
        .body()
        .ok_or_else(|| JsValue::from_str("no body"))?
        .into();

    let on_mutations = Closure::wrap(Box::new(on_linker_mutations) as Box<dyn FnMut(Array, MutationObserver)>);
    let on_tick = Closure::wrap(Box::new(on_linker_tick) as Box<dyn FnMut()>);
    let host = WebHost::new(window.clone(), body, on_mutations, on_tick)?;
    let mut monitor = ChangeMonitor::new(Scanner::new(config), host);
    monitor.attach(&mut doc)?;

    let unload = Closure::wrap(Box::new(on_unload) as Box<dyn FnMut()>);
    window.add_event_listener_with_callback("beforeunload", unload.as_ref().unchecked_ref())?;
    unload.forget();

    LINKER.with(|cell| *cell.borrow_mut() = Some(Linker { doc, monitor }));
    Ok(())
}

/// Start linking order numbers on the current page.
///
/// `config` is an optional `LinkerConfig`-shaped object. Waits for
/// DOMContentLoaded while the document is still loading. Returns false when
/// a linker is already running.
#[wasm_bindgen(js_name = startOrderLinker)]
pub fn start_order_linker(config: JsValue) -> Result<bool, JsValue> {
    let config: LinkerConfig = if config.is_undefined() || config.is_null() {
        LinkerConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&format!("Invalid linker config: {}", e)))?
    };
    if !STARTED.with(StartGate::claim) {
        return Ok(false);
    }
    crate::console_log!("Order linker loaded");
    attach_when_ready(config).map(|()| true).map_err(|e| {
        STARTED.with(StartGate::release);
        e
    })
}

fn attach_when_ready(config: LinkerConfig) -> Result<(), JsValue> {
    let doc = WebDocument::current().ok_or_else(|| JsValue::from_str("no document"))?;
    if !doc.is_loading() {
        return attach(config);
    }
    let on_ready = Closure::once_into_js(move || {
        if let Err(e) = attach(config) {
            STARTED.with(StartGate::release);
            crate::console_error!("Order linker failed to start: {}", js_message(&e));
        }
    });
    doc.inner()
        .add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref())
}

/// Stop observing and clear the rescan timer. A later
/// `startOrderLinker` may start a fresh session.
#[wasm_bindgen(js_name = stopOrderLinker)]
pub fn stop_order_linker() {
    on_unload();
}

/// Resolved order links in `text`, as plain objects.
#[wasm_bindgen(js_name = extractOrderLinks)]
pub fn extract_order_links(text: &str) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&extract(text)).map_err(|e| JsValue::from_str(&e.to_string()))
}
