//! Page chrome patches for Brightree screens
//!
//! Strips inline styling from `div.col-lg-9` and, on transport manager
//! pages, adds a "Today" button under date inputs. Runs on its own observer
//! and timer, separate from the order linker.

use std::cell::RefCell;
use std::sync::OnceLock;

use chrono::{Local, NaiveDate};
use js_sys::Array;
use regex::Regex;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MutationObserver, Node};

use crate::config::RESCAN_INTERVAL_MS;
use crate::dom::{js_message, AttrTest, DomError, Document, Mutation, NodeKind, Selector, WebDocument, WebHost};
use crate::scanner::{MonitorHost, StartGate};

const CONTENT_COLUMN: &str = "col-lg-9";
const TODAY_CLASS: &str = "today-button";
const TODAY_BUTTON_CLASSES: &str = "btn btn-primary btn-xs today-button";
const TODAY_BUTTON_STYLE: &str = "margin-top: 5px; display: block;";

const WIDE_COLUMNS: Selector = Selector::simple("div.col-lg-9", Some("div"), &[AttrTest::Class(CONTENT_COLUMN)]);
const HALF_COLUMNS: Selector = Selector::simple("div.col-lg-6", Some("div"), &[AttrTest::Class("col-lg-6")]);
const TEXT_INPUTS: Selector =
    Selector::simple("input[type=\"text\"]", Some("input"), &[AttrTest::Equals("type", "text")]);
const TODAY_BUTTONS: Selector = Selector::simple(".today-button", None, &[AttrTest::Class(TODAY_CLASS)]);

/// Whether `url` is a transport manager page.
pub fn is_transport_manager(url: &str) -> bool {
    static PAGE: OnceLock<Regex> = OnceLock::new();
    PAGE.get_or_init(|| {
        Regex::new(r"https://mobiledelivery\.brightree\.net/transportmanager/.*")
            .expect("transport manager pattern compiles")
    })
    .is_match(url)
}

/// `MM/DD/YYYY`
pub fn today_string(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// Remove inline styles from every `div.col-lg-9` and drop all its other
/// classes. Returns how many elements were touched.
pub fn strip_column_styling<D: Document>(doc: &mut D) -> Result<usize, DomError> {
    let columns = doc.select_all(&WIDE_COLUMNS);
    for column in &columns {
        doc.remove_attribute(column, "style")?;
        let class = doc.attribute(column, "class").unwrap_or_default();
        let kept: Vec<&str> = class.split(' ').filter(|c| *c == CONTENT_COLUMN).collect();
        doc.set_attribute(column, "class", &kept.join(" "))?;
    }
    Ok(columns.len())
}

/// Add a Today button after the first text input of each `div.col-lg-6`
/// that lacks one. Returns the new `(button, input)` pairs.
pub fn add_today_buttons<D: Document>(doc: &mut D) -> Result<Vec<(D::Node, D::Node)>, DomError> {
    let mut added = Vec::new();
    for column in doc.select_all(&HALF_COLUMNS) {
        let Some(input) = doc.select_within(&column, &TEXT_INPUTS).into_iter().next() else {
            continue;
        };
        if !doc.select_within(&column, &TODAY_BUTTONS).is_empty() {
            continue;
        }
        let button = doc.create_element("button")?;
        doc.set_attribute(&button, "type", "button")?;
        doc.set_attribute(&button, "class", TODAY_BUTTON_CLASSES)?;
        doc.set_attribute(&button, "style", TODAY_BUTTON_STYLE)?;
        doc.set_text_content(&button, "Today")?;
        doc.insert_after(&input, &button)?;
        added.push((button, input));
    }
    Ok(added)
}

// =============================================================================
// Patcher
// =============================================================================

/// What a batch of added nodes calls for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchNeeds {
    pub columns: bool,
    pub buttons: bool,
}

/// Applies the patches for one page URL.
#[derive(Debug, Clone)]
pub struct ChromePatcher {
    transport_manager: bool,
}

impl ChromePatcher {
    pub fn for_url(url: &str) -> Self {
        Self {
            transport_manager: is_transport_manager(url),
        }
    }

    pub fn is_transport_manager(&self) -> bool {
        self.transport_manager
    }

    /// Full pass: column cleanup everywhere, buttons on transport pages.
    pub fn apply<D: Document>(&self, doc: &mut D) -> Result<Vec<(D::Node, D::Node)>, DomError> {
        strip_column_styling(doc)?;
        if self.transport_manager {
            add_today_buttons(doc)
        } else {
            Ok(Vec::new())
        }
    }

    /// Inspect the element subtrees a batch added.
    pub fn needs<D: Document>(&self, doc: &D, records: &[Mutation<D::Node>]) -> PatchNeeds {
        let mut needs = PatchNeeds::default();
        for record in records {
            let Mutation::ChildList { added, .. } = record else {
                continue;
            };
            for node in added.iter().filter(|n| doc.kind(n) == NodeKind::Element) {
                needs.columns |= Self::holds(doc, node, &WIDE_COLUMNS);
                needs.buttons |= self.transport_manager && Self::holds(doc, node, &HALF_COLUMNS);
            }
        }
        needs
    }

    /// Patch only what `needs` asks for.
    pub fn apply_needs<D: Document>(
        &self,
        doc: &mut D,
        needs: PatchNeeds,
    ) -> Result<Vec<(D::Node, D::Node)>, DomError> {
        if needs.columns {
            strip_column_styling(doc)?;
        }
        if needs.buttons {
            add_today_buttons(doc)
        } else {
            Ok(Vec::new())
        }
    }

    fn holds<D: Document>(doc: &D, node: &D::Node, selector: &Selector) -> bool {
        selector.matches(doc, node) || !doc.select_within(node, selector).is_empty()
    }
}

// =============================================================================
// WASM Bindings
// =============================================================================

struct ChromeSession {
    doc: WebDocument,
    patcher: ChromePatcher,
    host: WebHost,
}

thread_local! {
    static SESSION: RefCell<Option<ChromeSession>> = const { RefCell::new(None) };
    static STARTED: StartGate = const { StartGate::new() };
}

fn wire_today_button(button: &Node, input: &Node) -> Result<(), JsValue> {
    let input: web_sys::HtmlInputElement = input.clone().dyn_into()?;
    let on_click = Closure::wrap(Box::new(move || {
        let date = today_string(Local::now().date_naive());
        input.set_value(&date);
        let init = web_sys::EventInit::new();
        init.set_bubbles(true);
        let dispatched = web_sys::Event::new_with_event_init_dict("change", &init)
            .and_then(|event| input.dispatch_event(&event));
        match dispatched {
            Ok(_) => crate::console_log!("Today button set date to {}", date),
            Err(e) => crate::console_error!("Failed to dispatch change: {}", js_message(&e)),
        }
    }) as Box<dyn FnMut()>);
    button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
    on_click.forget();
    Ok(())
}

fn wire_all(pairs: Result<Vec<(Node, Node)>, DomError>) {
    match pairs {
        Ok(pairs) => {
            for (button, input) in &pairs {
                if let Err(e) = wire_today_button(button, input) {
                    crate::console_error!("Failed to wire Today button: {}", js_message(&e));
                }
            }
        }
        Err(e) => crate::console_error!("Page patch failed: {}", e),
    }
}

fn on_chrome_mutations(records: Array, _observer: MutationObserver) {
    SESSION.with(|cell| {
        let Ok(mut slot) = cell.try_borrow_mut() else {
            return;
        };
        if let Some(session) = slot.as_mut() {
            let records = WebDocument::convert_records(&records);
            let needs = session.patcher.needs(&session.doc, &records);
            wire_all(session.patcher.apply_needs(&mut session.doc, needs));
        }
    });
}

fn on_chrome_tick() {
    SESSION.with(|cell| {
        let Ok(mut slot) = cell.try_borrow_mut() else {
            return;
        };
        if let Some(session) = slot.as_mut() {
            wire_all(session.patcher.apply(&mut session.doc));
        }
    });
}

fn start_session() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let mut doc = WebDocument::current().ok_or_else(|| JsValue::from_str("no document"))?;
    let url = window.location().href()?;
    let patcher = ChromePatcher::for_url(&url);
    if patcher.is_transport_manager() {
        crate::console_log!("Transport Manager page detected");
    }
    wire_all(patcher.apply(&mut doc));

    let on_mutations = Closure::wrap(Box::new(on_chrome_mutations) as Box<dyn FnMut(Array, MutationObserver)>);
    let on_tick = Closure::wrap(Box::new(on_chrome_tick) as Box<dyn FnMut()>);
    let body: Node = doc
        .inner()
        .body()
        .ok_or_else(|| JsValue::from_str("no body"))?
        .into();
    let mut host = WebHost::new(window.clone(), body, on_mutations, on_tick)?.structural_only();
    host.observe()?;
    host.start_timer(std::time::Duration::from_millis(u64::from(RESCAN_INTERVAL_MS)))?;

    let on_unload = Closure::wrap(Box::new(|| {
        SESSION.with(|cell| {
            if let Ok(mut slot) = cell.try_borrow_mut() {
                // Dropping the host disconnects the observer and clears the interval.
                if slot.take().is_some() {
                    STARTED.with(StartGate::release);
                }
            }
        });
    }) as Box<dyn FnMut()>);
    window.add_event_listener_with_callback("beforeunload", on_unload.as_ref().unchecked_ref())?;
    on_unload.forget();

    SESSION.with(|cell| {
        *cell.borrow_mut() = Some(ChromeSession { doc, patcher, host });
    });
    Ok(())
}

/// Start the Brightree page patches. Waits for DOMContentLoaded while the
/// document is still loading. Returns false when already running.
#[wasm_bindgen(js_name = startPageChrome)]
pub fn js_start_page_chrome() -> Result<bool, JsValue> {
    if !STARTED.with(StartGate::claim) {
        return Ok(false);
    }
    start_when_ready().map(|()| true).map_err(|e| {
        STARTED.with(StartGate::release);
        e
    })
}

fn start_when_ready() -> Result<(), JsValue> {
    let doc = WebDocument::current().ok_or_else(|| JsValue::from_str("no document"))?;
    if !doc.is_loading() {
        return start_session();
    }
    let on_ready = Closure::once_into_js(|| {
        if let Err(e) = start_session() {
            STARTED.with(StartGate::release);
            crate::console_error!("Page chrome failed to start: {}", js_message(&e));
        }
    });
    doc.inner()
        .add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref())
}
