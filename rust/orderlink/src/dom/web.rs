//! WebDocument: `Document` over the live browser DOM via web-sys
//!
//! Also provides `WebHost`, the browser `MonitorHost`: a `MutationObserver`
//! on the body and a `setInterval` fallback timer.

use std::time::Duration;

use js_sys::Array;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CharacterData, Element, MutationObserver, MutationObserverInit, MutationRecord, Node, Window};

use super::{DomError, Document, Mutation, NodeKind, Selector};
use crate::scanner::{MonitorError, MonitorHost};

/// Best-effort message from a thrown JS value
pub fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

impl DomError {
    pub fn from_js(value: JsValue) -> Self {
        DomError::Host(js_message(&value))
    }
}

impl From<DomError> for JsValue {
    fn from(err: DomError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<MonitorError> for JsValue {
    fn from(err: MonitorError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

fn as_element(node: &Node) -> Result<&Element, DomError> {
    node.dyn_ref::<Element>().ok_or(DomError::NotAnElement)
}

fn collect_nodes(list: &web_sys::NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}

// =============================================================================
// WebDocument
// =============================================================================

#[derive(Debug, Clone)]
pub struct WebDocument {
    document: web_sys::Document,
}

impl WebDocument {
    pub fn new(document: web_sys::Document) -> Self {
        Self { document }
    }

    /// The document of the current window, if any.
    pub fn current() -> Option<Self> {
        web_sys::window()?.document().map(Self::new)
    }

    pub fn inner(&self) -> &web_sys::Document {
        &self.document
    }

    /// `document.readyState == "loading"`
    pub fn is_loading(&self) -> bool {
        js_sys::Reflect::get(&self.document, &JsValue::from_str("readyState"))
            .ok()
            .and_then(|v| v.as_string())
            .map_or(false, |state| state == "loading")
    }

    /// Convert a JS array of `MutationRecord`s into `Mutation`s.
    pub fn convert_records(records: &Array) -> Vec<Mutation<Node>> {
        let mut out = Vec::with_capacity(records.length() as usize);
        for value in records.iter() {
            let Ok(record) = value.dyn_into::<MutationRecord>() else {
                continue;
            };
            let Some(target) = record.target() else {
                continue;
            };
            match record.type_().as_str() {
                "childList" => out.push(Mutation::ChildList {
                    target,
                    added: collect_nodes(&record.added_nodes()),
                    removed: collect_nodes(&record.removed_nodes()),
                }),
                "characterData" => out.push(Mutation::CharacterData { target }),
                _ => {}
            }
        }
        out
    }
}

impl Document for WebDocument {
    type Node = Node;

    fn root(&self) -> Option<Node> {
        self.document.document_element().map(Node::from)
    }

    fn body(&self) -> Option<Node> {
        self.document.body().map(Node::from)
    }

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        node.dyn_ref::<Element>()
            .map(|e| e.tag_name().to_ascii_lowercase())
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        collect_nodes(&node.child_nodes())
    }

    fn text(&self, node: &Node) -> Option<String> {
        if node.node_type() == Node::TEXT_NODE {
            node.text_content()
        } else {
            None
        }
    }

    fn create_text(&mut self, data: &str) -> Result<Node, DomError> {
        Ok(self.document.create_text_node(data).into())
    }

    fn create_element(&mut self, tag: &str) -> Result<Node, DomError> {
        self.document
            .create_element(tag)
            .map(Node::from)
            .map_err(DomError::from_js)
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> Result<(), DomError> {
        as_element(node)?
            .set_attribute(name, value)
            .map_err(DomError::from_js)
    }

    fn remove_attribute(&mut self, node: &Node, name: &str) -> Result<(), DomError> {
        as_element(node)?
            .remove_attribute(name)
            .map_err(DomError::from_js)
    }

    fn set_text_content(&mut self, node: &Node, text: &str) -> Result<(), DomError> {
        node.set_text_content(Some(text));
        Ok(())
    }

    fn insert_after(&mut self, reference: &Node, node: &Node) -> Result<(), DomError> {
        let parent = reference.parent_node().ok_or(DomError::Detached)?;
        parent
            .insert_before(node, reference.next_sibling().as_ref())
            .map(|_| ())
            .map_err(DomError::from_js)
    }

    /// `ChildNode.replaceWith`: one childList record on the parent.
    fn replace_with(&mut self, old: &Node, replacements: &[Node]) -> Result<(), DomError> {
        if old.parent_node().is_none() {
            return Err(DomError::Detached);
        }
        let nodes: Array = replacements.iter().collect();
        let replaced = if let Some(data) = old.dyn_ref::<CharacterData>() {
            data.replace_with_with_node(&nodes)
        } else if let Some(element) = old.dyn_ref::<Element>() {
            element.replace_with_with_node(&nodes)
        } else {
            return Err(DomError::NotAnElement);
        };
        replaced.map_err(DomError::from_js)
    }

    fn select_all(&self, selector: &Selector) -> Vec<Node> {
        match self.document.query_selector_all(selector.css) {
            Ok(list) => collect_nodes(&list),
            Err(e) => {
                crate::console_error!("Invalid selector {}: {}", selector.css, js_message(&e));
                Vec::new()
            }
        }
    }

    fn select_within(&self, scope: &Node, selector: &Selector) -> Vec<Node> {
        let Some(element) = scope.dyn_ref::<Element>() else {
            return Vec::new();
        };
        match element.query_selector_all(selector.css) {
            Ok(list) => collect_nodes(&list),
            Err(e) => {
                crate::console_error!("Invalid selector {}: {}", selector.css, js_message(&e));
                Vec::new()
            }
        }
    }
}

// =============================================================================
// WebHost
// =============================================================================

/// Browser observer and timer handles, owned by a `ChangeMonitor`.
///
/// The callbacks are kept alive here and dropped with the host.
pub struct WebHost {
    window: Window,
    target: Node,
    observer: MutationObserver,
    init: MutationObserverInit,
    on_tick: Closure<dyn FnMut()>,
    interval: Option<i32>,
    _on_mutations: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl WebHost {
    /// Observe `target` for child-list, subtree and character-data changes.
    pub fn new(
        window: Window,
        target: Node,
        on_mutations: Closure<dyn FnMut(Array, MutationObserver)>,
        on_tick: Closure<dyn FnMut()>,
    ) -> Result<Self, MonitorError> {
        let observer = MutationObserver::new(on_mutations.as_ref().unchecked_ref())
            .map_err(|e| MonitorError::Observer(js_message(&e)))?;
        Ok(Self {
            window,
            target,
            observer,
            init: Self::observer_init(true),
            on_tick,
            interval: None,
            _on_mutations: on_mutations,
        })
    }

    /// Observe child lists only (page chrome does not care about text edits).
    pub fn structural_only(mut self) -> Self {
        self.init = Self::observer_init(false);
        self
    }

    fn observer_init(character_data: bool) -> MutationObserverInit {
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_character_data(character_data);
        init
    }
}

impl MonitorHost for WebHost {
    fn observe(&mut self) -> Result<(), MonitorError> {
        self.observer
            .observe_with_options(&self.target, &self.init)
            .map_err(|e| MonitorError::Observer(js_message(&e)))
    }

    fn disconnect(&mut self) {
        self.observer.disconnect();
    }

    fn start_timer(&mut self, period: Duration) -> Result<(), MonitorError> {
        self.clear_timer();
        let millis = i32::try_from(period.as_millis()).unwrap_or(i32::MAX);
        let handle = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                self.on_tick.as_ref().unchecked_ref(),
                millis,
            )
            .map_err(|e| MonitorError::Timer(js_message(&e)))?;
        self.interval = Some(handle);
        Ok(())
    }

    fn clear_timer(&mut self) {
        if let Some(handle) = self.interval.take() {
            self.window.clear_interval_with_handle(handle);
        }
    }
}

/// The callbacks die with the host, so the observer and the interval must
/// not outlive it.
impl Drop for WebHost {
    fn drop(&mut self) {
        self.disconnect();
        self.clear_timer();
    }
}
