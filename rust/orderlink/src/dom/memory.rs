//! MemoryDocument: arena-backed document tree
//!
//! Headless stand-in for the browser DOM. Nodes live in a `Vec` and are
//! addressed by `NodeId`; removed nodes stay in the arena, detached.
//! While observed, every change on a connected node queues a `Mutation`
//! record that `take_records()` drains in order.

use super::{DomError, Document, Mutation, NodeKind};

/// Handle into a `MemoryDocument` arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    read_only: bool,
}

/// Elements serialised without a closing tag
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<NodeEntry>,
    root: NodeId,
    body: NodeId,
    observing: bool,
    records: Vec<Mutation<NodeId>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// `<html><head></head><body></body></html>`
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            observing: false,
            records: Vec::new(),
        };
        let root = doc.alloc_element("html");
        let head = doc.alloc_element("head");
        let body = doc.alloc_element("body");
        doc.link(root, head, None);
        doc.link(root, body, None);
        doc.root = root;
        doc.body = body;
        doc
    }

    // -------------------------------------------------------------------------
    // Building
    // -------------------------------------------------------------------------

    /// Create a detached element with attributes.
    pub fn element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.alloc_element(tag);
        if let NodeData::Element { attrs: slot, .. } = &mut self.nodes[id.0].data {
            slot.extend(attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        }
        id
    }

    /// Create a detached text node.
    pub fn text_node(&mut self, data: &str) -> NodeId {
        self.alloc(NodeData::Text(data.to_string()))
    }

    pub fn comment(&mut self, data: &str) -> NodeId {
        self.alloc(NodeData::Comment(data.to_string()))
    }

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert(parent, child, None)
    }

    /// Detach `node` from its parent.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        let parent = self.entry(node)?.parent.ok_or(DomError::Detached)?;
        self.check_writable(parent)?;
        self.unlink(node);
        self.record(
            parent,
            Mutation::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            },
        );
        Ok(())
    }

    /// Change the data of a text node (a characterData mutation).
    pub fn set_text(&mut self, node: NodeId, data: &str) -> Result<(), DomError> {
        self.check_writable(node)?;
        match &mut self.entry_mut(node)?.data {
            NodeData::Text(current) => {
                *current = data.to_string();
            }
            _ => return Err(DomError::NotAText),
        }
        self.record(node, Mutation::CharacterData { target: node });
        Ok(())
    }

    /// Freeze a node: any mutation of it, or splice into it, fails with
    /// `DomError::ReadOnly`.
    pub fn set_read_only(&mut self, node: NodeId, read_only: bool) {
        if let Some(entry) = self.nodes.get_mut(node.0) {
            entry.read_only = read_only;
        }
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// Start queueing mutation records.
    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Stop queueing and drop pending records.
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.records.clear();
    }

    /// Drain pending mutation records.
    pub fn take_records(&mut self) -> Vec<Mutation<NodeId>> {
        std::mem::take(&mut self.records)
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Whether `node` is reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == self.root {
                return true;
            }
            current = self.nodes.get(n.0).and_then(|e| e.parent);
        }
        false
    }

    /// Concatenated text of every text node below (and including) `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.serialize(node, &mut out);
        out
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(entry) = self.nodes.get(node.0) {
            for child in &entry.children {
                self.serialize(*child, &mut out);
            }
        }
        out
    }

    /// Every `<a>` element below `node`, in document order.
    pub fn links(&self, node: NodeId) -> Vec<NodeId> {
        self.descendants(&node)
            .into_iter()
            .filter(|n| self.tag_name(n).as_deref() == Some("a"))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            data,
            parent: None,
            children: Vec::new(),
            read_only: false,
        });
        id
    }

    fn alloc_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    fn entry(&self, node: NodeId) -> Result<&NodeEntry, DomError> {
        self.nodes
            .get(node.0)
            .ok_or_else(|| DomError::Host(format!("unknown node {:?}", node)))
    }

    fn entry_mut(&mut self, node: NodeId) -> Result<&mut NodeEntry, DomError> {
        self.nodes
            .get_mut(node.0)
            .ok_or_else(|| DomError::Host(format!("unknown node {:?}", node)))
    }

    fn check_writable(&self, node: NodeId) -> Result<(), DomError> {
        if self.entry(node)?.read_only {
            Err(DomError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn attrs_mut(&mut self, node: NodeId) -> Result<&mut Vec<(String, String)>, DomError> {
        self.check_writable(node)?;
        match &mut self.entry_mut(node)?.data {
            NodeData::Element { attrs, .. } => Ok(attrs),
            _ => Err(DomError::NotAnElement),
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == candidate {
                return true;
            }
            current = self.nodes.get(n.0).and_then(|e| e.parent);
        }
        false
    }

    /// Raw link without recording; `index` of None appends.
    fn link(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        match index {
            Some(i) if i <= children.len() => children.insert(i, child),
            _ => children.push(child),
        }
    }

    /// Raw unlink without recording.
    fn unlink(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    fn index_in_parent(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.nodes.get(node.0)?.parent?;
        let index = self.nodes[parent.0].children.iter().position(|c| *c == node)?;
        Some((parent, index))
    }

    fn insert(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) -> Result<(), DomError> {
        self.entry(child)?;
        if !matches!(self.entry(parent)?.data, NodeData::Element { .. }) {
            return Err(DomError::NotAnElement);
        }
        self.check_writable(parent)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(DomError::Hierarchy);
        }
        // Moving within the same parent shifts the target index.
        let index = match (index, self.index_in_parent(child)) {
            (Some(i), Some((old_parent, old_index))) if old_parent == parent && old_index < i => Some(i - 1),
            (i, _) => i,
        };
        if let Some((old_parent, _)) = self.index_in_parent(child) {
            self.unlink(child);
            self.record(
                old_parent,
                Mutation::ChildList {
                    target: old_parent,
                    added: Vec::new(),
                    removed: vec![child],
                },
            );
        }
        self.link(parent, child, index);
        self.record(
            parent,
            Mutation::ChildList {
                target: parent,
                added: vec![child],
                removed: Vec::new(),
            },
        );
        Ok(())
    }

    fn record(&mut self, target: NodeId, mutation: Mutation<NodeId>) {
        if self.observing && self.is_connected(target) {
            self.records.push(mutation);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(entry) = self.nodes.get(node.0) else {
            return;
        };
        match &entry.data {
            NodeData::Text(data) => out.push_str(data),
            NodeData::Element { .. } => {
                for child in &entry.children {
                    self.collect_text(*child, out);
                }
            }
            NodeData::Comment(_) => {}
        }
    }

    fn serialize(&self, node: NodeId, out: &mut String) {
        let Some(entry) = self.nodes.get(node.0) else {
            return;
        };
        match &entry.data {
            NodeData::Text(data) => out.push_str(&escape(data, false)),
            NodeData::Comment(data) => {
                out.push_str("<!--");
                out.push_str(data);
                out.push_str("-->");
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value, true));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &entry.children {
                    self.serialize(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn root(&self) -> Option<NodeId> {
        Some(self.root)
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.nodes.get(node.0).map(|e| &e.data) {
            Some(NodeData::Element { .. }) => NodeKind::Element,
            Some(NodeData::Text(_)) => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Text(data) => Some(data.clone()),
            _ => None,
        }
    }

    fn create_text(&mut self, data: &str) -> Result<NodeId, DomError> {
        Ok(self.text_node(data))
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        Ok(self.alloc_element(tag))
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let attrs = self.attrs_mut(*node)?;
        match attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_string(),
            None => attrs.push((name.to_ascii_lowercase(), value.to_string())),
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), DomError> {
        self.attrs_mut(*node)?.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        Ok(())
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) -> Result<(), DomError> {
        let node = *node;
        match self.kind(&node) {
            NodeKind::Text => self.set_text(node, text),
            NodeKind::Element => {
                self.check_writable(node)?;
                let removed = std::mem::take(&mut self.entry_mut(node)?.children);
                for child in &removed {
                    self.nodes[child.0].parent = None;
                }
                let mut added = Vec::new();
                if !text.is_empty() {
                    let child = self.text_node(text);
                    self.link(node, child, None);
                    added.push(child);
                }
                self.record(
                    node,
                    Mutation::ChildList {
                        target: node,
                        added,
                        removed,
                    },
                );
                Ok(())
            }
            NodeKind::Other => Err(DomError::NotAnElement),
        }
    }

    fn insert_after(&mut self, reference: &NodeId, node: &NodeId) -> Result<(), DomError> {
        let (parent, index) = self.index_in_parent(*reference).ok_or(DomError::Detached)?;
        self.insert(parent, *node, Some(index + 1))
    }

    fn replace_with(&mut self, old: &NodeId, replacements: &[NodeId]) -> Result<(), DomError> {
        let old = *old;
        let (parent, index) = self.index_in_parent(old).ok_or(DomError::Detached)?;
        self.check_writable(parent)?;
        self.check_writable(old)?;
        for node in replacements {
            self.entry(*node)?;
            if self.is_ancestor_or_self(*node, parent) {
                return Err(DomError::Hierarchy);
            }
        }
        for node in replacements {
            self.unlink(*node);
        }
        // Position may have shifted if a replacement was a prior sibling.
        let index = self
            .index_in_parent(old)
            .map(|(_, i)| i)
            .unwrap_or(index);
        self.unlink(old);
        for (offset, node) in replacements.iter().enumerate() {
            self.link(parent, *node, Some(index + offset));
        }
        self.record(
            parent,
            Mutation::ChildList {
                target: parent,
                added: replacements.to_vec(),
                removed: vec![old],
            },
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
