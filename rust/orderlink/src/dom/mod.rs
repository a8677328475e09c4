//! DOM abstraction consumed by the scanner and the page tools.
//!
//! The scanner only needs a handful of tree operations: read text, walk
//! children, create text and element nodes, splice nodes into a parent and
//! observe mutations. `Document` captures exactly that, with two backends:
//! - `memory.rs` - MemoryDocument: arena tree for native tests, built only
//!   under `cfg(test)` or the `headless` feature
//! - `web.rs` - WebDocument: web-sys over the live browser document

#[cfg(any(test, feature = "headless"))]
pub mod memory;
pub mod web;

#[cfg(any(test, feature = "headless"))]
pub use memory::*;
pub use web::*;

use std::fmt;

// =============================================================================
// Types
// =============================================================================

/// Coarse node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    /// Comments, doctypes, fragments
    Other,
}

/// A batched mutation record, as delivered by a mutation observer.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<N> {
    /// Children of `target` were inserted and/or removed.
    ChildList {
        target: N,
        added: Vec<N>,
        removed: Vec<N>,
    },
    /// The data of text node `target` changed.
    CharacterData { target: N },
}

/// Tree operation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// Node has no parent to splice into
    Detached,
    NotAText,
    NotAnElement,
    /// Insertion would make a node its own ancestor
    Hierarchy,
    /// Node is frozen and refuses mutation
    ReadOnly,
    /// Exception raised by the host document
    Host(String),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => write!(f, "node is detached from the document"),
            Self::NotAText => write!(f, "node is not a text node"),
            Self::NotAnElement => write!(f, "node is not an element"),
            Self::Hierarchy => write!(f, "node cannot be inserted below itself"),
            Self::ReadOnly => write!(f, "node is read-only"),
            Self::Host(msg) => write!(f, "host document error: {}", msg),
        }
    }
}

impl std::error::Error for DomError {}

// =============================================================================
// Selectors
// =============================================================================

/// One attribute condition of a compound selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrTest {
    /// `[name]`
    Present(&'static str),
    /// `[name="value"]`
    Equals(&'static str, &'static str),
    /// `[name*="value"]`
    Contains(&'static str, &'static str),
    /// `.class`
    Class(&'static str),
}

impl AttrTest {
    fn matches<D: Document + ?Sized>(&self, doc: &D, node: &D::Node) -> bool {
        match *self {
            AttrTest::Present(name) => doc.attribute(node, name).is_some(),
            AttrTest::Equals(name, value) => doc.attribute(node, name).as_deref() == Some(value),
            AttrTest::Contains(name, needle) => doc
                .attribute(node, name)
                .map_or(false, |v| v.contains(needle)),
            AttrTest::Class(class) => doc
                .attribute(node, "class")
                .map_or(false, |v| v.split_whitespace().any(|c| c == class)),
        }
    }
}

/// Tag plus attribute conditions, e.g. `div[role="listitem"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<&'static str>,
    pub tests: &'static [AttrTest],
}

impl Compound {
    pub fn matches<D: Document + ?Sized>(&self, doc: &D, node: &D::Node) -> bool {
        let Some(tag) = doc.tag_name(node) else {
            return false;
        };
        if let Some(want) = self.tag {
            if tag != want {
                return false;
            }
        }
        self.tests.iter().all(|t| t.matches(doc, node))
    }
}

/// A CSS selector with an optional descendant combinator.
///
/// `css` is handed to the browser verbatim; `ancestor`/`subject` describe the
/// same selector structurally for backends without a selector engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    pub css: &'static str,
    pub ancestor: Option<Compound>,
    pub subject: Compound,
}

impl Selector {
    pub const fn simple(css: &'static str, tag: Option<&'static str>, tests: &'static [AttrTest]) -> Self {
        Self {
            css,
            ancestor: None,
            subject: Compound { tag, tests },
        }
    }

    pub fn matches<D: Document + ?Sized>(&self, doc: &D, node: &D::Node) -> bool {
        if !self.subject.matches(doc, node) {
            return false;
        }
        match &self.ancestor {
            None => true,
            Some(ancestor) => {
                let mut current = doc.parent(node);
                while let Some(n) = current {
                    if ancestor.matches(doc, &n) {
                        return true;
                    }
                    current = doc.parent(&n);
                }
                false
            }
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// The tree operations the linker and page tools rely on.
pub trait Document {
    /// Node handle. Equality is identity.
    type Node: Clone + PartialEq + fmt::Debug;

    /// The document element (`<html>`).
    fn root(&self) -> Option<Self::Node>;
    fn body(&self) -> Option<Self::Node>;
    fn kind(&self, node: &Self::Node) -> NodeKind;
    /// Lower-case tag name; `None` for non-elements.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    /// Data of a text node; `None` for anything else.
    fn text(&self, node: &Self::Node) -> Option<String>;

    fn create_text(&mut self, data: &str) -> Result<Self::Node, DomError>;
    fn create_element(&mut self, tag: &str) -> Result<Self::Node, DomError>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), DomError>;
    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), DomError>;
    /// Replace all children of an element (or the data of a text node).
    fn set_text_content(&mut self, node: &Self::Node, text: &str) -> Result<(), DomError>;
    /// Insert `node` as the next sibling of `reference`.
    fn insert_after(&mut self, reference: &Self::Node, node: &Self::Node) -> Result<(), DomError>;
    /// Swap `old` for `replacements`, in order, at the same position.
    fn replace_with(&mut self, old: &Self::Node, replacements: &[Self::Node]) -> Result<(), DomError>;

    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node> {
        let parent = self.parent(node)?;
        match self.kind(&parent) {
            NodeKind::Element => Some(parent),
            _ => None,
        }
    }

    /// Pre-order descendants of `node`, excluding `node` itself.
    fn descendants(&self, node: &Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack: Vec<Self::Node> = self.children(node).into_iter().rev().collect();
        while let Some(n) = stack.pop() {
            stack.extend(self.children(&n).into_iter().rev());
            out.push(n);
        }
        out
    }

    /// All elements in the document matching `selector`, in document order.
    fn select_all(&self, selector: &Selector) -> Vec<Self::Node> {
        match self.root() {
            Some(root) => {
                let mut found = Vec::new();
                if selector.matches(self, &root) {
                    found.push(root.clone());
                }
                found.extend(self.select_within(&root, selector));
                found
            }
            None => Vec::new(),
        }
    }

    /// Descendants of `scope` matching `selector`, in document order.
    fn select_within(&self, scope: &Self::Node, selector: &Selector) -> Vec<Self::Node> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| selector.matches(self, n))
            .collect()
    }
}
