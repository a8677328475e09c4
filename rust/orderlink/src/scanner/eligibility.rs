//! Eligibility filter
//!
//! Decides which elements and text leaves may be scanned. Text inside an
//! `<a>` is never eligible, which is what keeps rewritten links from being
//! matched again and stops observe/rewrite loops.

use crate::dom::{Document, NodeKind};

/// Non-content elements
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "object", "embed"];
/// Form controls; rewriting them would interfere with user input
const FORM_TAGS: &[&str] = &["input", "textarea", "select"];

/// Whether nothing below an element with this tag may be scanned.
pub fn blocks_scanning(tag: &str) -> bool {
    tag == "a" || NON_CONTENT_TAGS.contains(&tag) || FORM_TAGS.contains(&tag)
}

/// Whether `node` is `<a>` or sits inside one.
pub fn inside_link<D: Document>(doc: &D, node: &D::Node) -> bool {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if doc.tag_name(&n).as_deref() == Some("a") {
            return true;
        }
        current = doc.parent_element(&n);
    }
    false
}

/// Element check: not non-content, not a form control, not in a link.
pub fn is_element_eligible<D: Document>(doc: &D, node: &D::Node) -> bool {
    let Some(tag) = doc.tag_name(node) else {
        return false;
    };
    if NON_CONTENT_TAGS.contains(&tag.as_str()) || FORM_TAGS.contains(&tag.as_str()) {
        return false;
    }
    !inside_link(doc, node)
}

/// Whether every ancestor element of `node` permits scanning.
pub fn ancestors_eligible<D: Document>(doc: &D, node: &D::Node) -> bool {
    let mut current = doc.parent_element(node);
    while let Some(element) = current {
        match doc.tag_name(&element) {
            Some(tag) if blocks_scanning(&tag) => return false,
            _ => {}
        }
        current = doc.parent_element(&element);
    }
    true
}

/// Text leaf check: non-whitespace content and no blocking ancestor.
pub fn is_leaf_eligible<D: Document>(doc: &D, node: &D::Node) -> bool {
    if doc.kind(node) != NodeKind::Text {
        return false;
    }
    match doc.text(node) {
        Some(text) if !text.trim().is_empty() => ancestors_eligible(doc, node),
        _ => false,
    }
}
