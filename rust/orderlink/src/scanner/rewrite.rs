//! Node rewriter
//!
//! Splits one text node into literal text and link fragments and swaps them
//! in for the original in a single `replace_with`.

use crate::config::LinkStyle;
use crate::dom::{DomError, Document};

use super::extract::{extract_detailed, has_matches_with, segments, Extraction, MatchOccurrence, TextSegment};
use super::patterns::PatternRule;

/// `rel` on generated links
pub const LINK_REL: &str = "noopener noreferrer";
/// `target` on generated links
pub const LINK_TARGET: &str = "_blank";

pub struct NodeRewriter {
    rules: Vec<PatternRule>,
    style: String,
    verbose: bool,
}

impl NodeRewriter {
    pub fn new(rules: Vec<PatternRule>, style: &LinkStyle, verbose: bool) -> Self {
        Self {
            rules,
            style: style.to_inline(),
            verbose,
        }
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Rewrite `node` in place. Returns the number of links created; a node
    /// without matches is left untouched and yields 0.
    pub fn rewrite<D: Document>(&self, doc: &mut D, node: &D::Node) -> Result<usize, DomError> {
        let text = doc.text(node).ok_or(DomError::NotAText)?;
        if !has_matches_with(&self.rules, &text) {
            return Ok(0);
        }
        let Extraction { occurrences, skipped } = extract_detailed(&self.rules, &text);
        if doc.parent(node).is_none() {
            return Err(DomError::Detached);
        }

        if self.verbose {
            crate::console_log!("Processing text with matches: {}", text);
            for span in &skipped {
                crate::console_log!("Skipping overlapping match {:?} at {:?}", &text[span.clone()], span);
            }
        }

        let mut fragments = Vec::new();
        for segment in segments(&text, &occurrences) {
            match segment {
                TextSegment::Literal(literal) => fragments.push(doc.create_text(literal)?),
                TextSegment::Link(occurrence) => fragments.push(self.build_link(doc, occurrence)?),
            }
        }

        doc.replace_with(node, &fragments)?;
        Ok(occurrences.len())
    }

    fn build_link<D: Document>(&self, doc: &mut D, occurrence: &MatchOccurrence) -> Result<D::Node, DomError> {
        let link = doc.create_element("a")?;
        doc.set_attribute(&link, "href", &occurrence.url)?;
        doc.set_attribute(&link, "target", LINK_TARGET)?;
        doc.set_attribute(&link, "rel", LINK_REL)?;
        doc.set_attribute(&link, "style", &self.style)?;
        doc.set_text_content(&link, &occurrence.label)?;
        if self.verbose {
            crate::console_log!(
                "Creating clickable {} link: {} to: {}",
                occurrence.kind.as_str(),
                occurrence.label,
                occurrence.url
            );
        }
        Ok(link)
    }
}
