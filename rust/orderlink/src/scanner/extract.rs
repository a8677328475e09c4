//! Match extractor
//!
//! Runs every rule over the full text, pools the hits, orders them by start
//! offset and drops any hit that starts inside the previous kept one. Ties on
//! start offset keep collection order (rule declaration order, then
//! left-to-right), so the first-declared rule wins a contested position.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::patterns::{default_rules, OrderKind, PatternRule};

// ==================== TYPE DEFINITIONS ====================

/// One resolved identifier occurrence. Offsets are byte offsets into the
/// scanned text, half-open.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MatchOccurrence {
    pub start: usize,
    pub end: usize,
    pub rule_index: usize,
    pub kind: OrderKind,
    pub prefix: String,
    pub id: String,
    pub url: String,
    pub label: String,
}

/// A piece of a split text node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextSegment<'a> {
    Literal(&'a str),
    Link(&'a MatchOccurrence),
}

impl TextSegment<'_> {
    /// Text a reader sees for this segment.
    pub fn visible(&self) -> &str {
        match self {
            TextSegment::Literal(s) => s,
            TextSegment::Link(m) => &m.label,
        }
    }
}

/// Unresolved hit, before overlap suppression
struct Hit<'t> {
    start: usize,
    end: usize,
    rule_index: usize,
    prefix: &'t str,
    id: &'t str,
}

// ==================== EXTRACTION ====================

/// Extract occurrences using the built-in rules.
pub fn extract(text: &str) -> Vec<MatchOccurrence> {
    extract_with(default_rules(), text)
}

/// Extract occurrences for an arbitrary rule table.
pub fn extract_with(rules: &[PatternRule], text: &str) -> Vec<MatchOccurrence> {
    extract_detailed(rules, text).occurrences
}

/// Kept occurrences plus the spans dropped for starting inside an earlier
/// kept hit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    pub occurrences: Vec<MatchOccurrence>,
    pub skipped: Vec<Range<usize>>,
}

pub fn extract_detailed(rules: &[PatternRule], text: &str) -> Extraction {
    let mut hits = Vec::new();
    for (rule_index, rule) in rules.iter().enumerate() {
        for cap in rule.matcher().captures_iter(text) {
            let (Some(full), Some(prefix), Some(id)) = (cap.get(0), cap.get(1), cap.get(2)) else {
                continue;
            };
            hits.push(Hit {
                start: full.start(),
                end: full.end(),
                rule_index,
                prefix: prefix.as_str(),
                id: id.as_str(),
            });
        }
    }

    // Stable: equal starts keep collection order.
    hits.sort_by_key(|h| h.start);

    let mut extraction = Extraction {
        occurrences: Vec::with_capacity(hits.len()),
        skipped: Vec::new(),
    };
    let mut cursor = 0;
    for hit in hits {
        if hit.start < cursor {
            extraction.skipped.push(hit.start..hit.end);
            continue;
        }
        cursor = hit.end;
        let rule = &rules[hit.rule_index];
        extraction.occurrences.push(MatchOccurrence {
            start: hit.start,
            end: hit.end,
            rule_index: hit.rule_index,
            kind: rule.kind,
            prefix: hit.prefix.to_string(),
            id: hit.id.to_string(),
            url: rule.url(hit.prefix, hit.id),
            label: rule.label(hit.prefix, hit.id),
        });
    }
    extraction
}

/// Cheap pre-check: does any built-in rule match?
pub fn has_matches(text: &str) -> bool {
    has_matches_with(default_rules(), text)
}

pub fn has_matches_with(rules: &[PatternRule], text: &str) -> bool {
    rules.iter().any(|r| r.matcher().is_match(text))
}

// ==================== SPLITTING ====================

/// Split `text` against non-overlapping, ordered occurrences. Empty gaps are
/// omitted.
pub fn segments<'a>(text: &'a str, occurrences: &'a [MatchOccurrence]) -> Vec<TextSegment<'a>> {
    let mut out = Vec::with_capacity(occurrences.len() * 2 + 1);
    let mut last = 0;
    for occurrence in occurrences {
        if occurrence.start > last {
            out.push(TextSegment::Literal(&text[last..occurrence.start]));
        }
        out.push(TextSegment::Link(occurrence));
        last = occurrence.end;
    }
    if last < text.len() {
        out.push(TextSegment::Literal(&text[last..]));
    }
    out
}

/// Concatenated visible text of `segments`.
pub fn render_text(segments: &[TextSegment<'_>]) -> String {
    segments.iter().map(TextSegment::visible).collect()
}

// ==================== TESTS ====================
