//! Scan driver
//!
//! Finds eligible text leaves under a root and rewrites each one. A failure
//! on one leaf is logged and counted; the remaining leaves still run.

use serde::{Deserialize, Serialize};

use crate::config::LinkerConfig;
use crate::dom::{AttrTest, Compound, DomError, Document, NodeKind, Selector};

use super::eligibility::{ancestors_eligible, blocks_scanning, is_element_eligible, is_leaf_eligible};
use super::patterns::{default_rules, PatternRule};
use super::rewrite::NodeRewriter;

// =============================================================================
// Container hints
// =============================================================================

/// Subject lines, mail rows and chat bubbles. Virtualised mail and chat UIs
/// render these late, so full scans revisit them explicitly.
pub const HINT_CONTAINERS: &[Selector] = &[
    Selector::simple("[class*=\"subject\"]", None, &[AttrTest::Contains("class", "subject")]),
    Selector::simple("[id*=\"subject\"]", None, &[AttrTest::Contains("id", "subject")]),
    Selector::simple(
        "[data-testid*=\"subject\"]",
        None,
        &[AttrTest::Contains("data-testid", "subject")],
    ),
    Selector::simple(".email-subject", None, &[AttrTest::Class("email-subject")]),
    Selector::simple(".message-subject", None, &[AttrTest::Class("message-subject")]),
    Selector::simple(".subject-line", None, &[AttrTest::Class("subject-line")]),
    Selector::simple("[role=\"gridcell\"]", None, &[AttrTest::Equals("role", "gridcell")]),
    Selector::simple("[data-message-text]", None, &[AttrTest::Present("data-message-text")]),
    Selector {
        css: "div[role=\"listitem\"] div[dir=\"auto\"]",
        ancestor: Some(Compound {
            tag: Some("div"),
            tests: &[AttrTest::Equals("role", "listitem")],
        }),
        subject: Compound {
            tag: Some("div"),
            tests: &[AttrTest::Equals("dir", "auto")],
        },
    },
    Selector::simple(
        "div[aria-label][dir]",
        Some("div"),
        &[AttrTest::Present("aria-label"), AttrTest::Present("dir")],
    ),
];

// =============================================================================
// Report
// =============================================================================

/// Outcome of one scan call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub leaves_visited: usize,
    pub leaves_rewritten: usize,
    pub links_created: usize,
    pub failures: usize,
    pub elapsed_us: u64,
}

impl ScanReport {
    pub fn absorb(&mut self, other: ScanReport) {
        self.leaves_visited += other.leaves_visited;
        self.leaves_rewritten += other.leaves_rewritten;
        self.links_created += other.links_created;
        self.failures += other.failures;
        self.elapsed_us += other.elapsed_us;
    }

    fn record(&mut self, outcome: Result<usize, DomError>) {
        self.leaves_visited += 1;
        match outcome {
            Ok(0) => {}
            Ok(links) => {
                self.leaves_rewritten += 1;
                self.links_created += links;
            }
            Err(e) => {
                crate::console_error!("Error processing text node: {}", e);
                self.failures += 1;
            }
        }
    }
}

// =============================================================================
// Scanner
// =============================================================================

pub struct Scanner {
    rewriter: NodeRewriter,
    config: LinkerConfig,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(LinkerConfig::default())
    }
}

impl Scanner {
    /// Scanner over the built-in pattern table.
    pub fn new(config: LinkerConfig) -> Self {
        Self::with_rules(default_rules().to_vec(), config)
    }

    pub fn with_rules(rules: Vec<PatternRule>, config: LinkerConfig) -> Self {
        Self {
            rewriter: NodeRewriter::new(rules, &config.link_style, config.verbose),
            config,
        }
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    pub fn rules(&self) -> &[PatternRule] {
        self.rewriter.rules()
    }

    /// Rewrite every eligible text leaf below `root`. No-op when `root` is
    /// not an eligible element.
    pub fn scan_subtree<D: Document>(&self, doc: &mut D, root: &D::Node) -> ScanReport {
        let start = instant::Instant::now();
        let mut report = ScanReport::default();
        if !is_element_eligible(&*doc, root) || !ancestors_eligible(&*doc, root) {
            return report;
        }

        // Collect first: rewriting splices siblings mid-walk.
        let leaves = collect_leaves(&*doc, root);
        for leaf in &leaves {
            report.record(self.rewriter.rewrite(doc, leaf));
        }
        report.elapsed_us = start.elapsed().as_micros() as u64;
        report
    }

    /// Rewrite a single text node if it is eligible.
    pub fn scan_text_node<D: Document>(&self, doc: &mut D, node: &D::Node) -> ScanReport {
        let start = instant::Instant::now();
        let mut report = ScanReport::default();
        if !is_leaf_eligible(&*doc, node) {
            return report;
        }
        report.record(self.rewriter.rewrite(doc, node));
        report.elapsed_us = start.elapsed().as_micros() as u64;
        report
    }

    /// Scan the body, then the hint containers.
    pub fn scan_page<D: Document>(&self, doc: &mut D) -> ScanReport {
        let mut report = ScanReport::default();
        if let Some(body) = doc.body() {
            report.absorb(self.scan_subtree(doc, &body));
        }
        if self.config.scan_hint_containers {
            for selector in HINT_CONTAINERS {
                for container in doc.select_all(selector) {
                    report.absorb(self.scan_subtree(doc, &container));
                }
            }
        }
        report
    }
}

/// Eligible text leaves below `root` in document order, pruning blocked
/// subtrees.
fn collect_leaves<D: Document>(doc: &D, root: &D::Node) -> Vec<D::Node> {
    let mut leaves = Vec::new();
    let mut stack: Vec<D::Node> = doc.children(root).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        match doc.kind(&node) {
            NodeKind::Text => {
                if doc.text(&node).map_or(false, |t| !t.trim().is_empty()) {
                    leaves.push(node);
                }
            }
            NodeKind::Element => {
                let blocked = doc.tag_name(&node).map_or(true, |tag| blocks_scanning(&tag));
                if !blocked {
                    stack.extend(doc.children(&node).into_iter().rev());
                }
            }
            NodeKind::Other => {}
        }
    }
    leaves
}
