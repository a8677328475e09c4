use super::*;
use crate::config::LinkerConfig;
use crate::dom::{Document, MemoryDocument, Mutation, NodeId};

#[derive(Default)]
struct NullHost;

impl MonitorHost for NullHost {
    fn observe(&mut self) -> Result<(), MonitorError> {
        Ok(())
    }
    fn disconnect(&mut self) {}
    fn start_timer(&mut self, _period: std::time::Duration) -> Result<(), MonitorError> {
        Ok(())
    }
    fn clear_timer(&mut self) {}
}

fn quiet_config() -> LinkerConfig {
    LinkerConfig {
        verbose: false,
        ..LinkerConfig::default()
    }
}

fn el(doc: &mut MemoryDocument, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
    let node = doc.element(tag, attrs);
    doc.append(parent, node).unwrap();
    node
}

fn txt(doc: &mut MemoryDocument, parent: NodeId, text: &str) -> NodeId {
    let node = doc.text_node(text);
    doc.append(parent, node).unwrap();
    node
}

/// A mail client: subject rows in a grid, a reading pane, a reply box and
/// an already-linked order.
fn mail_page() -> MemoryDocument {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();

    let script = el(&mut doc, body, "script", &[]);
    txt(&mut doc, script, "window.cfg = { so: 'SO 1111111' };");

    let grid = el(&mut doc, body, "div", &[("role", "grid")]);
    for subject in ["Re: PU 123456 delayed", "SO#7654321 approved", "lunch?"] {
        let row = el(&mut doc, grid, "div", &[("role", "row")]);
        let cell = el(&mut doc, row, "span", &[("role", "gridcell"), ("class", "subject")]);
        txt(&mut doc, cell, subject);
    }

    let pane = el(&mut doc, body, "article", &[]);
    let p = el(&mut doc, pane, "p", &[]);
    txt(&mut doc, p, "Hi team, pickup:789012 please. Also ");
    let b = el(&mut doc, p, "b", &[]);
    txt(&mut doc, b, "sales order 9876543");
    txt(&mut doc, p, " and connect 654321.");
    let quoted = el(&mut doc, pane, "a", &[("href", "https://brightree.net/")]);
    txt(&mut doc, quoted, "PU 999999");

    let reply = el(&mut doc, body, "textarea", &[]);
    txt(&mut doc, reply, "draft: CO 222222");
    doc
}

fn hrefs(doc: &MemoryDocument, root: NodeId) -> Vec<String> {
    doc.links(root)
        .into_iter()
        .filter_map(|a| doc.attribute(&a, "href"))
        .collect()
}

#[test]
fn test_full_page_scan() {
    let mut doc = mail_page();
    let body = doc.body().unwrap();
    let report = Scanner::new(quiet_config()).scan_page(&mut doc);

    assert_eq!(report.links_created, 5);
    assert_eq!(report.failures, 0);
    assert_eq!(
        hrefs(&doc, body),
        vec![
            "https://brightree.net/OrderEntry/frmPuExPopup.aspx?PuExKey=123456&Edit=1",
            "https://brightree.net/OrderEntry/frmSOOrder.aspx?SalesOrderKey=7654321&Edit=1&ShowAck=1",
            "https://brightree.net/OrderEntry/frmPuExPopup.aspx?PuExKey=789012&Edit=1",
            "https://brightree.net/OrderEntry/frmSOOrder.aspx?SalesOrderKey=9876543&Edit=1&ShowAck=1",
            "https://bhcconnect.com/app/orders/654321",
            "https://brightree.net/",
        ]
    );
    assert_eq!(
        doc.text_content(body),
        "window.cfg = { so: 'SO 1111111' };\
         Re: PU 123456 delayedSO 7654321 approvedlunch?\
         Hi team, PICKUP 789012 please. Also Sales Order 9876543 and connect 654321.\
         PU 999999draft: CO 222222"
    );
}

#[test]
fn test_full_scan_twice_is_stable() {
    let mut doc = mail_page();
    let body = doc.body().unwrap();
    let scanner = Scanner::new(quiet_config());
    scanner.scan_page(&mut doc);
    let snapshot = doc.outer_html(body);

    doc.observe();
    let again = scanner.scan_page(&mut doc);
    assert_eq!(again.links_created, 0);
    assert_eq!(again.failures, 0);
    assert!(doc.take_records().is_empty());
    assert_eq!(doc.outer_html(body), snapshot);
}

#[test]
fn test_existing_link_never_rescanned() {
    let mut doc = mail_page();
    let body = doc.body().unwrap();
    let scanner = Scanner::new(quiet_config());
    for _ in 0..3 {
        scanner.scan_page(&mut doc);
    }
    let quoted = doc
        .links(body)
        .into_iter()
        .find(|a| doc.attribute(a, "href").as_deref() == Some("https://brightree.net/"))
        .unwrap();
    assert!(doc.links(quoted).is_empty());
    assert_eq!(doc.inner_html(quoted), "PU 999999");
}

#[test]
fn test_mutation_matches_full_scan() {
    // Same content, linked once through the observer and once by a full scan.
    let build = |doc: &mut MemoryDocument| {
        let body = doc.body().unwrap();
        let div = doc.element("div", &[("class", "toast")]);
        let t = doc.text_node("Created SO 1234567");
        doc.append(div, t).unwrap();
        doc.append(body, div).unwrap();
        div
    };

    let mut observed = MemoryDocument::new();
    let mut monitor = ChangeMonitor::new(Scanner::new(quiet_config()), NullHost);
    monitor.attach(&mut observed).unwrap();
    observed.observe();
    let div = build(&mut observed);
    let records = observed.take_records();
    assert_eq!(records.len(), 1);
    monitor.on_mutations(&mut observed, &records);

    let mut scanned = MemoryDocument::new();
    let div2 = build(&mut scanned);
    Scanner::new(quiet_config()).scan_page(&mut scanned);

    assert_eq!(observed.outer_html(div), scanned.outer_html(div2));
    assert_eq!(observed.links(div).len(), 1);
}

#[test]
fn test_removed_node_in_batch_fails_alone() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let mut monitor = ChangeMonitor::new(Scanner::new(quiet_config()), NullHost);
    monitor.attach(&mut doc).unwrap();
    doc.observe();

    let t = doc.text_node("PU 123456");
    doc.append(body, t).unwrap();
    doc.remove(t).unwrap();
    let records = doc.take_records();
    assert_eq!(records.len(), 2);

    let report = monitor.on_mutations(&mut doc, &records);
    // The text node is gone; the rewrite fails for that leaf only.
    assert_eq!(report.links_created, 0);
    assert_eq!(report.failures, 1);
    assert!(matches!(records[1], Mutation::ChildList { ref removed, .. } if removed == &vec![t]));
}

#[test]
fn test_incremental_edits_over_time() {
    let mut doc = MemoryDocument::new();
    let body = doc.body().unwrap();
    let chat = el(&mut doc, body, "div", &[("role", "listitem")]);
    let bubble = el(&mut doc, chat, "div", &[("dir", "auto")]);
    let t = txt(&mut doc, bubble, "typing");

    let mut monitor = ChangeMonitor::new(Scanner::new(quiet_config()), NullHost);
    monitor.attach(&mut doc).unwrap();
    doc.observe();

    doc.set_text(t, "see CO 123456").unwrap();
    let records = doc.take_records();
    monitor.on_mutations(&mut doc, &records);
    assert_eq!(doc.links(bubble).len(), 1);

    // A second message lands next to the first.
    let t2 = txt(&mut doc, bubble, " and PU 654321");
    let records = doc.take_records();
    monitor.on_mutations(&mut doc, &records);
    assert_eq!(doc.links(bubble).len(), 2);
    assert_eq!(doc.parent(&t2), None);
    assert_eq!(doc.text_content(bubble), "see CO 123456 and PU 654321");
}
