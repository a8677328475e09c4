//! ChangeMonitor: keeps a live page linked as it mutates
//!
//! # Lifecycle
//! Detached → Attached → TornDown
//!
//! `attach` runs the initial full scan, then starts the observer and the
//! fallback timer. Mutation batches trigger targeted scans; timer ticks
//! trigger full scans. `teardown` stops both. Observer and timer handles are
//! the only long-lived state and live in the `MonitorHost`.

use std::cell::Cell;
use std::fmt;
use std::time::Duration;

use crate::dom::{Document, Mutation, NodeKind};

use super::driver::{ScanReport, Scanner};

// =============================================================================
// Host
// =============================================================================

/// Observer and timer setup failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    Observer(String),
    Timer(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observer(e) => write!(f, "Failed to observe document: {}", e),
            Self::Timer(e) => write!(f, "Failed to start rescan timer: {}", e),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Owner of the observer and timer handles.
pub trait MonitorHost {
    /// Start delivering child-list and character-data batches.
    fn observe(&mut self) -> Result<(), MonitorError>;
    fn disconnect(&mut self);
    /// Start the periodic fallback tick.
    fn start_timer(&mut self, period: Duration) -> Result<(), MonitorError>;
    fn clear_timer(&mut self);
}

// =============================================================================
// State Machine
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Detached,
    Attached,
    TornDown,
}

// =============================================================================
// ChangeMonitor
// =============================================================================

pub struct ChangeMonitor<H: MonitorHost> {
    scanner: Scanner,
    host: H,
    state: State,
}

impl<H: MonitorHost> ChangeMonitor<H> {
    pub fn new(scanner: Scanner, host: H) -> Self {
        Self {
            scanner,
            host,
            state: State::Detached,
        }
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn is_attached(&self) -> bool {
        self.state == State::Attached
    }

    /// Current state name (for debugging)
    pub fn state_name(&self) -> &'static str {
        match self.state {
            State::Detached => "detached",
            State::Attached => "attached",
            State::TornDown => "torn_down",
        }
    }

    /// Full scan, then observer and timer. Setup failures propagate and
    /// leave nothing running. Only the first call has any effect.
    pub fn attach<D: Document>(&mut self, doc: &mut D) -> Result<ScanReport, MonitorError> {
        if self.state != State::Detached {
            return Ok(ScanReport::default());
        }

        let report = self.scanner.scan_page(doc);
        self.host.observe()?;
        if let Err(e) = self.host.start_timer(self.scanner.config().rescan_interval()) {
            self.host.disconnect();
            return Err(e);
        }
        self.state = State::Attached;
        crate::console_log!(
            "Order linker attached: {} links in {}us",
            report.links_created,
            report.elapsed_us
        );
        Ok(report)
    }

    /// Targeted rescans for one observer batch.
    pub fn on_mutations<D: Document>(&mut self, doc: &mut D, records: &[Mutation<D::Node>]) -> ScanReport {
        let mut report = ScanReport::default();
        if self.state != State::Attached {
            return report;
        }
        for record in records {
            match record {
                Mutation::ChildList { added, .. } => {
                    for node in added {
                        match doc.kind(node) {
                            NodeKind::Element => report.absorb(self.scanner.scan_subtree(doc, node)),
                            NodeKind::Text => report.absorb(self.scanner.scan_text_node(doc, node)),
                            NodeKind::Other => {}
                        }
                    }
                }
                Mutation::CharacterData { target } => {
                    if doc.kind(target) == NodeKind::Text {
                        report.absorb(self.scanner.scan_text_node(doc, target));
                    }
                }
            }
        }
        report
    }

    /// Fallback full scan.
    pub fn on_tick<D: Document>(&mut self, doc: &mut D) -> ScanReport {
        if self.state != State::Attached {
            return ScanReport::default();
        }
        self.scanner.scan_page(doc)
    }

    /// Stop observing and clear the timer. Idempotent.
    pub fn teardown(&mut self) {
        if self.state == State::Attached {
            self.host.disconnect();
            self.host.clear_timer();
        }
        self.state = State::TornDown;
    }
}

impl<H: MonitorHost> Drop for ChangeMonitor<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Start gate
// =============================================================================

/// One-shot start latch for a browser session.
///
/// Claimed before any ready listener is registered, so a second start while
/// the page is still loading is refused instead of attaching twice.
#[derive(Debug, Default)]
pub struct StartGate {
    claimed: Cell<bool>,
}

impl StartGate {
    pub const fn new() -> Self {
        Self {
            claimed: Cell::new(false),
        }
    }

    /// True for the caller that gets to start the session.
    pub fn claim(&self) -> bool {
        !self.claimed.replace(true)
    }

    /// Reopen after a failed start or a teardown.
    pub fn release(&self) {
        self.claimed.set(false);
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.get()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkerConfig;
    use crate::dom::{MemoryDocument, NodeId};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingHost {
        observing: bool,
        timer: Option<Duration>,
        fail_observe: bool,
        fail_timer: bool,
        disconnects: usize,
        clears: usize,
    }

    impl MonitorHost for RecordingHost {
        fn observe(&mut self) -> Result<(), MonitorError> {
            if self.fail_observe {
                return Err(MonitorError::Observer("no body".to_string()));
            }
            self.observing = true;
            Ok(())
        }

        fn disconnect(&mut self) {
            self.observing = false;
            self.disconnects += 1;
        }

        fn start_timer(&mut self, period: Duration) -> Result<(), MonitorError> {
            if self.fail_timer {
                return Err(MonitorError::Timer("denied".to_string()));
            }
            self.timer = Some(period);
            Ok(())
        }

        fn clear_timer(&mut self) {
            self.timer = None;
            self.clears += 1;
        }
    }

    fn monitor(host: RecordingHost) -> ChangeMonitor<RecordingHost> {
        let config = LinkerConfig {
            verbose: false,
            ..LinkerConfig::default()
        };
        ChangeMonitor::new(Scanner::new(config), host)
    }

    fn paragraph(doc: &mut MemoryDocument, text: &str) -> NodeId {
        let p = doc.element("p", &[]);
        let t = doc.text_node(text);
        doc.append(p, t).unwrap();
        p
    }

    #[test]
    fn test_attach_scans_and_installs() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "PU 123456");
        doc.append(body, p).unwrap();

        let mut m = monitor(RecordingHost::default());
        assert_eq!(m.state_name(), "detached");
        let report = m.attach(&mut doc).unwrap();
        assert_eq!(report.links_created, 1);
        assert!(m.is_attached());
        assert!(m.host().observing);
        assert_eq!(m.host().timer, Some(Duration::from_millis(3000)));
    }

    #[test]
    fn test_attach_twice_is_noop() {
        let mut doc = MemoryDocument::new();
        let mut m = monitor(RecordingHost::default());
        m.attach(&mut doc).unwrap();
        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "SO 1234567");
        doc.append(body, p).unwrap();
        assert_eq!(m.attach(&mut doc).unwrap(), ScanReport::default());
        assert!(doc.links(p).is_empty());
    }

    #[test]
    fn test_observer_failure_propagates() {
        let mut doc = MemoryDocument::new();
        let mut m = monitor(RecordingHost {
            fail_observe: true,
            ..RecordingHost::default()
        });
        assert!(matches!(m.attach(&mut doc), Err(MonitorError::Observer(_))));
        assert!(!m.is_attached());
        assert_eq!(m.host().timer, None);
    }

    #[test]
    fn test_timer_failure_leaves_nothing_running() {
        let mut doc = MemoryDocument::new();
        let mut m = monitor(RecordingHost {
            fail_timer: true,
            ..RecordingHost::default()
        });
        let err = m.attach(&mut doc).unwrap_err();
        assert_eq!(err.to_string(), "Failed to start rescan timer: denied");
        assert!(!m.host().observing);
        assert!(!m.is_attached());
    }

    #[test]
    fn test_inserted_element_scanned() {
        let mut doc = MemoryDocument::new();
        let mut m = monitor(RecordingHost::default());
        m.attach(&mut doc).unwrap();
        doc.observe();

        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "new order SO 1234567");
        doc.append(body, p).unwrap();
        let records = doc.take_records();
        let report = m.on_mutations(&mut doc, &records);
        assert_eq!(report.links_created, 1);
        assert_eq!(doc.links(p).len(), 1);
    }

    #[test]
    fn test_inserted_text_node_scanned() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let div = doc.element("div", &[]);
        doc.append(body, div).unwrap();
        let mut m = monitor(RecordingHost::default());
        m.attach(&mut doc).unwrap();
        doc.observe();

        let t = doc.text_node("SO 1234567");
        doc.append(div, t).unwrap();
        let records = doc.take_records();
        assert_eq!(m.on_mutations(&mut doc, &records).links_created, 1);
        assert_eq!(doc.links(div).len(), 1);
    }

    #[test]
    fn test_character_data_change_scanned() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "loading...");
        doc.append(body, p).unwrap();
        let t = doc.children(&p)[0];
        let mut m = monitor(RecordingHost::default());
        m.attach(&mut doc).unwrap();
        doc.observe();

        doc.set_text(t, "Ready: CO 123456").unwrap();
        let records = doc.take_records();
        assert_eq!(m.on_mutations(&mut doc, &records).links_created, 1);
    }

    #[test]
    fn test_own_rewrites_settle() {
        let mut doc = MemoryDocument::new();
        let mut m = monitor(RecordingHost::default());
        m.attach(&mut doc).unwrap();
        doc.observe();

        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "PU 111111, SO 2222222 and connect 333333");
        doc.append(body, p).unwrap();

        let mut batches = 0;
        loop {
            let records = doc.take_records();
            if records.is_empty() {
                break;
            }
            batches += 1;
            assert!(batches < 5, "mutation loop did not settle");
            m.on_mutations(&mut doc, &records);
        }
        assert_eq!(batches, 2);
        assert_eq!(doc.links(p).len(), 3);
    }

    #[test]
    fn test_text_edited_inside_link_not_relinked() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "SO 1234567");
        doc.append(body, p).unwrap();
        let mut m = monitor(RecordingHost::default());
        m.attach(&mut doc).unwrap();
        doc.observe();

        let link = doc.links(p)[0];
        let inner = doc.children(&link)[0];
        doc.set_text(inner, "SO 7654321").unwrap();
        let records = doc.take_records();
        assert_eq!(m.on_mutations(&mut doc, &records).leaves_visited, 0);
        assert!(doc.links(link).is_empty());
    }

    #[test]
    fn test_tick_rescans_page() {
        let mut doc = MemoryDocument::new();
        let mut m = monitor(RecordingHost::default());
        m.attach(&mut doc).unwrap();

        // Swapped in without an observed record.
        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "pu/ex 444444");
        doc.append(body, p).unwrap();
        assert_eq!(m.on_tick(&mut doc).links_created, 1);
        assert_eq!(m.on_tick(&mut doc).links_created, 0);
    }

    #[test]
    fn test_teardown_stops_everything() {
        let mut doc = MemoryDocument::new();
        let mut m = monitor(RecordingHost::default());
        m.attach(&mut doc).unwrap();
        m.teardown();
        assert_eq!(m.state_name(), "torn_down");
        assert!(!m.host().observing);
        assert_eq!(m.host().timer, None);

        m.teardown();
        assert_eq!(m.host().disconnects, 1);
        assert_eq!(m.host().clears, 1);

        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "PU 123456");
        doc.append(body, p).unwrap();
        assert_eq!(m.on_tick(&mut doc), ScanReport::default());
        assert_eq!(m.attach(&mut doc).unwrap(), ScanReport::default());
        assert!(doc.links(p).is_empty());
    }

    #[test]
    fn test_events_ignored_before_attach() {
        let mut doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let p = paragraph(&mut doc, "PU 123456");
        doc.append(body, p).unwrap();
        let mut m = monitor(RecordingHost::default());
        assert_eq!(m.on_tick(&mut doc), ScanReport::default());
        let records = vec![Mutation::ChildList {
            target: body,
            added: vec![p],
            removed: vec![],
        }];
        assert_eq!(m.on_mutations(&mut doc, &records), ScanReport::default());
    }

    #[test]
    fn test_custom_interval() {
        let mut doc = MemoryDocument::new();
        let config = LinkerConfig {
            rescan_interval_ms: 750,
            ..LinkerConfig::default()
        };
        let mut m = ChangeMonitor::new(Scanner::new(config), RecordingHost::default());
        m.attach(&mut doc).unwrap();
        assert_eq!(m.host().timer, Some(Duration::from_millis(750)));
    }

    /// Host whose state outlives the monitor that owns it.
    struct SharedHost(Rc<RefCell<RecordingHost>>);

    impl MonitorHost for SharedHost {
        fn observe(&mut self) -> Result<(), MonitorError> {
            self.0.borrow_mut().observe()
        }
        fn disconnect(&mut self) {
            self.0.borrow_mut().disconnect()
        }
        fn start_timer(&mut self, period: Duration) -> Result<(), MonitorError> {
            self.0.borrow_mut().start_timer(period)
        }
        fn clear_timer(&mut self) {
            self.0.borrow_mut().clear_timer()
        }
    }

    #[test]
    fn test_dropping_attached_monitor_tears_down() {
        let state = Rc::new(RefCell::new(RecordingHost::default()));
        let mut doc = MemoryDocument::new();
        let mut m = ChangeMonitor::new(Scanner::default(), SharedHost(Rc::clone(&state)));
        m.attach(&mut doc).unwrap();
        assert!(state.borrow().observing);

        // Replacing a running session must not leave its handles live.
        drop(m);
        let host = state.borrow();
        assert!(!host.observing);
        assert_eq!(host.timer, None);
        assert_eq!((host.disconnects, host.clears), (1, 1));
    }

    #[test]
    fn test_drop_after_teardown_releases_once() {
        let state = Rc::new(RefCell::new(RecordingHost::default()));
        let mut doc = MemoryDocument::new();
        let mut m = ChangeMonitor::new(Scanner::default(), SharedHost(Rc::clone(&state)));
        m.attach(&mut doc).unwrap();
        m.teardown();
        drop(m);
        assert_eq!(state.borrow().disconnects, 1);
        assert_eq!(state.borrow().clears, 1);
    }

    #[test]
    fn test_start_gate_refuses_second_start() {
        let gate = StartGate::new();
        assert!(!gate.is_claimed());
        assert!(gate.claim());
        // Second start while the first is still waiting for the page.
        assert!(!gate.claim());
        assert!(gate.is_claimed());

        gate.release();
        assert!(gate.claim());
    }
}
