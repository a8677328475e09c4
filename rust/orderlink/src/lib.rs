//! OrderLink: order-number linkifier for Brightree and Connect
//!
//! A Rust/WASM content script that finds pickup, sales order and connect
//! order numbers in page text and turns them into links.
//!
//! # Architecture
//!
//! ## Scanner
//! - `patterns.rs` - Pattern table: matcher, URL and label per order kind
//! - `extract.rs` - Match extraction and overlap resolution
//! - `rewrite.rs` - NodeRewriter: splits a text node into text and links
//! - `eligibility.rs` - Which elements and text leaves may be scanned
//! - `driver.rs` - Scanner: subtree, single node and full page scans
//! - `monitor.rs` - ChangeMonitor: observer batches plus the fallback timer
//!
//! ## DOM
//! - `dom/mod.rs` - Document trait, mutation records, selectors
//! - `dom/memory.rs` - MemoryDocument: arena tree (`headless` feature, tests)
//! - `dom/web.rs` - WebDocument / WebHost over web-sys
//!
//! ## Page tools
//! - `page/popup.rs` - Popup interceptor
//! - `page/chrome.rs` - Brightree layout patches and Today buttons
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { startOrderLinker, extractOrderLinks } from 'orderlink';
//!
//! await init();
//!
//! startOrderLinker({ rescan_interval_ms: 3000, verbose: false });
//!
//! extractOrderLinks("Re: PU 123456");
//! // [{ kind: 'Pickup', id: '123456', label: 'PU 123456', url: '...', ... }]
//! ```

pub mod config;
pub mod dom;
pub mod log;
pub mod page;
pub mod scanner;
pub mod wasm;

pub use config::*;
pub use scanner::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("orderlink v{}", env!("CARGO_PKG_VERSION"))
}
