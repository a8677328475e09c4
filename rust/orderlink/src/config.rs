//! Configuration types and defaults for the linker.
//!
//! The pattern table is compiled in; only presentation and scheduling knobs
//! are configurable.

use serde::{Deserialize, Serialize};

/// Period of the fallback full-page rescan.
///
/// Mutation observation misses text swapped in by virtualised or
/// re-rendered widgets (no characterData record reaches the observed node),
/// so a full scan also runs on this cadence.
pub const RESCAN_INTERVAL_MS: u32 = 3000;

/// Inline styling applied to generated links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkStyle {
    pub color: String,
    pub text_decoration: String,
    pub cursor: String,
}

impl Default for LinkStyle {
    fn default() -> Self {
        Self {
            color: "blue".to_string(),
            text_decoration: "underline".to_string(),
            cursor: "pointer".to_string(),
        }
    }
}

impl LinkStyle {
    /// Render as an inline `style` attribute value.
    pub fn to_inline(&self) -> String {
        format!(
            "color: {}; text-decoration: {}; cursor: {};",
            self.color, self.text_decoration, self.cursor
        )
    }
}

/// Linker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Fallback rescan period in milliseconds. Default: 3000
    pub rescan_interval_ms: u32,
    /// Re-target subject lines, mail rows and chat bubbles on full scans. Default: true
    pub scan_hint_containers: bool,
    /// Log every created link. Default: true
    pub verbose: bool,
    pub link_style: LinkStyle,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            rescan_interval_ms: RESCAN_INTERVAL_MS,
            scan_hint_containers: true,
            verbose: true,
            link_style: LinkStyle::default(),
        }
    }
}

impl LinkerConfig {
    /// Parse a JSON configuration object; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn rescan_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(u64::from(self.rescan_interval_ms))
    }
}
