use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Console text that marks a call as bridge or tooling noise
pub const DEFAULT_NOISE_MARKERS: [&str; 4] = ["Lasy bridge", "HMR", "[Fast Refresh]", "webpack"];

/// Tunables for an installed bridge
///
/// Every field has a default matching the behaviour the parent frame expects,
/// so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum characters kept from a serialized object argument
    pub arg_cap: usize,

    /// Maximum characters of text content reported for a picked element
    pub text_preview_chars: usize,

    /// Delay before the existing-state scan runs (milliseconds)
    pub state_scan_delay_ms: u64,

    /// Delay before the baseline url-change and link scan (milliseconds)
    pub startup_delay_ms: u64,

    /// Delay between a history operation and the URL comparison (milliseconds)
    pub url_settle_delay_ms: u64,

    /// Link scan debounce after a URL change (milliseconds)
    pub scan_after_navigation_ms: u64,

    /// Link scan debounce after DOM insertions (milliseconds)
    pub scan_after_mutation_ms: u64,

    /// First-argument substrings that suppress publishing of a console call
    pub noise_markers: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            arg_cap: 1000,
            text_preview_chars: 50,
            state_scan_delay_ms: 100,
            startup_delay_ms: 1000,
            url_settle_delay_ms: 10,
            scan_after_navigation_ms: 500,
            scan_after_mutation_ms: 1000,
            noise_markers: DEFAULT_NOISE_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the serialized argument cap
    pub fn arg_cap(mut self, cap: usize) -> Self {
        self.arg_cap = cap;
        self
    }

    /// Builder method: set the picked element text preview length
    pub fn text_preview_chars(mut self, chars: usize) -> Self {
        self.text_preview_chars = chars;
        self
    }

    /// Builder method: set the startup delay
    pub fn startup_delay(mut self, delay_ms: u64) -> Self {
        self.startup_delay_ms = delay_ms;
        self
    }

    /// Builder method: set the existing-state scan delay
    pub fn state_scan_delay(mut self, delay_ms: u64) -> Self {
        self.state_scan_delay_ms = delay_ms;
        self
    }

    /// Builder method: set both link scan debounce windows
    pub fn scan_debounce(mut self, after_navigation_ms: u64, after_mutation_ms: u64) -> Self {
        self.scan_after_navigation_ms = after_navigation_ms;
        self.scan_after_mutation_ms = after_mutation_ms;
        self
    }

    /// Builder method: add a console noise marker
    pub fn noise_marker(mut self, marker: impl Into<String>) -> Self {
        self.noise_markers.push(marker.into());
        self
    }

    /// Check that the values can drive a bridge
    pub fn validate(&self) -> Result<()> {
        if self.arg_cap == 0 {
            return Err(BridgeError::InvalidConfig {
                field: "arg_cap".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.noise_markers.iter().any(|m| m.is_empty()) {
            return Err(BridgeError::InvalidConfig {
                field: "noise_markers".to_string(),
                reason: "an empty marker would silence every console call".to_string(),
            });
        }

        Ok(())
    }

    /// Whether a console call's first argument text is bridge or tooling noise
    pub fn is_noise(&self, first_arg: &str) -> bool {
        self.noise_markers.iter().any(|m| first_arg.contains(m.as_str()))
    }

    pub fn state_scan_delay_duration(&self) -> Duration {
        Duration::from_millis(self.state_scan_delay_ms)
    }

    pub fn startup_delay_duration(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn url_settle_delay(&self) -> Duration {
        Duration::from_millis(self.url_settle_delay_ms)
    }

    pub fn scan_after_navigation(&self) -> Duration {
        Duration::from_millis(self.scan_after_navigation_ms)
    }

    pub fn scan_after_mutation(&self) -> Duration {
        Duration::from_millis(self.scan_after_mutation_ms)
    }
}
