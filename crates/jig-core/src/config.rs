//! Harness configuration
//!
//! All run constants in one serde struct; a missing file or field falls
//! back to the board's reference values.

use jig_hal::LinkSpeed;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file malformed
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Run constants for the harness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Seconds to wait for stragglers before forced shutdown
    pub countdown_secs: u32,
    /// Sequencer loop cadence, ms
    pub loop_interval_ms: u64,
    /// Worker poll cadence, ms
    pub worker_poll_ms: u64,
    /// Input-stream poll bound, ms
    pub remote_poll_ms: u64,
    /// Companion discovery retry interval, ms
    pub discover_retry_ms: u64,
    /// Measurement-session retry interval, ms
    pub session_retry_ms: u64,
    /// Settle delay after driving a header pattern, ms
    pub settle_ms: u64,
    /// Minimum acceptable baseline throughput, Mbit/s
    pub throughput_floor_mbit: i64,
    /// Total baseline throughput attempts
    pub throughput_attempts: u32,
    /// Character budget per failure-report line
    pub report_line_budget: usize,
    /// Expected framebuffer vertical resolution, lines
    pub expected_fb_lines: i64,
    /// Link speed forced at bootstrap and restored at shutdown
    pub default_link: LinkSpeed,
    /// Board kind announced to the companion
    pub board: String,
}

impl HarnessConfig {
    /// Reference configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a toml file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// With a different countdown
    #[inline]
    #[must_use]
    pub fn with_countdown_secs(mut self, secs: u32) -> Self {
        self.countdown_secs = secs;
        self
    }

    /// With a different loop cadence
    #[inline]
    #[must_use]
    pub fn with_loop_interval_ms(mut self, ms: u64) -> Self {
        self.loop_interval_ms = ms;
        self
    }

    /// With a different throughput floor
    #[inline]
    #[must_use]
    pub fn with_throughput_floor(mut self, mbit: i64) -> Self {
        self.throughput_floor_mbit = mbit;
        self
    }

    /// Sequencer loop cadence
    #[inline]
    #[must_use]
    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    /// Worker poll cadence
    #[inline]
    #[must_use]
    pub fn worker_poll(&self) -> Duration {
        Duration::from_millis(self.worker_poll_ms)
    }

    /// Discovery retry interval
    #[inline]
    #[must_use]
    pub fn discover_retry(&self) -> Duration {
        Duration::from_millis(self.discover_retry_ms)
    }

    /// Measurement-session retry interval
    #[inline]
    #[must_use]
    pub fn session_retry(&self) -> Duration {
        Duration::from_millis(self.session_retry_ms)
    }

    /// Header pattern settle delay
    #[inline]
    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 60,
            loop_interval_ms: 500,
            worker_poll_ms: 500,
            remote_poll_ms: 100,
            discover_retry_ms: 500,
            session_retry_ms: 1000,
            settle_ms: 100,
            throughput_floor_mbit: 800,
            throughput_attempts: 4,
            report_line_budget: 50,
            expected_fb_lines: 1080,
            default_link: LinkSpeed::Gbit1,
            board: "m1".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_reference_values() {
        let config = HarnessConfig::new();
        assert_eq!(config.countdown_secs, 60);
        assert_eq!(config.throughput_floor_mbit, 800);
        assert_eq!(config.throughput_attempts, 4);
        assert_eq!(config.report_line_budget, 50);
        assert_eq!(config.default_link, LinkSpeed::Gbit1);
    }

    #[test]
    fn toml_round_trip() {
        let config = HarnessConfig::new().with_countdown_secs(30);
        let raw = toml::to_string(&config).unwrap();
        let back: HarnessConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back.countdown_secs, 30);
        assert_eq!(back.default_link, config.default_link);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let back: HarnessConfig = toml::from_str("countdown_secs = 10\n").unwrap();
        assert_eq!(back.countdown_secs, 10);
        assert_eq!(back.loop_interval_ms, 500);
    }
}
