//! Tunable scheduler policy: timer intervals, priority shape and tiers.
//!
//! Every field has a default so an empty TOML document is a valid config.
//! Environment variables override parsed values (see [`PrefetchConfig::from_toml`]).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stackfetch_core::DeviceClass;

use crate::error::ConfigError;
use crate::priority::PriorityPolicy;
use crate::types::{ConcurrencyTiers, TierTable};

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Minimum spacing between applied focus updates, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Quiet period after the last focus update before switching to idle mode.
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: u64,
    /// Distance from focus that receives the steep scrolling preference.
    #[serde(default = "default_prefetch_window")]
    pub prefetch_window: usize,
    /// Every Nth item is a keyframe in idle mode.
    #[serde(default = "default_keyframe_stride")]
    pub keyframe_stride: usize,
    /// Period of the in-flight concurrency sampler.
    #[serde(default = "default_metrics_sample_ms")]
    pub metrics_sample_ms: u64,
    /// Focus position before the first update.
    #[serde(default)]
    pub initial_focus: usize,
    #[serde(default)]
    pub tiers: TierTable,
}

fn default_throttle_ms() -> u64 { 200 }
fn default_idle_threshold_ms() -> u64 { 500 }
fn default_prefetch_window() -> usize { 30 }
fn default_keyframe_stride() -> usize { 10 }
fn default_metrics_sample_ms() -> u64 { 100 }

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            idle_threshold_ms: default_idle_threshold_ms(),
            prefetch_window: default_prefetch_window(),
            keyframe_stride: default_keyframe_stride(),
            metrics_sample_ms: default_metrics_sample_ms(),
            initial_focus: 0,
            tiers: TierTable::default(),
        }
    }
}

impl PrefetchConfig {
    /// Parse config from a TOML string, apply env overrides and validate.
    ///
    /// Recognised overrides:
    /// - `STACKFETCH_THROTTLE_MS` → `throttle_ms`
    /// - `STACKFETCH_IDLE_MS` → `idle_threshold_ms`
    /// - `STACKFETCH_PREFETCH_WINDOW` → `prefetch_window`
    /// - `STACKFETCH_KEYFRAME_STRIDE` → `keyframe_stride`
    /// - `STACKFETCH_SAMPLE_MS` → `metrics_sample_ms`
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("STACKFETCH_THROTTLE_MS") {
            self.throttle_ms = v;
        }
        if let Some(v) = env_parse("STACKFETCH_IDLE_MS") {
            self.idle_threshold_ms = v;
        }
        if let Some(v) = env_parse("STACKFETCH_PREFETCH_WINDOW") {
            self.prefetch_window = v;
        }
        if let Some(v) = env_parse("STACKFETCH_KEYFRAME_STRIDE") {
            self.keyframe_stride = v;
        }
        if let Some(v) = env_parse("STACKFETCH_SAMPLE_MS") {
            self.metrics_sample_ms = v;
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Reject configs the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("throttle_ms", self.throttle_ms),
            ("idle_threshold_ms", self.idle_threshold_ms),
            ("metrics_sample_ms", self.metrics_sample_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.keyframe_stride == 0 {
            return Err(ConfigError::Invalid("keyframe_stride must be greater than zero".into()));
        }
        for (device, tiers) in [("mobile", self.tiers.mobile), ("desktop", self.tiers.desktop)] {
            if !tiers.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "{device} tiers must satisfy 1 <= base <= idle (got base={}, idle={})",
                    tiers.base, tiers.idle
                )));
            }
        }
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    pub fn metrics_sample_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_sample_ms)
    }

    pub fn tiers_for(&self, device: DeviceClass) -> ConcurrencyTiers {
        self.tiers.for_device(device)
    }

    pub fn priority_policy(&self) -> PriorityPolicy {
        PriorityPolicy {
            prefetch_window: self.prefetch_window,
            keyframe_stride: self.keyframe_stride,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
