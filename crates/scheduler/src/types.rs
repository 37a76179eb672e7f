use serde::{Deserialize, Serialize};
use stackfetch_core::DeviceClass;

/// Whether the user is actively moving through the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMode {
    /// Focus changed within the idle threshold: concentrate on neighbours.
    Scrolling,
    /// Quiet period elapsed: broaden coverage with keyframes.
    Idle,
}

/// Scheduler lifecycle. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Created,
    Running,
    Destroyed,
}

/// The two concurrency levels a scheduler switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyTiers {
    /// In-flight limit while scrolling.
    pub base: usize,
    /// In-flight limit after the idle threshold. Must be >= `base`.
    pub idle: usize,
}

impl ConcurrencyTiers {
    pub const fn new(base: usize, idle: usize) -> Self {
        Self { base, idle }
    }

    /// Limit that applies in the given mode.
    pub fn for_mode(&self, mode: ScrollMode) -> usize {
        match mode {
            ScrollMode::Scrolling => self.base,
            ScrollMode::Idle => self.idle,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.base >= 1 && self.base <= self.idle
    }
}

/// Per-device-class concurrency tiers, typically parsed from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    /// Conservative levels for constrained decode memory.
    #[serde(default = "default_mobile_tiers")]
    pub mobile: ConcurrencyTiers,
    #[serde(default = "default_desktop_tiers")]
    pub desktop: ConcurrencyTiers,
}

fn default_mobile_tiers() -> ConcurrencyTiers { ConcurrencyTiers::new(1, 2) }
fn default_desktop_tiers() -> ConcurrencyTiers { ConcurrencyTiers::new(3, 6) }

impl Default for TierTable {
    fn default() -> Self {
        Self {
            mobile: default_mobile_tiers(),
            desktop: default_desktop_tiers(),
        }
    }
}

impl TierTable {
    pub fn for_device(&self, device: DeviceClass) -> ConcurrencyTiers {
        match device {
            DeviceClass::Mobile => self.mobile,
            DeviceClass::Desktop => self.desktop,
        }
    }
}
