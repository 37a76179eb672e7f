//! Priority scoring relative to the current focus.
//!
//! Scrolling mode concentrates bandwidth on the immediate neighbourhood with a
//! quadratic falloff inside the prefetch window and a small decaying floor
//! outside it. Idle mode gives every keyframe a flat bonus on top of a gentle
//! linear falloff, so the whole stack gets sparse coverage while the
//! neighbourhood keeps densifying.

use serde::{Deserialize, Serialize};

use crate::types::ScrollMode;

/// Score given to an in-window item at distance zero while scrolling.
const SCROLL_PEAK: f64 = 1000.0;
/// Decaying floor for out-of-window items while scrolling.
const SCROLL_FLOOR: f64 = 10.0;
/// Flat bonus for keyframes while idle.
const KEYFRAME_BONUS: f64 = 1000.0;
/// Linear proximity term ceiling while idle.
const IDLE_PROXIMITY: f64 = 500.0;

/// Shape parameters for [`calculate_priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityPolicy {
    pub prefetch_window: usize,
    pub keyframe_stride: usize,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            prefetch_window: 30,
            keyframe_stride: 10,
        }
    }
}

impl PriorityPolicy {
    pub fn is_keyframe(&self, index: usize) -> bool {
        self.keyframe_stride > 0 && index % self.keyframe_stride == 0
    }
}

/// Score `index` against `focus`. Higher means dispatch sooner.
pub fn calculate_priority(
    index: usize,
    focus: usize,
    mode: ScrollMode,
    policy: &PriorityPolicy,
) -> f64 {
    let distance = index.abs_diff(focus);
    let d = distance as f64;

    match mode {
        ScrollMode::Scrolling => {
            if distance > policy.prefetch_window {
                (SCROLL_FLOOR - d).max(0.0)
            } else {
                (SCROLL_PEAK - d * d).max(0.0)
            }
        }
        ScrollMode::Idle => {
            let bonus = if policy.is_keyframe(index) { KEYFRAME_BONUS } else { 0.0 };
            bonus + (IDLE_PROXIMITY - d).max(0.0)
        }
    }
}
