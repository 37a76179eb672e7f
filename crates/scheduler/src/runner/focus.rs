use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::types::{Lifecycle, ScrollMode};

use super::core::{PrefetchScheduler, SchedulerState, Shared};

impl Shared {
    /// Spawn a one-shot timer that holds only a weak reference to the scheduler.
    fn spawn_timer<F>(self: &Arc<Self>, delay: Duration, fire: F) -> JoinHandle<()>
    where
        F: FnOnce(Arc<Shared>) + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                fire(shared);
            }
        })
    }

    /// Pin concurrency to the base tier and restart the quiet-period countdown.
    pub(super) fn enter_scrolling(self: &Arc<Self>, state: &mut SchedulerState) {
        if state.mode == ScrollMode::Idle {
            debug!(scheduler = %self.id, "focus moved, leaving idle mode");
        }
        state.mode = ScrollMode::Scrolling;
        state.concurrency = self.tiers.base;
        self.reset_idle_timer(state);
    }

    pub(super) fn reset_idle_timer(self: &Arc<Self>, state: &mut SchedulerState) {
        if let Some(handle) = state.timers.idle.take() {
            handle.abort();
        }
        state.timers.idle_epoch += 1;
        let epoch = state.timers.idle_epoch;
        let handle = self.spawn_timer(self.config.idle_threshold(), move |shared| {
            shared.on_idle(epoch)
        });
        state.timers.idle = Some(handle);
    }

    fn arm_throttle(self: &Arc<Self>, state: &mut SchedulerState) {
        state.timers.throttle_epoch += 1;
        let epoch = state.timers.throttle_epoch;
        let handle = self.spawn_timer(self.config.throttle_interval(), move |shared| {
            shared.on_throttle(epoch)
        });
        state.timers.throttle = Some(handle);
    }

    /// Apply the latest pending focus: one recalculation per throttle window.
    fn on_throttle(self: &Arc<Self>, epoch: u64) {
        let mut state = self.lock_state();
        if state.lifecycle != Lifecycle::Running || state.timers.throttle_epoch != epoch {
            return;
        }
        state.timers.throttle = None;

        let Some(focus) = state.pending_focus.take() else {
            return;
        };
        state.focus_index = focus;
        state.metrics.record_applied_focus();
        self.recalculate(&mut state);
        self.process_next(&mut state);
    }

    /// Quiet period elapsed: boost concurrency and rescore for broad coverage.
    fn on_idle(self: &Arc<Self>, epoch: u64) {
        let mut state = self.lock_state();
        if state.lifecycle != Lifecycle::Running || state.timers.idle_epoch != epoch {
            return;
        }
        state.timers.idle = None;

        state.mode = ScrollMode::Idle;
        state.concurrency = self.tiers.idle;
        state.metrics.record_idle_boost();
        info!(
            scheduler = %self.id,
            concurrency = state.concurrency,
            focus = state.focus_index,
            queued = state.queue.len(),
            "idle boost activated"
        );

        self.recalculate(&mut state);
        self.process_next(&mut state);
    }
}

impl PrefetchScheduler {
    /// Report the user's current position in the stack.
    ///
    /// Cheap enough to call on every scroll event: the value is recorded and
    /// applied at most once per throttle interval (last write wins). Every
    /// call also restarts idle detection and drops concurrency to the base
    /// tier. Indices past the end are clamped to the last item. Before
    /// [`start`](Self::start) the value becomes the starting focus directly;
    /// after [`destroy`](Self::destroy) the call is ignored.
    pub fn update_focus(&self, index: usize) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        let focus = shared.clamp_focus(index);

        match state.lifecycle {
            Lifecycle::Destroyed => {
                debug!(scheduler = %shared.id, index, "ignoring focus update after destroy");
                return;
            }
            Lifecycle::Created => {
                state.metrics.record_scroll_event();
                state.focus_index = focus;
                return;
            }
            Lifecycle::Running => {}
        }

        state.metrics.record_scroll_event();
        state.pending_focus = Some(focus);
        shared.enter_scrolling(&mut state);

        if state.timers.throttle.is_none() {
            shared.arm_throttle(&mut state);
        }
    }
}
