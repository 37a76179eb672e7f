use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::types::{Lifecycle, ScrollMode};

use super::core::{PrefetchScheduler, SchedulerState, Shared};

impl Shared {
    /// Periodically sample the in-flight count for `average_concurrency`.
    fn start_sampler(self: &Arc<Self>, state: &mut SchedulerState) {
        let weak = Arc::downgrade(self);
        let period = self.config.metrics_sample_interval();

        let handle = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let mut state = shared.lock_state();
                if state.lifecycle == Lifecycle::Destroyed {
                    break;
                }
                let in_flight = state.processing.len();
                state.metrics.sample_in_flight(in_flight);
            }
        });
        state.timers.sampler = Some(handle);
    }
}

impl PrefetchScheduler {
    /// Begin dispatching. Arms idle detection and the metrics sampler.
    ///
    /// Only the first call has an effect; calls after destroy are ignored.
    pub fn start(&self) {
        let shared = &self.shared;
        let mut state = shared.lock_state();

        match state.lifecycle {
            Lifecycle::Running => {
                debug!(scheduler = %shared.id, "scheduler already started");
                return;
            }
            Lifecycle::Destroyed => {
                debug!(scheduler = %shared.id, "ignoring start after destroy");
                return;
            }
            Lifecycle::Created => {}
        }

        state.lifecycle = Lifecycle::Running;
        state.metrics.mark_started();
        state.mode = ScrollMode::Scrolling;
        state.concurrency = shared.tiers.base;
        shared.reset_idle_timer(&mut state);
        shared.start_sampler(&mut state);
        shared.recalculate(&mut state);

        info!(
            scheduler = %shared.id,
            items = shared.ids.len(),
            focus = state.focus_index,
            concurrency = state.concurrency,
            "prefetch scheduler started"
        );

        shared.process_next(&mut state);
    }

    /// Stop pulling new work. In-flight fetches still settle and report.
    pub fn pause(&self) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        if state.lifecycle == Lifecycle::Destroyed || state.paused {
            return;
        }
        state.paused = true;
        info!(scheduler = %shared.id, in_flight = state.processing.len(), "prefetch scheduler paused");
    }

    /// Undo [`pause`](Self::pause) and refill free slots.
    pub fn resume(&self) {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        if state.lifecycle == Lifecycle::Destroyed || !state.paused {
            return;
        }
        state.paused = false;
        info!(scheduler = %shared.id, queued = state.queue.len(), "prefetch scheduler resumed");
        shared.process_next(&mut state);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock_state().paused
    }

    /// Tear the scheduler down for good.
    ///
    /// Cancels every timer, empties the queue and logs a final metrics
    /// summary. Fetches already in flight run to completion but their results
    /// are discarded: no callback and no metric change. Idempotent.
    pub fn destroy(&self) {
        let shared = &self.shared;
        let summary = {
            let mut state = shared.lock_state();
            if state.lifecycle == Lifecycle::Destroyed {
                return;
            }
            state.lifecycle = Lifecycle::Destroyed;
            state.timers.abort_all();
            state.queue.clear();
            state.pending_focus = None;

            info!(
                scheduler = %shared.id,
                abandoned_in_flight = state.processing.len(),
                "prefetch scheduler destroyed"
            );
            state.metrics.snapshot()
        };

        summary.log_summary(&shared.id);
    }
}
