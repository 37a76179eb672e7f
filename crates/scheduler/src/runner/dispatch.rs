use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use stackfetch_core::{FetchError, StackItem};
use tracing::{debug, error, info, warn};

use crate::priority::calculate_priority;
use crate::types::Lifecycle;

use super::core::{PrefetchScheduler, SchedulerState, Shared};

impl Shared {
    /// Fill free concurrency slots from the head of the queue.
    ///
    /// Called after every event that can free a slot or reorder the queue;
    /// each fetch completion re-enters it, so no polling loop is needed.
    pub(super) fn process_next(self: &Arc<Self>, state: &mut SchedulerState) {
        if state.lifecycle != Lifecycle::Running || state.paused {
            return;
        }

        while state.processing.len() < state.concurrency {
            let Some(item) = state.queue.pop() else {
                break;
            };

            if state.loaded.contains(&item.index) || state.processing.contains(&item.index) {
                debug!(scheduler = %self.id, index = item.index, "skipping item already loaded or in flight");
                continue;
            }

            state.processing.insert(item.index);
            let in_flight = state.processing.len();
            state.metrics.observe_in_flight(in_flight);

            debug!(
                scheduler = %self.id,
                index = item.index,
                id = %item.id,
                priority = item.priority,
                in_flight,
                limit = state.concurrency,
                "dispatching fetch"
            );
            self.spawn_fetch(item);
        }
    }

    /// Run the fetch on its own task so a panicking fetcher still frees the slot.
    fn spawn_fetch(self: &Arc<Self>, item: StackItem) {
        let shared = Arc::clone(self);
        let fetcher = Arc::clone(&self.fetcher);
        let id = item.id.clone();

        self.runtime.spawn(async move {
            let fetch = shared
                .runtime
                .spawn(async move { fetcher.fetch_and_cache(&id).await });
            let result = match fetch.await {
                Ok(result) => result,
                Err(e) => Err(FetchError::Other(format!("fetch task failed: {e}"))),
            };
            shared.complete(item, result);
        });
    }

    fn complete(self: &Arc<Self>, item: StackItem, result: Result<(), FetchError>) {
        let loaded = {
            let mut state = self.lock_state();
            state.processing.remove(&item.index);

            if state.lifecycle == Lifecycle::Destroyed {
                debug!(scheduler = %self.id, index = item.index, "discarding fetch result after destroy");
                return;
            }

            let loaded = match result {
                Ok(()) => {
                    state.loaded.insert(item.index);
                    state.failed.remove(&item.index);
                    let count = state.loaded.len();
                    state.metrics.record_success(count);
                    if count == self.ids.len() {
                        info!(scheduler = %self.id, items = count, "all stack items loaded");
                    }
                    true
                }
                Err(e) => {
                    warn!(
                        scheduler = %self.id,
                        index = item.index,
                        id = %item.id,
                        error = %e,
                        "fetch failed, dropping item"
                    );
                    state.failed.insert(item.index);
                    state.metrics.record_failure();
                    false
                }
            };

            self.process_next(&mut state);
            loaded
        };

        if loaded {
            self.notify_loaded(item.index);
        }
    }

    /// Invoke the host callback outside the lock, containing any panic.
    fn notify_loaded(&self, index: usize) {
        let callback = &self.on_item_loaded;
        if std::panic::catch_unwind(AssertUnwindSafe(|| callback(index))).is_err() {
            error!(scheduler = %self.id, index, "on_item_loaded callback panicked");
            self.lock_state().metrics.record_callback_panic();
        }
    }

    /// Rescore the whole queue for the current focus and mode.
    pub(super) fn recalculate(&self, state: &mut SchedulerState) {
        let focus = state.focus_index;
        let mode = state.mode;
        let policy = self.policy;
        state
            .queue
            .reprioritize(|index| calculate_priority(index, focus, mode, &policy));
        state.metrics.record_recalculation();
        debug!(scheduler = %self.id, focus, ?mode, queued = state.queue.len(), "priorities recalculated");
    }
}

impl PrefetchScheduler {
    /// Put an item back on the queue, typically after its fetch failed.
    ///
    /// Returns `false` if the scheduler is destroyed, the index is out of
    /// range, or the item is already loaded, in flight or queued.
    pub fn requeue(&self, index: usize) -> bool {
        let shared = &self.shared;
        let mut state = shared.lock_state();

        if state.lifecycle == Lifecycle::Destroyed
            || index >= shared.ids.len()
            || state.loaded.contains(&index)
            || state.processing.contains(&index)
            || state.queue.contains(index)
        {
            return false;
        }

        let mut item = StackItem::new(shared.ids[index].clone(), index);
        item.priority = calculate_priority(index, state.focus_index, state.mode, &shared.policy);
        state.queue.push(item);
        state.failed.remove(&index);
        debug!(scheduler = %shared.id, index, "item re-queued");

        shared.process_next(&mut state);
        true
    }
}
