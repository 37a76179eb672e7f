use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use stackfetch_core::{DeviceClass, FetchAndCache, StackItem};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::config::PrefetchConfig;
use crate::error::SchedulerError;
use crate::metrics::{MetricsRecorder, SchedulerMetrics};
use crate::priority::PriorityPolicy;
use crate::queue::WorkQueue;
use crate::types::{ConcurrencyTiers, Lifecycle, ScrollMode};

/// Invoked once per successfully loaded item with its stack index.
///
/// Runs on a tokio worker after the scheduler lock is released, so it may
/// call back into the scheduler. A panic inside it is caught and logged.
pub type ItemLoadedCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Adaptive prefetch scheduler for one stack-view session.
///
/// Construct with [`SchedulerBuilder`] (or [`PrefetchScheduler::new`]) inside
/// a tokio runtime, then [`start`](Self::start) it and feed it focus updates.
/// Public methods never fail; calls after [`destroy`](Self::destroy) are
/// no-ops. Dropping the scheduler destroys it.
pub struct PrefetchScheduler {
    pub(super) shared: Arc<Shared>,
}

/// State shared between the handle, timer tasks and fetch completions.
pub(super) struct Shared {
    pub(super) id: Uuid,
    pub(super) runtime: Handle,
    pub(super) fetcher: Arc<dyn FetchAndCache>,
    pub(super) on_item_loaded: ItemLoadedCallback,
    pub(super) config: PrefetchConfig,
    pub(super) tiers: ConcurrencyTiers,
    pub(super) policy: PriorityPolicy,
    /// Item ids by index, fixed at construction.
    pub(super) ids: Vec<String>,
    pub(super) state: Mutex<SchedulerState>,
}

/// Everything mutated by the dispatch loop. Only touched under `Shared::state`,
/// and the lock is never held across an `.await`.
pub(super) struct SchedulerState {
    pub(super) queue: WorkQueue,
    /// Indices dispatched and not yet settled.
    pub(super) processing: HashSet<usize>,
    pub(super) loaded: HashSet<usize>,
    pub(super) failed: HashSet<usize>,
    pub(super) focus_index: usize,
    pub(super) pending_focus: Option<usize>,
    pub(super) mode: ScrollMode,
    pub(super) concurrency: usize,
    pub(super) lifecycle: Lifecycle,
    pub(super) paused: bool,
    pub(super) metrics: MetricsRecorder,
    pub(super) timers: Timers,
}

/// Owned timer tasks. Epochs invalidate a timer that fired but lost the race
/// against a reset or abort.
#[derive(Default)]
pub(super) struct Timers {
    pub(super) throttle: Option<JoinHandle<()>>,
    pub(super) idle: Option<JoinHandle<()>>,
    pub(super) sampler: Option<JoinHandle<()>>,
    pub(super) throttle_epoch: u64,
    pub(super) idle_epoch: u64,
}

impl Timers {
    pub(super) fn abort_all(&mut self) {
        for handle in [self.throttle.take(), self.idle.take(), self.sampler.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
        self.throttle_epoch += 1;
        self.idle_epoch += 1;
    }
}

impl Shared {
    /// Lock the scheduler state, recovering from poisoning so public methods never panic.
    pub(super) fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Out-of-range focus positions are clamped to the last item.
    pub(super) fn clamp_focus(&self, index: usize) -> usize {
        index.min(self.ids.len().saturating_sub(1))
    }
}

fn noop_callback() -> ItemLoadedCallback {
    Arc::new(|_: usize| {})
}

// ── Builder ─────────────────────────────────────────────────────────

/// Fluent builder for a [`PrefetchScheduler`].
///
/// # Example
/// ```ignore
/// let scheduler = SchedulerBuilder::new(ids, fetcher)
///     .device(DeviceClass::Desktop)
///     .on_item_loaded(|index| println!("slice {index} ready"))
///     .build()?;
/// scheduler.start();
/// ```
pub struct SchedulerBuilder {
    ids: Vec<String>,
    fetcher: Arc<dyn FetchAndCache>,
    device: DeviceClass,
    config: PrefetchConfig,
    on_item_loaded: Option<ItemLoadedCallback>,
}

impl SchedulerBuilder {
    pub fn new<I, S>(ids: I, fetcher: Arc<dyn FetchAndCache>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            fetcher,
            device: DeviceClass::Desktop,
            config: PrefetchConfig::default(),
            on_item_loaded: None,
        }
    }

    /// Select the concurrency tiers (default: desktop).
    pub fn device(mut self, device: DeviceClass) -> Self {
        self.device = device;
        self
    }

    pub fn mobile(self, is_mobile: bool) -> Self {
        self.device(DeviceClass::from_is_mobile(is_mobile))
    }

    pub fn config(mut self, config: PrefetchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_item_loaded<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.on_item_loaded = Some(Arc::new(callback));
        self
    }

    /// Validate the config and bind the scheduler to the current tokio runtime.
    pub fn build(self) -> Result<PrefetchScheduler, SchedulerError> {
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let tiers = self.config.tiers_for(self.device);
        let policy = self.config.priority_policy();
        let total = self.ids.len();
        let focus_index = self.config.initial_focus.min(total.saturating_sub(1));
        let queue = WorkQueue::new(StackItem::from_ids(self.ids.iter().cloned()));
        let id = Uuid::new_v4();

        info!(
            scheduler = %id,
            items = total,
            device = %self.device,
            base = tiers.base,
            idle = tiers.idle,
            "prefetch scheduler created"
        );

        let state = SchedulerState {
            queue,
            processing: HashSet::new(),
            loaded: HashSet::new(),
            failed: HashSet::new(),
            focus_index,
            pending_focus: None,
            mode: ScrollMode::Scrolling,
            concurrency: tiers.base,
            lifecycle: Lifecycle::Created,
            paused: false,
            metrics: MetricsRecorder::new(total),
            timers: Timers::default(),
        };

        Ok(PrefetchScheduler {
            shared: Arc::new(Shared {
                id,
                runtime,
                fetcher: self.fetcher,
                on_item_loaded: self.on_item_loaded.unwrap_or_else(noop_callback),
                config: self.config,
                tiers,
                policy,
                ids: self.ids,
                state: Mutex::new(state),
            }),
        })
    }
}

// ── Handle ──────────────────────────────────────────────────────────

impl PrefetchScheduler {
    /// Construct from ids, completion callback, device class, fetcher and config.
    pub fn new<I, S, F>(
        ids: I,
        on_item_loaded: F,
        device: DeviceClass,
        fetcher: Arc<dyn FetchAndCache>,
        config: PrefetchConfig,
    ) -> Result<Self, SchedulerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(usize) + Send + Sync + 'static,
    {
        SchedulerBuilder::new(ids, fetcher)
            .device(device)
            .config(config)
            .on_item_loaded(on_item_loaded)
            .build()
    }

    pub fn builder<I, S>(ids: I, fetcher: Arc<dyn FetchAndCache>) -> SchedulerBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchedulerBuilder::new(ids, fetcher)
    }

    /// Session id used in this scheduler's log lines.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.shared.lock_state().metrics.snapshot()
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.shared.config
    }

    pub fn tiers(&self) -> ConcurrencyTiers {
        self.shared.tiers
    }

    pub fn len(&self) -> usize {
        self.shared.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.ids.is_empty()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lock_state().lifecycle
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    /// Last focus position applied after throttling.
    pub fn focus_index(&self) -> usize {
        self.shared.lock_state().focus_index
    }

    pub fn scroll_mode(&self) -> ScrollMode {
        self.shared.lock_state().mode
    }

    /// Current in-flight limit.
    pub fn concurrency(&self) -> usize {
        self.shared.lock_state().concurrency
    }

    /// Number of fetches currently in flight.
    pub fn in_flight(&self) -> usize {
        self.shared.lock_state().processing.len()
    }

    /// Number of items still waiting for dispatch.
    pub fn queued(&self) -> usize {
        self.shared.lock_state().queue.len()
    }

    /// Queued indices in the order they would be dispatched.
    pub fn queued_indices(&self) -> Vec<usize> {
        self.shared.lock_state().queue.indices()
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        self.shared.lock_state().loaded.contains(&index)
    }

    /// Indices whose last fetch failed and that have not been re-queued since.
    pub fn failed_indices(&self) -> Vec<usize> {
        let mut failed: Vec<usize> = self.shared.lock_state().failed.iter().copied().collect();
        failed.sort_unstable();
        failed
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.destroy();
    }
}
