use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Read-only snapshot of scheduler counters.
///
/// Everything is monotonic except the two latency fields, which are set at
/// most once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerMetrics {
    pub total_images: usize,
    pub images_loaded: usize,
    /// Wall-clock time the scheduler was started (construction time until then).
    pub start_time: DateTime<Utc>,
    /// Milliseconds from start to the first successful load.
    pub first_image_load_ms: Option<u64>,
    /// Milliseconds from start until every item had loaded.
    pub all_images_load_ms: Option<u64>,
    pub priority_recalculations: u64,
    /// Raw focus updates received.
    pub scroll_events: u64,
    /// Focus updates actually applied after throttling.
    pub throttled_scroll_events: u64,
    /// Mean of periodic in-flight samples.
    pub average_concurrency: f64,
    pub peak_concurrency: usize,
    pub idle_boost_activations: u64,
    pub failed_fetches: u64,
    pub callback_panics: u64,
}

impl SchedulerMetrics {
    /// Emit the summary line logged when a scheduler is destroyed.
    pub fn log_summary(&self, scheduler_id: &Uuid) {
        info!(
            scheduler = %scheduler_id,
            loaded = self.images_loaded,
            total = self.total_images,
            first_image_ms = ?self.first_image_load_ms,
            all_images_ms = ?self.all_images_load_ms,
            recalculations = self.priority_recalculations,
            scroll_events = self.scroll_events,
            applied_scroll_events = self.throttled_scroll_events,
            avg_concurrency = self.average_concurrency,
            peak_concurrency = self.peak_concurrency,
            idle_boosts = self.idle_boost_activations,
            failed = self.failed_fetches,
            "prefetch scheduler summary"
        );
    }
}

/// Mutable counters owned by the scheduler state.
///
/// The dispatch loop only calls the `record_*` methods; all aggregation lives here.
#[derive(Debug)]
pub(crate) struct MetricsRecorder {
    total_images: usize,
    images_loaded: usize,
    start_time: DateTime<Utc>,
    started_at: Instant,
    first_image_load_ms: Option<u64>,
    all_images_load_ms: Option<u64>,
    priority_recalculations: u64,
    scroll_events: u64,
    throttled_scroll_events: u64,
    concurrency_sample_sum: u64,
    concurrency_samples: u64,
    peak_concurrency: usize,
    idle_boost_activations: u64,
    failed_fetches: u64,
    callback_panics: u64,
}

impl MetricsRecorder {
    pub(crate) fn new(total_images: usize) -> Self {
        Self {
            total_images,
            images_loaded: 0,
            start_time: Utc::now(),
            started_at: Instant::now(),
            first_image_load_ms: None,
            all_images_load_ms: None,
            priority_recalculations: 0,
            scroll_events: 0,
            throttled_scroll_events: 0,
            concurrency_sample_sum: 0,
            concurrency_samples: 0,
            peak_concurrency: 0,
            idle_boost_activations: 0,
            failed_fetches: 0,
            callback_panics: 0,
        }
    }

    /// Latencies are measured from this point.
    pub(crate) fn mark_started(&mut self) {
        self.start_time = Utc::now();
        self.started_at = Instant::now();
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub(crate) fn record_success(&mut self, loaded: usize) {
        self.images_loaded = loaded;
        if self.first_image_load_ms.is_none() {
            self.first_image_load_ms = Some(self.elapsed_ms());
        }
        if self.all_images_load_ms.is_none() && loaded >= self.total_images {
            self.all_images_load_ms = Some(self.elapsed_ms());
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_fetches += 1;
    }

    pub(crate) fn record_callback_panic(&mut self) {
        self.callback_panics += 1;
    }

    pub(crate) fn record_recalculation(&mut self) {
        self.priority_recalculations += 1;
    }

    pub(crate) fn record_scroll_event(&mut self) {
        self.scroll_events += 1;
    }

    pub(crate) fn record_applied_focus(&mut self) {
        self.throttled_scroll_events += 1;
    }

    pub(crate) fn record_idle_boost(&mut self) {
        self.idle_boost_activations += 1;
    }

    /// Track the peak at dispatch time, between samples.
    pub(crate) fn observe_in_flight(&mut self, in_flight: usize) {
        self.peak_concurrency = self.peak_concurrency.max(in_flight);
    }

    /// Periodic sample feeding `average_concurrency`.
    pub(crate) fn sample_in_flight(&mut self, in_flight: usize) {
        self.concurrency_sample_sum += in_flight as u64;
        self.concurrency_samples += 1;
        self.observe_in_flight(in_flight);
    }

    pub(crate) fn snapshot(&self) -> SchedulerMetrics {
        let average_concurrency = if self.concurrency_samples == 0 {
            0.0
        } else {
            self.concurrency_sample_sum as f64 / self.concurrency_samples as f64
        };
        SchedulerMetrics {
            total_images: self.total_images,
            images_loaded: self.images_loaded,
            start_time: self.start_time,
            first_image_load_ms: self.first_image_load_ms,
            all_images_load_ms: self.all_images_load_ms,
            priority_recalculations: self.priority_recalculations,
            scroll_events: self.scroll_events,
            throttled_scroll_events: self.throttled_scroll_events,
            average_concurrency,
            peak_concurrency: self.peak_concurrency,
            idle_boost_activations: self.idle_boost_activations,
            failed_fetches: self.failed_fetches,
            callback_panics: self.callback_panics,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn default_snapshot() {
        let m = MetricsRecorder::new(10).snapshot();
        assert_eq!(m.total_images, 10);
        assert_eq!(m.images_loaded, 0);
        assert_eq!(m.first_image_load_ms, None);
        assert_eq!(m.all_images_load_ms, None);
        assert_eq!(m.average_concurrency, 0.0);
        assert_eq!(m.peak_concurrency, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn latencies_are_set_once() {
        let mut rec = MetricsRecorder::new(2);
        rec.mark_started();

        tokio::time::advance(Duration::from_millis(40)).await;
        rec.record_success(1);
        tokio::time::advance(Duration::from_millis(60)).await;
        rec.record_success(2);
        tokio::time::advance(Duration::from_millis(500)).await;
        rec.record_success(2);

        let m = rec.snapshot();
        assert_eq!(m.images_loaded, 2);
        assert_eq!(m.first_image_load_ms, Some(40));
        assert_eq!(m.all_images_load_ms, Some(100));
    }

    #[test]
    fn average_and_peak_concurrency() {
        let mut rec = MetricsRecorder::new(5);
        rec.sample_in_flight(2);
        rec.sample_in_flight(4);
        rec.sample_in_flight(0);
        rec.observe_in_flight(6);

        let m = rec.snapshot();
        assert!((m.average_concurrency - 2.0).abs() < f64::EPSILON);
        assert_eq!(m.peak_concurrency, 6);
    }

    #[test]
    fn counters_accumulate() {
        let mut rec = MetricsRecorder::new(1);
        rec.record_scroll_event();
        rec.record_scroll_event();
        rec.record_applied_focus();
        rec.record_recalculation();
        rec.record_idle_boost();
        rec.record_failure();
        rec.record_callback_panic();

        let m = rec.snapshot();
        assert_eq!(m.scroll_events, 2);
        assert_eq!(m.throttled_scroll_events, 1);
        assert_eq!(m.priority_recalculations, 1);
        assert_eq!(m.idle_boost_activations, 1);
        assert_eq!(m.failed_fetches, 1);
        assert_eq!(m.callback_panics, 1);
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_value(MetricsRecorder::new(3).snapshot()).unwrap();
        assert_eq!(json["total_images"], 3);
        assert!(json["first_image_load_ms"].is_null());
    }
}
