//! Simulated fetch primitive and the JSON run report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use stackfetch_core::{DeviceClass, FetchAndCache, FetchError};
use stackfetch_fetch::CacheStats;
use stackfetch_scheduler::SchedulerMetrics;
use tracing::debug;

/// Synthetic item ids: `slice-0000.dcm`, `slice-0001.dcm`, ...
pub fn synthetic_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("slice-{i:04}.dcm")).collect()
}

/// Stack position encoded in a synthetic id.
fn synthetic_index(id: &str) -> Option<usize> {
    id.strip_prefix("slice-")?.strip_suffix(".dcm")?.parse().ok()
}

/// Fetcher that sleeps instead of doing I/O.
pub struct SimulatedFetcher {
    latency: Duration,
    jitter_ms: u64,
    fail_every: Option<usize>,
    requests: AtomicU64,
}

impl SimulatedFetcher {
    pub fn new(latency_ms: u64, jitter_ms: u64, fail_every: Option<usize>) -> Self {
        Self {
            latency: Duration::from_millis(latency_ms),
            jitter_ms,
            fail_every: fail_every.filter(|n| *n > 0),
            requests: AtomicU64::new(0),
        }
    }

    fn latency_for(&self, index: usize) -> Duration {
        if self.jitter_ms == 0 {
            return self.latency;
        }
        let spread = (index as u64).wrapping_mul(7919) % (self.jitter_ms + 1);
        self.latency + Duration::from_millis(spread)
    }

    fn should_fail(&self, index: usize) -> bool {
        self.fail_every.is_some_and(|n| index % n == n - 1)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FetchAndCache for SimulatedFetcher {
    async fn fetch_and_cache(&self, id: &str) -> Result<(), FetchError> {
        let index = synthetic_index(id).ok_or_else(|| FetchError::InvalidId {
            id: id.to_string(),
            reason: "not a synthetic slice id".into(),
        })?;
        self.requests.fetch_add(1, Ordering::Relaxed);

        tokio::time::sleep(self.latency_for(index)).await;
        if self.should_fail(index) {
            return Err(FetchError::Status {
                id: id.to_string(),
                status: 503,
            });
        }
        debug!(id, index, "simulated fetch complete");
        Ok(())
    }
}

/// Where stack items came from during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Simulated,
    Http,
}

/// Everything printed at the end of a run.
#[derive(Debug, Serialize)]
pub struct SimReport {
    pub source: Source,
    pub device: DeviceClass,
    pub timed_out: bool,
    pub failed_indices: Vec<usize>,
    pub metrics: SchedulerMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_to_indices() {
        let ids = synthetic_ids(12);
        assert_eq!(ids[7], "slice-0007.dcm");
        assert_eq!(synthetic_index(&ids[11]), Some(11));
        assert_eq!(synthetic_index("other-1.dcm"), None);
    }

    #[test]
    fn every_nth_fails() {
        let fetcher = SimulatedFetcher::new(10, 0, Some(3));
        let failing: Vec<usize> = (0..9).filter(|i| fetcher.should_fail(*i)).collect();
        assert_eq!(failing, vec![2, 5, 8]);

        let never = SimulatedFetcher::new(10, 0, Some(0));
        assert!(!never.should_fail(0));
    }

    #[test]
    fn jitter_stays_within_spread() {
        let fetcher = SimulatedFetcher::new(40, 15, None);
        for index in 0..100 {
            let latency = fetcher.latency_for(index);
            assert!(latency >= Duration::from_millis(40));
            assert!(latency <= Duration::from_millis(55));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_takes_configured_latency() {
        let fetcher = SimulatedFetcher::new(40, 0, Some(2));
        let started = tokio::time::Instant::now();

        fetcher.fetch_and_cache("slice-0000.dcm").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));

        let err = fetcher.fetch_and_cache("slice-0001.dcm").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));

        let err = fetcher.fetch_and_cache("bogus").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidId { .. }));
        assert_eq!(fetcher.requests(), 2);
    }

    #[test]
    fn report_serializes_source_lowercase() {
        let value = serde_json::to_value(Source::Http).unwrap();
        assert_eq!(value, serde_json::json!("http"));
    }
}
