mod cli;
mod sim;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use stackfetch_core::config::{load_dotenv, FetchConfig};
use stackfetch_core::{Config, DeviceClass, FetchAndCache};
use stackfetch_fetch::HttpStackCache;
use stackfetch_scheduler::{PrefetchConfig, PrefetchScheduler, SchedulerBuilder};

use crate::cli::SimArgs;
use crate::sim::{synthetic_ids, SimReport, SimulatedFetcher, Source};

const DRAIN_POLL: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = SimArgs::parse();
    let env_config = Config::from_env();
    env_config.log_summary();

    let prefetch = match &args.config {
        Some(path) => PrefetchConfig::from_file(path)
            .with_context(|| format!("failed to load scheduler config {}", path.display()))?,
        None => PrefetchConfig::from_toml("").context("invalid scheduler config overrides")?,
    };
    let device = if args.mobile {
        DeviceClass::Mobile
    } else {
        env_config.device
    };

    let ids = synthetic_ids(args.items);
    let fetch_config = FetchConfig {
        base_url: args.base_url.clone().or_else(|| env_config.fetch.base_url.clone()),
        ..env_config.fetch.clone()
    };

    let mut http: Option<Arc<HttpStackCache>> = None;
    let mut simulated: Option<Arc<SimulatedFetcher>> = None;
    let fetcher: Arc<dyn FetchAndCache> = if fetch_config.is_configured() {
        let cache = Arc::new(
            HttpStackCache::from_config(&fetch_config).context("failed to build HTTP cache")?,
        );
        http = Some(Arc::clone(&cache));
        cache
    } else {
        let fake = Arc::new(SimulatedFetcher::new(
            args.latency_ms,
            args.jitter_ms,
            args.fail_every,
        ));
        simulated = Some(Arc::clone(&fake));
        fake
    };

    let loaded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loaded);
    let scheduler = SchedulerBuilder::new(ids, fetcher)
        .device(device)
        .config(prefetch)
        .on_item_loaded(move |_index| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .build()
        .context("failed to build prefetch scheduler")?;

    info!(
        scheduler = %scheduler.id(),
        items = args.items,
        device = %device,
        trace_len = args.scroll_to.len(),
        "starting simulation"
    );
    scheduler.start();

    let budget = Duration::from_secs(args.timeout_secs);
    let step = Duration::from_millis(args.scroll_step_ms);
    let timed_out = tokio::time::timeout(budget, async {
        replay(&scheduler, &args.scroll_to, step).await;
        wait_for_drain(&scheduler).await;
    })
    .await
    .is_err();

    if timed_out {
        warn!(
            timeout_secs = args.timeout_secs,
            queued = scheduler.queued(),
            in_flight = scheduler.in_flight(),
            "simulation timed out before the stack drained"
        );
    }

    scheduler.destroy();
    info!(
        loaded = loaded.load(Ordering::Relaxed),
        failed = scheduler.failed_indices().len(),
        simulated_requests = simulated.as_ref().map(|fake| fake.requests()),
        "simulation finished"
    );

    let report = SimReport {
        source: if http.is_some() { Source::Http } else { Source::Simulated },
        device,
        timed_out,
        failed_indices: scheduler.failed_indices(),
        metrics: scheduler.metrics(),
        cache: http.as_ref().map(|cache| cache.stats()),
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    if timed_out {
        anyhow::bail!("stack did not drain within {}s", args.timeout_secs);
    }
    Ok(())
}

/// Feed the scroll trace to the scheduler at a fixed cadence.
async fn replay(scheduler: &PrefetchScheduler, trace: &[usize], step: Duration) {
    for &position in trace {
        scheduler.update_focus(position);
        tokio::time::sleep(step).await;
    }
}

/// Resolve once nothing is queued or in flight.
async fn wait_for_drain(scheduler: &PrefetchScheduler) {
    let mut ticker = tokio::time::interval(DRAIN_POLL);
    loop {
        ticker.tick().await;
        if scheduler.queued() == 0 && scheduler.in_flight() == 0 {
            break;
        }
    }
}
