use std::path::PathBuf;

use clap::Parser;

/// Replay a scroll trace against the prefetch scheduler and report metrics.
///
/// Without `--base-url` every fetch is simulated with a fixed latency, so the
/// scheduler's ordering and concurrency can be inspected offline.
#[derive(Parser, Debug)]
#[command(name = "stackfetch-sim", about = "Simulate adaptive stack prefetching")]
pub struct SimArgs {
    /// Number of items in the synthetic stack
    #[arg(long, default_value = "200", env = "STACKFETCH_SIM_ITEMS")]
    pub items: usize,

    /// Fetch real items relative to this URL instead of simulating them
    #[arg(long, env = "STACKFETCH_BASE_URL")]
    pub base_url: Option<String>,

    /// Use the mobile concurrency tiers
    #[arg(long)]
    pub mobile: bool,

    /// Path to a scheduler config file (TOML)
    #[arg(long, env = "STACKFETCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Simulated per-item fetch latency in milliseconds
    #[arg(long, default_value = "40")]
    pub latency_ms: u64,

    /// Extra per-item latency spread, deterministic by index
    #[arg(long, default_value = "0")]
    pub jitter_ms: u64,

    /// Make every Nth simulated fetch fail
    #[arg(long)]
    pub fail_every: Option<usize>,

    /// Focus positions to replay, comma separated (e.g. 10,40,80)
    #[arg(long, value_delimiter = ',')]
    pub scroll_to: Vec<usize>,

    /// Delay between replayed focus updates
    #[arg(long, default_value = "50")]
    pub scroll_step_ms: u64,

    /// Give up waiting for the stack to drain after this many seconds
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}
