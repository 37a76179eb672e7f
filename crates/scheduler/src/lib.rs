//! Adaptive progressive prefetch scheduler for ordered image stacks.
//!
//! The [`PrefetchScheduler`] keeps a priority queue over every item of a
//! stack, scores items against the user's moving focus, and keeps a bounded
//! number of fetches in flight through an injected
//! [`FetchAndCache`](stackfetch_core::FetchAndCache) primitive. Concurrency
//! and priority policy adapt to whether the user is scrolling or idle.

pub mod config;
pub mod error;
pub mod metrics;
pub mod priority;
pub mod queue;
pub mod runner;
pub mod types;

pub use config::PrefetchConfig;
pub use error::{ConfigError, SchedulerError};
pub use metrics::SchedulerMetrics;
pub use priority::{PriorityPolicy, calculate_priority};
pub use queue::WorkQueue;
pub use runner::{ItemLoadedCallback, PrefetchScheduler, SchedulerBuilder};
pub use types::{ConcurrencyTiers, Lifecycle, ScrollMode, TierTable};
