//! Prefetch scheduler runner -- owns the queue, timers and in-flight fetches.
//!
//! Split into focused submodules:
//! - `core`: scheduler handle, builder, shared state and read accessors
//! - `dispatch`: admission loop, fetch spawning and completion handling
//! - `focus`: focus throttling and idle detection timers
//! - `lifecycle`: start / pause / resume / destroy and the metrics sampler

mod core;
mod dispatch;
mod focus;
mod lifecycle;

pub use self::core::{ItemLoadedCallback, PrefetchScheduler, SchedulerBuilder};
