//! HTTP implementation of the [`FetchAndCache`](stackfetch_core::FetchAndCache)
//! primitive: downloads stack items relative to a base URL and keeps their
//! bytes in a bounded in-memory LRU cache.

pub mod cache;

pub use cache::{CacheStats, HttpStackCache};
