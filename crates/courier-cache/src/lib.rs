//! # Courier Cache
//!
//! In-memory TTL cache backing the caching middleware.
//!
//! - Per-entry expiration; expired entries are invisible to readers
//! - `parking_lot` reader/writer lock around the map
//! - Optional background sweeper registered on [`courier_tasks::BackgroundTasks`]
//!
//! The cache is an owned value. Build one per bot and thread it through the
//! middleware that needs it.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cache;

pub use cache::{CacheConfig, CacheStats, TtlCache};
