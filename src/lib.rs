//! Mini APC - A shared in-memory key/value cache engine
//!
//! Provides APCu-style store/fetch/delete, atomic counters, compare-and-swap,
//! fetch-or-generate and per-key TTL expiry over a fixed-capacity arena.

pub mod arena;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod tasks;

pub use cache::{CacheValue, ValueKind};
pub use config::Config;
pub use engine::Cache;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
