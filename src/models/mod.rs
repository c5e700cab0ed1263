//! Report models for cache introspection
//!
//! Point-in-time snapshots returned by `cache_info`, `key_info` and
//! `sma_info`. All of them serialize with serde.

pub mod info;

// Re-export commonly used types
pub use info::{CacheInfo, FreeBlock, KeyInfo, SegmentInfo, SmaInfo};
