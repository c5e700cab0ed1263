//! Introspection DTOs
//!
//! Defines the structure of the cache, key and allocator reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::ValueKind;

/// Converts an internal millisecond timestamp for reporting.
pub fn to_datetime(timestamp_ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms as i64).unwrap_or_default()
}

/// Metadata for a single live entry, without its value.
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    /// The entry key
    pub key: String,
    /// Type tag of the stored value
    pub kind: ValueKind,
    /// Number of successful fetches
    pub hits: u64,
    /// Last fetch (or creation) time
    pub access_time: DateTime<Utc>,
    /// Last modification time
    pub modified_time: DateTime<Utc>,
    /// Creation time
    pub creation_time: DateTime<Utc>,
    /// TTL in seconds, 0 = never expires
    pub ttl: u64,
    /// Absolute deadline, None = never expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Arena bytes reserved for the value plus the key length
    pub mem_size: usize,
}

/// Cache-wide statistics, optionally with the list of live entries.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    /// Number of index shards
    pub num_slots: usize,
    pub num_hits: u64,
    pub num_misses: u64,
    pub num_inserts: u64,
    pub num_entries: usize,
    /// Entries reclaimed because their TTL elapsed
    pub expunges: u64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    pub start_time: DateTime<Utc>,
    /// Sum of `mem_size` over live entries
    pub mem_size: usize,
    pub memory_type: &'static str,
    /// Live entries; omitted for limited reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_list: Option<Vec<KeyInfo>>,
}

/// A free range inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreeBlock {
    pub offset: usize,
    pub size: usize,
}

/// Allocator view of one segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentInfo {
    pub id: u32,
    pub size: usize,
    pub used_bytes: usize,
    pub free_bytes: usize,
    pub free_block_count: usize,
    pub largest_free_block: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_blocks: Option<Vec<FreeBlock>>,
}

/// Allocator-wide report, independent of per-key metadata.
#[derive(Debug, Clone, Serialize)]
pub struct SmaInfo {
    /// Segments currently allocated
    pub num_seg: usize,
    pub seg_size: usize,
    /// Bytes still obtainable, including segments not yet created
    pub avail_mem: usize,
    pub total_bytes: usize,
    pub used_bytes: usize,
    pub segments: Vec<SegmentInfo>,
    /// Free blocks per segment; omitted for limited reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_lists: Option<Vec<Vec<FreeBlock>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_datetime() {
        let dt = to_datetime(1_000);
        assert_eq!(dt.timestamp(), 1);
    }

    #[test]
    fn test_limited_reports_skip_lists() {
        let info = SmaInfo {
            num_seg: 0,
            seg_size: 64,
            avail_mem: 128,
            total_bytes: 128,
            used_bytes: 0,
            segments: Vec::new(),
            block_lists: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("block_lists").is_none());
        assert_eq!(json["avail_mem"], 128);
    }
}
