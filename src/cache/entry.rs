//! Cache Entry Module
//!
//! Defines the metadata kept for each entry. The value bytes live in the
//! arena and are reached through the entry's handle.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::arena::Handle;
use crate::cache::ValueKind;
use crate::models::info::{to_datetime, KeyInfo};

// == Cache Entry ==
/// Metadata for a single cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Location of the value bytes
    pub handle: Handle,
    /// Type tag of the stored value
    pub kind: ValueKind,
    /// TTL in seconds, 0 = never expires
    pub ttl: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last modification timestamp (Unix milliseconds)
    pub modified_at: u64,
    /// Last access timestamp (Unix milliseconds)
    pub accessed_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Successful fetches
    pub hits: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates entry metadata for a freshly written value.
    ///
    /// # Arguments
    /// * `handle` - Arena block holding the encoded value
    /// * `kind` - Type tag of the value
    /// * `ttl` - TTL in seconds, 0 means the entry never expires
    /// * `now` - Creation timestamp in Unix milliseconds
    pub fn new(handle: Handle, kind: ValueKind, ttl: u64, now: u64) -> Self {
        let expires_at = (ttl > 0).then(|| now.saturating_add(ttl.saturating_mul(1000)));

        Self {
            handle,
            kind,
            ttl,
            created_at: now,
            modified_at: now,
            accessed_at: now,
            expires_at,
            hits: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now` (Unix milliseconds).
    ///
    /// An entry is expired once the clock reaches its deadline.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Bookkeeping ==
    /// Records a successful fetch.
    pub fn touch(&mut self, now: u64) {
        self.hits += 1;
        self.accessed_at = now;
    }

    /// Records an in-place value change.
    pub fn modified(&mut self, now: u64) {
        self.modified_at = now;
    }

    /// Arena bytes reserved for the value plus the key.
    pub fn mem_size(&self, key: &str) -> usize {
        self.handle.block() + key.len()
    }

    /// Builds the public metadata report for this entry.
    pub fn info(&self, key: &str) -> KeyInfo {
        KeyInfo {
            key: key.to_string(),
            kind: self.kind,
            hits: self.hits,
            access_time: to_datetime(self.accessed_at),
            modified_time: to_datetime(self.modified_at),
            creation_time: to_datetime(self.created_at),
            ttl: self.ttl,
            expires_at: self.expires_at.map(to_datetime),
            mem_size: self.mem_size(key),
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
