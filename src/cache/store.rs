//! Cache Store Module
//!
//! Sharded entry index. Each shard is a HashMap behind its own mutex; value
//! bytes are kept in the shared arena. Every operation on a key runs under
//! that key's shard lock, which makes same-key operations linearizable.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::cache::entry::current_timestamp_ms;
use crate::cache::{
    CacheEntry, CacheStats, CacheValue, InFlight, StatsCounters, MAX_KEY_LENGTH,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::info::to_datetime;
use crate::models::{CacheInfo, KeyInfo, SmaInfo};

pub(crate) type Shard = HashMap<String, CacheEntry>;

// == Entry Store ==
/// Concurrent key index over the arena.
#[derive(Debug)]
pub struct EntryStore {
    /// Key shards, each with its own lock
    pub(crate) shards: Vec<Mutex<Shard>>,
    /// Backing storage for value bytes
    pub(crate) arena: Arena,
    /// Performance statistics
    pub(crate) counters: StatsCounters,
    /// Per-key tokens for `entry` generators
    pub(crate) in_flight: InFlight,
    /// Maximum wait for a shard lock
    lock_timeout: Duration,
    /// Maximum wait for another caller's generator
    pub(crate) entry_timeout: Duration,
    /// Creation timestamp (Unix milliseconds)
    started_at: u64,
}

impl EntryStore {
    // == Constructor ==
    /// Creates a store from configuration. The configuration is assumed valid.
    pub fn new(config: &Config) -> Self {
        let shards = (0..config.shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();

        Self {
            shards,
            arena: Arena::new(config.capacity, config.segment_size),
            counters: StatsCounters::new(),
            in_flight: InFlight::new(),
            lock_timeout: config.lock_timeout(),
            entry_timeout: config.entry_timeout(),
            started_at: current_timestamp_ms(),
        }
    }

    // == Shard Access ==
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Locks the shard owning `key`, giving up after the lock timeout.
    pub(crate) fn lock_shard(&self, key: &str) -> Result<MutexGuard<'_, Shard>> {
        self.shards[self.shard_index(key)]
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| {
                warn!("Shard lock timed out for key '{}'", key);
                CacheError::Contended(key.to_string())
            })
    }

    /// Rejects keys that are empty or longer than [`MAX_KEY_LENGTH`].
    pub(crate) fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey("key must not be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidKey(format!(
                "key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        Ok(())
    }

    /// Removes an entry from a locked shard and frees its bytes.
    pub(crate) fn remove_entry(&self, shard: &mut Shard, key: &str) -> Option<CacheEntry> {
        let entry = shard.remove(key)?;
        self.arena.free(entry.handle);
        Some(entry)
    }

    // == Store ==
    /// Inserts or replaces a value.
    ///
    /// With `overwrite == false` this is "add": it returns `Ok(false)` and
    /// changes nothing if the key already holds a live entry. The previous
    /// block is freed only after the new entry is installed. When the arena is
    /// full, expired entries are swept once and the write is retried.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - TTL in seconds, 0 = never expires
    /// * `overwrite` - Replace an existing live entry
    pub fn store(&self, key: &str, value: &CacheValue, ttl: u64, overwrite: bool) -> Result<bool> {
        Self::validate_key(key)?;
        let bytes = value.encode();
        let mut swept = false;

        loop {
            {
                let mut shard = self.lock_shard(key)?;
                let now = current_timestamp_ms();
                self.reclaim_if_expired(&mut shard, key, now);

                if !overwrite && shard.contains_key(key) {
                    debug!("Add rejected, key '{}' already exists", key);
                    return Ok(false);
                }

                match self.arena.allocate(bytes.len()) {
                    Ok(handle) => {
                        self.arena.write(handle, &bytes);
                        let entry = CacheEntry::new(handle, value.kind(), ttl, now);
                        if let Some(old) = shard.insert(key.to_string(), entry) {
                            self.arena.free(old.handle);
                        }
                        self.counters.record_insert();
                        return Ok(true);
                    }
                    Err(err) if swept => {
                        warn!("Store failed for key '{}': {}", key, err);
                        return Err(err);
                    }
                    Err(_) => {}
                }
            }

            // Shard lock released before sweeping the other shards
            swept = true;
            self.sweep_expired();
        }
    }

    // == Fetch ==
    /// Retrieves a value by key, recording a hit or a miss.
    ///
    /// Returns `Ok(None)` if the key is absent or expired.
    pub fn fetch(&self, key: &str) -> Result<Option<CacheValue>> {
        self.lookup(key, true)
    }

    pub(crate) fn lookup(&self, key: &str, record: bool) -> Result<Option<CacheValue>> {
        let mut shard = self.lock_shard(key)?;
        let now = current_timestamp_ms();
        self.reclaim_if_expired(&mut shard, key, now);

        let found = match shard.get_mut(key) {
            Some(entry) => {
                let value = self
                    .arena
                    .read(entry.handle)
                    .and_then(|bytes| CacheValue::decode(entry.kind, &bytes));
                if record && value.is_some() {
                    entry.touch(now);
                }
                value
            }
            None => None,
        };

        if record {
            match found {
                Some(_) => self.counters.record_hit(),
                None => self.counters.record_miss(),
            }
        }
        Ok(found)
    }

    // == Delete ==
    /// Removes an entry. Returns true if a live entry was removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut shard = self.lock_shard(key)?;
        let now = current_timestamp_ms();
        if self.reclaim_if_expired(&mut shard, key, now) {
            return Ok(false);
        }
        Ok(self.remove_entry(&mut shard, key).is_some())
    }

    // == Exists ==
    /// Checks for a live entry without counting a hit.
    pub fn exists(&self, key: &str) -> Result<bool> {
        let mut shard = self.lock_shard(key)?;
        let now = current_timestamp_ms();
        self.reclaim_if_expired(&mut shard, key, now);
        Ok(shard.contains_key(key))
    }

    // == Key Info ==
    /// Returns metadata for a live entry without copying its value.
    pub fn key_info(&self, key: &str) -> Result<Option<KeyInfo>> {
        let mut shard = self.lock_shard(key)?;
        let now = current_timestamp_ms();
        self.reclaim_if_expired(&mut shard, key, now);
        Ok(shard.get(key).map(|entry| entry.info(key)))
    }

    // == Clear ==
    /// Removes every entry and releases every arena segment.
    ///
    /// All shard locks are taken in index order, so in-flight operations
    /// complete first and later ones observe an empty cache.
    pub fn clear(&self) {
        let mut guards: Vec<MutexGuard<'_, Shard>> =
            self.shards.iter().map(|shard| shard.lock()).collect();

        let removed: usize = guards.iter().map(|g| g.len()).sum();
        for guard in guards.iter_mut() {
            guard.clear();
        }
        self.arena.reset();
        drop(guards);

        info!("Cache cleared, removed {} entries", removed);
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }

    // == Cache Info ==
    /// Builds a cache-wide report, shard by shard.
    pub fn cache_info(&self, limited: bool) -> CacheInfo {
        let mut num_entries = 0;
        let mut mem_size = 0;
        let mut cache_list = (!limited).then(Vec::new);
        let now = current_timestamp_ms();

        for shard in &self.shards {
            let shard = shard.lock();
            for (key, entry) in shard.iter().filter(|(_, e)| !e.is_expired_at(now)) {
                num_entries += 1;
                mem_size += entry.mem_size(key);
                if let Some(list) = cache_list.as_mut() {
                    list.push(entry.info(key));
                }
            }
        }

        let stats = self.counters.snapshot(num_entries);
        CacheInfo {
            num_slots: self.shards.len(),
            num_hits: stats.hits,
            num_misses: stats.misses,
            num_inserts: stats.inserts,
            num_entries,
            expunges: stats.expunges,
            hit_rate: stats.hit_rate(),
            start_time: to_datetime(self.started_at),
            mem_size,
            memory_type: "arena",
            cache_list,
        }
    }

    // == SMA Info ==
    /// Builds the allocator report.
    pub fn sma_info(&self, limited: bool) -> SmaInfo {
        let segments = self.arena.segments(limited);
        let block_lists = (!limited).then(|| {
            segments
                .iter()
                .map(|s| s.free_blocks.clone().unwrap_or_default())
                .collect()
        });
        let used_bytes: usize = segments.iter().map(|s| s.used_bytes).sum();
        let total_bytes = self.arena.capacity();

        SmaInfo {
            num_seg: segments.len(),
            seg_size: self.arena.segment_size(),
            avail_mem: total_bytes.saturating_sub(used_bytes),
            total_bytes,
            used_bytes,
            segments,
            block_lists,
        }
    }

    // == Length ==
    /// Returns the number of entries held, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn test_store() -> EntryStore {
        EntryStore::new(&Config {
            capacity: 64 * 1024,
            segment_size: 16 * 1024,
            shard_count: 4,
            ..Config::default()
        })
    }

    #[test]
    fn test_store_new() {
        let store = test_store();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.arena.stats().segment_count, 0);
    }

    #[test]
    fn test_store_set_and_get() {
        let store = test_store();

        assert!(store.store("key1", &"value1".into(), 0, true).unwrap());
        let value = store.fetch("key1").unwrap();

        assert_eq!(value, Some(CacheValue::from("value1")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = test_store();
        assert_eq!(store.fetch("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_add_does_not_overwrite() {
        let store = test_store();

        assert!(store.store("k", &CacheValue::Int(1), 0, false).unwrap());
        assert!(!store.store("k", &CacheValue::Int(2), 0, false).unwrap());
        assert_eq!(store.fetch("k").unwrap(), Some(CacheValue::Int(1)));
    }

    #[test]
    fn test_store_overwrite_frees_old_block() {
        let store = test_store();

        store.store("key1", &"a".repeat(100).into(), 0, true).unwrap();
        let used_before = store.arena.stats().used_bytes;
        store.store("key1", &"b".into(), 0, true).unwrap();

        assert_eq!(store.fetch("key1").unwrap(), Some(CacheValue::from("b")));
        assert_eq!(store.len(), 1);
        assert!(store.arena.stats().used_bytes < used_before);
    }

    #[test]
    fn test_store_delete() {
        let store = test_store();

        store.store("key1", &"value1".into(), 0, true).unwrap();
        assert!(store.delete("key1").unwrap());
        assert!(!store.delete("key1").unwrap());

        assert!(store.is_empty());
        assert_eq!(store.arena.stats().used_bytes, 0);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let store = test_store();

        store.store("key1", &"value1".into(), 1, true).unwrap();
        assert!(store.exists("key1").unwrap());

        sleep(Duration::from_millis(1100));

        assert_eq!(store.fetch("key1").unwrap(), None);
        assert!(!store.exists("key1").unwrap());
        assert_eq!(store.stats().expunges, 1);
        assert_eq!(store.arena.stats().used_bytes, 0);
    }

    #[test]
    fn test_add_succeeds_over_expired_entry() {
        let store = test_store();

        store.store("k", &CacheValue::Int(1), 1, true).unwrap();
        sleep(Duration::from_millis(1100));

        assert!(store.store("k", &CacheValue::Int(2), 0, false).unwrap());
        assert_eq!(store.fetch("k").unwrap(), Some(CacheValue::Int(2)));
    }

    #[test]
    fn test_store_stats() {
        let store = test_store();

        store.store("key1", &"value1".into(), 0, true).unwrap();
        store.fetch("key1").unwrap(); // hit
        store.fetch("nonexistent").unwrap(); // miss
        store.exists("key1").unwrap(); // neither

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_key_info() {
        let store = test_store();

        store.store("key1", &CacheValue::Int(3), 30, true).unwrap();
        store.fetch("key1").unwrap();

        let info = store.key_info("key1").unwrap().unwrap();
        assert_eq!(info.hits, 1);
        assert_eq!(info.ttl, 30);
        assert!(info.expires_at.is_some());
        assert!(store.key_info("missing").unwrap().is_none());
    }

    #[test]
    fn test_clear_releases_everything() {
        let store = test_store();

        store.store("a", &"1".into(), 0, true).unwrap();
        store.store("b", &"2".into(), 0, true).unwrap();
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.fetch("a").unwrap(), None);
        assert!(!store.exists("b").unwrap());
        assert_eq!(store.arena.stats().segment_count, 0);

        // Usable again after clear
        store.store("a", &"3".into(), 0, true).unwrap();
        assert_eq!(store.fetch("a").unwrap(), Some(CacheValue::from("3")));
    }

    #[test]
    fn test_store_key_too_long() {
        let store = test_store();
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);

        let result = store.store(&long_key, &"value".into(), 0, true);
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
        assert!(matches!(
            store.store("", &"value".into(), 0, true),
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_store_value_too_large() {
        let store = test_store();
        let large_value = "x".repeat(16 * 1024 + 1);

        let result = store.store("key", &large_value.into(), 0, true);
        assert!(matches!(result, Err(CacheError::AllocationFailed { .. })));
        assert!(!store.exists("key").unwrap());
    }

    #[test]
    fn test_held_shard_lock_reports_contended() {
        let store = EntryStore::new(&Config {
            lock_timeout_ms: 20,
            ..Config::default()
        });
        store.store("busy", &CacheValue::Int(1), 0, true).unwrap();

        let guard = store.lock_shard("busy").unwrap();
        let (write, read) = std::thread::scope(|s| {
            s.spawn(|| {
                (
                    store.store("busy", &CacheValue::Int(2), 0, true),
                    store.fetch("busy"),
                )
            })
            .join()
            .unwrap()
        });
        drop(guard);

        let err = write.unwrap_err();
        assert!(matches!(err, CacheError::Contended(ref key) if key == "busy"));
        assert!(err.is_retryable());
        assert!(matches!(read, Err(CacheError::Contended(_))));

        // Nothing changed, and the key is reachable once the lock is free
        assert_eq!(store.fetch("busy").unwrap(), Some(CacheValue::Int(1)));
    }

    #[test]
    fn test_cache_info_lists_entries_unless_limited() {
        let store = test_store();
        store.store("a", &"1".into(), 0, true).unwrap();
        store.store("b", &CacheValue::Int(2), 0, true).unwrap();

        let full = store.cache_info(false);
        assert_eq!(full.num_entries, 2);
        assert_eq!(full.num_slots, 4);
        assert_eq!(full.cache_list.as_ref().map(Vec::len), Some(2));
        assert_eq!(full.mem_size, 8 + 1 + 8 + 1);

        let limited = store.cache_info(true);
        assert!(limited.cache_list.is_none());
        assert_eq!(limited.num_entries, 2);
    }

    #[test]
    fn test_sma_info() {
        let store = test_store();
        store.store("a", &"1".into(), 0, true).unwrap();

        let info = store.sma_info(false);
        assert_eq!(info.num_seg, 1);
        assert_eq!(info.seg_size, 16 * 1024);
        assert_eq!(info.total_bytes, 64 * 1024);
        assert_eq!(info.used_bytes, 8);
        assert_eq!(info.avail_mem, 64 * 1024 - 8);
        assert_eq!(info.block_lists.as_ref().map(Vec::len), Some(1));

        assert!(store.sma_info(true).block_lists.is_none());
    }
}
