//! Atomic Numeric Operations
//!
//! Increment, decrement and compare-and-swap on integer entries. Each runs
//! entirely under the key's shard lock, so all numeric mutations of one key
//! are serialized. The new integer is written in place into the entry's
//! existing arena block; TTL and creation time are kept.
//!
//! Arithmetic is `i64` and wraps on overflow.

use tracing::{debug, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheValue, EntryStore, ValueKind};
use crate::error::{CacheError, Result};

impl EntryStore {
    // == Increment ==
    /// Adds `step` to an integer entry and returns the new value.
    ///
    /// A missing key is created as `step` with the given TTL. Non-integer
    /// entries fail with [`CacheError::TypeMismatch`].
    pub fn increment(&self, key: &str, step: i64, ttl: u64) -> Result<i64> {
        self.update_int(key, ttl, |current| current.wrapping_add(step))
    }

    // == Decrement ==
    /// Subtracts `step`; a missing key is created as `-step`.
    pub fn decrement(&self, key: &str, step: i64, ttl: u64) -> Result<i64> {
        self.update_int(key, ttl, |current| current.wrapping_sub(step))
    }

    // == Compare And Swap ==
    /// Replaces the stored integer with `new` only if it currently equals `old`.
    ///
    /// Returns `Ok(false)` if the key is missing or holds another integer.
    pub fn compare_and_swap(&self, key: &str, old: i64, new: i64) -> Result<bool> {
        let mut shard = self.lock_shard(key)?;
        let now = current_timestamp_ms();
        self.reclaim_if_expired(&mut shard, key, now);

        let Some(entry) = shard.get_mut(key) else {
            return Ok(false);
        };
        if self.read_int(key, entry)? != old {
            return Ok(false);
        }

        self.arena.write(entry.handle, &new.to_le_bytes());
        entry.modified(now);
        debug!("CAS on '{}': {} -> {}", key, old, new);
        Ok(true)
    }

    /// Applies `apply` to the current integer (0 if missing) under the shard lock.
    ///
    /// Creating a missing key needs a new block; when the arena is full,
    /// expired entries are swept once and the key is looked up again.
    fn update_int<F>(&self, key: &str, ttl: u64, apply: F) -> Result<i64>
    where
        F: Fn(i64) -> i64,
    {
        Self::validate_key(key)?;
        let mut swept = false;

        loop {
            {
                let mut shard = self.lock_shard(key)?;
                let now = current_timestamp_ms();
                self.reclaim_if_expired(&mut shard, key, now);

                if let Some(entry) = shard.get_mut(key) {
                    let next = apply(self.read_int(key, entry)?);
                    self.arena.write(entry.handle, &next.to_le_bytes());
                    entry.modified(now);
                    return Ok(next);
                }

                match self.arena.allocate(std::mem::size_of::<i64>()) {
                    Ok(handle) => {
                        let next = apply(0);
                        self.arena.write(handle, &next.to_le_bytes());
                        shard.insert(
                            key.to_string(),
                            CacheEntry::new(handle, ValueKind::Int, ttl, now),
                        );
                        self.counters.record_insert();
                        debug!("Created counter '{}' at {}", key, next);
                        return Ok(next);
                    }
                    Err(err) if swept => {
                        warn!("Counter create failed for key '{}': {}", key, err);
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

    /// Reads the integer behind an entry, failing if it holds another kind.
    fn read_int(&self, key: &str, entry: &CacheEntry) -> Result<i64> {
        if entry.kind != ValueKind::Int {
            return Err(CacheError::TypeMismatch {
                key: key.to_string(),
                found: entry.kind.as_str(),
            });
        }
        self.arena
            .read(entry.handle)
            .and_then(|bytes| CacheValue::decode(ValueKind::Int, &bytes))
            .and_then(|value| value.as_int())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }
}
