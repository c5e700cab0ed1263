//! Expiry Module
//!
//! Lazy and active reclamation of entries whose TTL has elapsed.
//!
//! Lazy: every operation that touches a key first drops it if expired.
//! Active: [`EntryStore::sweep_expired`] walks the shards one at a time,
//! doing constant work per visited entry.

use tracing::debug;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::store::{EntryStore, Shard};

impl EntryStore {
    // == Lazy Reclamation ==
    /// Drops `key` from a locked shard if its deadline has passed.
    ///
    /// Returns true if an expired entry was reclaimed.
    pub(crate) fn reclaim_if_expired(&self, shard: &mut Shard, key: &str, now: u64) -> bool {
        let expired = shard.get(key).map_or(false, |e| e.is_expired_at(now));
        if expired {
            self.remove_entry(shard, key);
            self.counters.record_expunges(1);
            debug!("Reclaimed expired key '{}'", key);
        }
        expired
    }

    // == Active Sweep ==
    /// Removes all expired entries from the cache.
    ///
    /// Holds one shard lock at a time. Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let mut removed = 0;

        for shard in &self.shards {
            let mut shard = shard.lock();
            let now = current_timestamp_ms();
            let before = shard.len();
            shard.retain(|_, entry| {
                if entry.is_expired_at(now) {
                    self.arena.free(entry.handle);
                    false
                } else {
                    true
                }
            });
            removed += before - shard.len();
        }

        if removed > 0 {
            self.counters.record_expunges(removed as u64);
        }
        removed
    }
}
