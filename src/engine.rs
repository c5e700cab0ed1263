//! Cache Engine
//!
//! [`Cache`] is the public handle over the entry store. It is cheap to clone;
//! every clone refers to the same shared state.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::{CacheValue, EntryStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{CacheInfo, KeyInfo, SmaInfo};
use crate::tasks::spawn_cleanup_task;

// == Cache ==
/// Shared in-memory cache engine.
#[derive(Clone, Debug)]
pub struct Cache {
    store: Arc<EntryStore>,
    config: Arc<Config>,
}

impl Cache {
    // == Constructor ==
    /// Creates a cache engine from configuration.
    ///
    /// Fails with [`CacheError::EngineUnavailable`] if the configuration
    /// cannot produce a working arena or index.
    pub fn new(config: Config) -> Result<Self> {
        Self::validate(&config)?;
        let store = EntryStore::new(&config);
        info!(
            "Cache engine initialized: capacity={} segment_size={} shards={}",
            config.capacity, config.segment_size, config.shard_count
        );
        Ok(Self {
            store: Arc::new(store),
            config: Arc::new(config),
        })
    }

    /// Creates a cache engine with configuration from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env())
    }

    fn validate(config: &Config) -> Result<()> {
        if config.segment_size == 0 {
            return Err(CacheError::EngineUnavailable(
                "segment size must be greater than zero".to_string(),
            ));
        }
        if config.capacity < config.segment_size {
            return Err(CacheError::EngineUnavailable(format!(
                "capacity {} is smaller than one segment of {} bytes",
                config.capacity, config.segment_size
            )));
        }
        if config.shard_count == 0 {
            return Err(CacheError::EngineUnavailable(
                "shard count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Reports whether the engine is usable. A constructed `Cache` always is.
    pub fn enabled(&self) -> bool {
        true
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Writes ==
    /// Stores a value only if the key does not already hold a live entry.
    pub fn add(&self, key: &str, value: impl Into<CacheValue>, ttl: u64) -> Result<bool> {
        self.store.store(key, &value.into(), ttl, false)
    }

    /// Stores a value, replacing any existing entry.
    pub fn store(&self, key: &str, value: impl Into<CacheValue>, ttl: u64) -> Result<bool> {
        self.store.store(key, &value.into(), ttl, true)
    }

    /// Stores several values. Returns the keys that were not stored.
    ///
    /// Allocation failures are reported per key; a contended shard or an
    /// invalid key aborts the batch.
    pub fn store_many<K, V, I>(&self, entries: I, ttl: u64) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CacheValue>,
    {
        self.write_many(entries, ttl, true)
    }

    /// Adds several values. Returns the keys that already existed or did not fit.
    pub fn add_many<K, V, I>(&self, entries: I, ttl: u64) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CacheValue>,
    {
        self.write_many(entries, ttl, false)
    }

    fn write_many<K, V, I>(&self, entries: I, ttl: u64, overwrite: bool) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CacheValue>,
    {
        let mut rejected = Vec::new();
        for (key, value) in entries {
            let key = key.as_ref();
            match self.store.store(key, &value.into(), ttl, overwrite) {
                Ok(true) => {}
                Ok(false) | Err(CacheError::AllocationFailed { .. }) => {
                    rejected.push(key.to_string())
                }
                Err(err) => return Err(err),
            }
        }
        Ok(rejected)
    }

    // == Reads ==
    /// Fetches a value; `Ok(None)` means absent or expired.
    pub fn fetch(&self, key: &str) -> Result<Option<CacheValue>> {
        self.store.fetch(key)
    }

    /// Fetches several keys. Only found keys appear in the result.
    pub fn fetch_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<HashMap<String, CacheValue>> {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(value) = self.store.fetch(key.as_ref())? {
                found.insert(key.as_ref().to_string(), value);
            }
        }
        Ok(found)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.store.exists(key)
    }

    /// Checks several keys, reporting each one.
    pub fn exists_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<HashMap<String, bool>> {
        let mut report = HashMap::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            report.insert(key.to_string(), self.store.exists(key)?);
        }
        Ok(report)
    }

    // == Deletes ==
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.store.delete(key)
    }

    /// Deletes several keys, reporting per key whether a live entry was removed.
    pub fn delete_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<HashMap<String, bool>> {
        let mut report = HashMap::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            report.insert(key.to_string(), self.store.delete(key)?);
        }
        Ok(report)
    }

    // == Atomic Ops ==
    /// Adds `step`, creating the key as `step` with `ttl` if missing.
    pub fn increment(&self, key: &str, step: i64, ttl: u64) -> Result<i64> {
        self.store.increment(key, step, ttl)
    }

    /// Subtracts `step`, creating the key as `-step` with `ttl` if missing.
    pub fn decrement(&self, key: &str, step: i64, ttl: u64) -> Result<i64> {
        self.store.decrement(key, step, ttl)
    }

    pub fn compare_and_swap(&self, key: &str, old: i64, new: i64) -> Result<bool> {
        self.store.compare_and_swap(key, old, new)
    }

    // == Entry ==
    /// Fetches `key`, or generates, stores and returns it. At most one
    /// generator runs per key at a time; concurrent callers wait for it.
    pub fn entry<F, V, E>(&self, key: &str, ttl: u64, generator: F) -> Result<CacheValue>
    where
        F: FnOnce(&str) -> std::result::Result<V, E>,
        V: Into<CacheValue>,
        E: Display,
    {
        self.store.entry(key, ttl, generator)
    }

    // == Maintenance ==
    /// Removes every entry and releases the arena.
    pub fn clear_cache(&self) -> bool {
        self.store.clear();
        true
    }

    /// Runs one expiry sweep now. Returns the number of entries reclaimed.
    pub fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }

    /// Starts the periodic expiry sweep on the current tokio runtime.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_cleanup_task(Arc::clone(&self.store), self.config.cleanup_interval)
    }

    // == Introspection ==
    pub fn cache_info(&self, limited: bool) -> CacheInfo {
        self.store.cache_info(limited)
    }

    pub fn key_info(&self, key: &str) -> Result<Option<KeyInfo>> {
        self.store.key_info(key)
    }

    pub fn sma_info(&self, limited: bool) -> SmaInfo {
        self.store.sma_info(limited)
    }
}
