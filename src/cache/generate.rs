//! Entry-or-Generate Module
//!
//! Fetch a key, or compute it with a caller-supplied generator and store the
//! result. Concurrent misses on the same key are collapsed: the first caller
//! takes the key's in-flight token and runs the generator, the rest wait on
//! the token and then read the stored value.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::cache::{CacheValue, EntryStore};
use crate::error::{CacheError, Result};

// == In-Flight Registry ==
/// Per-key tokens held while a generator runs.
#[derive(Debug, Default)]
pub struct InFlight {
    tokens: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a reference to the token for `key`, creating it if needed.
    pub fn lease<'a>(&'a self, key: &'a str) -> Lease<'a> {
        let token = self
            .tokens
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Lease {
            registry: self,
            key,
            token,
        }
    }

    /// Number of keys with an outstanding lease.
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }
}

// == Lease ==
/// A reference to one key's token. The registry entry is dropped with the
/// last lease.
#[derive(Debug)]
pub struct Lease<'a> {
    registry: &'a InFlight,
    key: &'a str,
    token: Arc<Mutex<()>>,
}

impl Lease<'_> {
    /// Waits for the token, giving up after `timeout`.
    pub fn acquire(&self, timeout: Duration) -> Option<MutexGuard<'_, ()>> {
        self.token.try_lock_for(timeout)
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let mut tokens = self.registry.tokens.lock();
        // One reference in the map, one here: nobody else is waiting
        if Arc::strong_count(&self.token) == 2 {
            tokens.remove(self.key);
        }
    }
}

impl EntryStore {
    // == Entry ==
    /// Returns the cached value for `key`, generating and storing it on a miss.
    ///
    /// The generator receives the key. It runs without any shard lock held,
    /// so it may itself use the cache (other keys). If it fails, nothing is
    /// stored and the error is returned as [`CacheError::GeneratorFailed`].
    ///
    /// # Arguments
    /// * `key` - The key to read or populate
    /// * `ttl` - TTL in seconds for a generated value, 0 = never expires
    /// * `generator` - Computes the value on a miss
    pub fn entry<F, V, E>(&self, key: &str, ttl: u64, generator: F) -> Result<CacheValue>
    where
        F: FnOnce(&str) -> std::result::Result<V, E>,
        V: Into<CacheValue>,
        E: Display,
    {
        Self::validate_key(key)?;
        if let Some(value) = self.fetch(key)? {
            return Ok(value);
        }

        let lease = self.in_flight.lease(key);
        let _held = lease.acquire(self.entry_timeout).ok_or_else(|| {
            warn!("Timed out waiting for generator of key '{}'", key);
            CacheError::Contended(key.to_string())
        })?;

        // Another caller may have generated the value while we waited
        if let Some(value) = self.lookup(key, false)? {
            return Ok(value);
        }

        debug!(
            "Generating value for key '{}' ({} keys in flight)",
            key,
            self.in_flight.len()
        );
        let value: CacheValue = generator(key)
            .map_err(|e| CacheError::GeneratorFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?
            .into();

        self.store(key, &value, ttl, true)?;
        Ok(value)
    }
}
