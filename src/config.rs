//! Configuration Module
//!
//! Handles loading and managing engine configuration from environment variables.

use std::env;
use std::time::Duration;

/// Cache engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Total bytes the arena may hand out across all segments
    pub capacity: usize,
    /// Size in bytes of each arena segment
    pub segment_size: usize,
    /// Number of hash shards in the entry index
    pub shard_count: usize,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Maximum wait for a shard lock in milliseconds
    pub lock_timeout_ms: u64,
    /// Maximum wait for another caller's `entry` generator in milliseconds
    pub entry_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Arena capacity in bytes (default: 32 MiB)
    /// - `SEGMENT_SIZE` - Segment size in bytes (default: 4 MiB)
    /// - `SHARD_COUNT` - Number of index shards (default: 16)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `LOCK_TIMEOUT_MS` - Shard lock wait in milliseconds (default: 5000)
    /// - `ENTRY_TIMEOUT_MS` - Generator wait in milliseconds (default: 30000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env_or("CACHE_CAPACITY", defaults.capacity),
            segment_size: env_or("SEGMENT_SIZE", defaults.segment_size),
            shard_count: env_or("SHARD_COUNT", defaults.shard_count),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            lock_timeout_ms: env_or("LOCK_TIMEOUT_MS", defaults.lock_timeout_ms),
            entry_timeout_ms: env_or("ENTRY_TIMEOUT_MS", defaults.entry_timeout_ms),
        }
    }

    /// Shard lock wait as a Duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Generator wait as a Duration.
    pub fn entry_timeout(&self) -> Duration {
        Duration::from_millis(self.entry_timeout_ms)
    }

    /// Maximum number of segments the arena may grow to.
    pub fn max_segments(&self) -> usize {
        if self.segment_size == 0 {
            0
        } else {
            self.capacity / self.segment_size
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 32 * 1024 * 1024,
            segment_size: 4 * 1024 * 1024,
            shard_count: 16,
            cleanup_interval: 1,
            lock_timeout_ms: 5_000,
            entry_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.capacity, 32 * 1024 * 1024);
        assert_eq!(config.segment_size, 4 * 1024 * 1024);
        assert_eq!(config.shard_count, 16);
        assert_eq!(config.cleanup_interval, 1);
        assert_eq!(config.max_segments(), 8);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("CACHE_CAPACITY");
        env::remove_var("SEGMENT_SIZE");
        env::remove_var("SHARD_COUNT");
        env::remove_var("CLEANUP_INTERVAL");
        env::remove_var("LOCK_TIMEOUT_MS");
        env::remove_var("ENTRY_TIMEOUT_MS");

        let config = Config::from_env();
        assert_eq!(config.capacity, 32 * 1024 * 1024);
        assert_eq!(config.shard_count, 16);
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.entry_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_max_segments_zero_segment_size() {
        let config = Config {
            segment_size: 0,
            ..Config::default()
        };
        assert_eq!(config.max_segments(), 0);
    }
}
