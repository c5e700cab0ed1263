//! Cache Module
//!
//! Sharded entry index over the arena, with TTL expiry, atomic integer
//! operations and generator-backed population.

mod atomic;
mod entry;
mod expiry;
mod generate;
mod stats;
mod store;
mod value;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub(crate) use generate::InFlight;
pub use stats::{CacheStats, StatsCounters};
pub use store::EntryStore;
pub use value::{CacheValue, ValueKind};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
