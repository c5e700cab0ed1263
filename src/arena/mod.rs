//! Arena Module
//!
//! Fixed-capacity byte arena carved into segments. Entry bytes live here;
//! the entry index only holds [`Handle`]s pointing into it.

mod allocator;
mod segment;

pub use allocator::{Arena, ArenaStats, Handle};
pub use segment::{block_size, Segment, ALIGNMENT};
