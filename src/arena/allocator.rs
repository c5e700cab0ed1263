//! Arena allocator
//!
//! Hands out blocks from a growing table of fixed-size segments. The table
//! grows one segment at a time up to `capacity / segment_size` segments and
//! is only emptied by [`Arena::reset`].

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::segment::{block_size, Segment};
use crate::error::{CacheError, Result};
use crate::models::SegmentInfo;

// == Handle ==
/// Location of an allocated block inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    segment: u32,
    offset: usize,
    /// Bytes written by the caller
    len: usize,
    /// Rounded block size actually reserved
    block: usize,
}

impl Handle {
    pub fn segment(&self) -> u32 {
        self.segment
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reserved bytes, including alignment padding.
    pub fn block(&self) -> usize {
        self.block
    }
}

// == Arena Stats ==
/// Aggregate allocator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub used_bytes: usize,
    pub free_bytes: usize,
    pub segment_count: usize,
    pub capacity: usize,
}

// == Arena ==
/// Segmented byte arena.
///
/// Each segment sits behind its own mutex so blocks in different segments
/// can be allocated and freed in parallel. The segment table lock is taken
/// for writing only to grow or reset.
#[derive(Debug)]
pub struct Arena {
    segment_size: usize,
    max_segments: usize,
    segments: RwLock<Vec<Mutex<Segment>>>,
}

impl Arena {
    // == Constructor ==
    /// Creates an empty arena. No memory is reserved until the first allocation.
    pub fn new(capacity: usize, segment_size: usize) -> Self {
        let max_segments = if segment_size == 0 {
            0
        } else {
            capacity / segment_size
        };
        info!(
            "Initializing arena: segment_size={} max_segments={}",
            segment_size, max_segments
        );
        Self {
            segment_size,
            max_segments,
            segments: RwLock::new(Vec::new()),
        }
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Total bytes the arena may ever hand out.
    pub fn capacity(&self) -> usize {
        self.segment_size * self.max_segments
    }

    // == Allocate ==
    /// Reserves room for `size` bytes.
    ///
    /// Tries existing segments first, then grows the table by one segment.
    /// Fails with [`CacheError::AllocationFailed`] when the request is larger
    /// than a segment or the table is already at its maximum.
    pub fn allocate(&self, size: usize) -> Result<Handle> {
        let block = block_size(size);
        if block > self.segment_size {
            return Err(CacheError::AllocationFailed {
                requested: size,
                available: self.stats().free_bytes,
            });
        }

        {
            let segments = self.segments.read();
            for segment in segments.iter() {
                let mut segment = segment.lock();
                if let Some(offset) = segment.allocate(block) {
                    return Ok(Self::handle(&segment, offset, size, block));
                }
            }
        }

        // Slow path: exclusive access to the table
        let mut segments = self.segments.write();
        for segment in segments.iter_mut() {
            let segment = segment.get_mut();
            if let Some(offset) = segment.allocate(block) {
                return Ok(Self::handle(segment, offset, size, block));
            }
        }

        if segments.len() >= self.max_segments {
            let used: usize = segments.iter_mut().map(|s| s.get_mut().used()).sum();
            let available = self.capacity().saturating_sub(used);
            warn!(
                "Arena exhausted: requested={} available={} segments={}",
                size,
                available,
                segments.len()
            );
            return Err(CacheError::AllocationFailed {
                requested: size,
                available,
            });
        }

        let mut segment = Segment::new(segments.len() as u32, self.segment_size);
        let offset = segment
            .allocate(block)
            .ok_or(CacheError::AllocationFailed {
                requested: size,
                available: segment.free_bytes(),
            })?;
        let handle = Self::handle(&segment, offset, size, block);
        segments.push(Mutex::new(segment));
        info!(
            "Arena grew to {}/{} segments",
            segments.len(),
            self.max_segments
        );
        Ok(handle)
    }

    fn handle(segment: &Segment, offset: usize, len: usize, block: usize) -> Handle {
        Handle {
            segment: segment.id(),
            offset,
            len,
            block,
        }
    }

    // == Free ==
    /// Returns a block to its segment.
    pub fn free(&self, handle: Handle) {
        let segments = self.segments.read();
        match segments.get(handle.segment as usize) {
            Some(segment) => segment.lock().free(handle.offset, handle.block),
            None => debug!("Ignoring free of stale handle {:?}", handle),
        }
    }

    // == Read ==
    /// Copies the bytes behind a handle.
    pub fn read(&self, handle: Handle) -> Option<Vec<u8>> {
        let segments = self.segments.read();
        let segment = segments.get(handle.segment as usize)?;
        let bytes = segment.lock().read(handle.offset, handle.len).to_vec();
        Some(bytes)
    }

    // == Write ==
    /// Writes into a reserved block. `bytes` must fit in the block.
    ///
    /// Returns false if the handle no longer points at a live segment or the
    /// bytes are too large for the block.
    pub fn write(&self, handle: Handle, bytes: &[u8]) -> bool {
        if bytes.len() > handle.block {
            return false;
        }
        let segments = self.segments.read();
        match segments.get(handle.segment as usize) {
            Some(segment) => {
                segment.lock().write(handle.offset, bytes);
                true
            }
            None => false,
        }
    }

    // == Stats ==
    pub fn stats(&self) -> ArenaStats {
        let segments = self.segments.read();
        let used_bytes: usize = segments.iter().map(|s| s.lock().used()).sum();
        let capacity = self.capacity();
        ArenaStats {
            used_bytes,
            free_bytes: capacity.saturating_sub(used_bytes),
            segment_count: segments.len(),
            capacity,
        }
    }

    /// Per-segment view; free-block lists are omitted when `limited`.
    pub fn segments(&self, limited: bool) -> Vec<SegmentInfo> {
        let segments = self.segments.read();
        segments.iter().map(|s| s.lock().snapshot(limited)).collect()
    }

    // == Reset ==
    /// Drops every segment. All outstanding handles become stale.
    pub fn reset(&self) {
        let mut segments = self.segments.write();
        let released = segments.len();
        segments.clear();
        debug!("Arena reset, released {} segments", released);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_starts_empty() {
        let arena = Arena::new(1024, 256);
        let stats = arena.stats();
        assert_eq!(stats.segment_count, 0);
        assert_eq!(stats.used_bytes, 0);
        assert_eq!(stats.free_bytes, 1024);
        assert_eq!(stats.capacity, 1024);
    }

    #[test]
    fn test_allocate_write_read() {
        let arena = Arena::new(1024, 256);
        let handle = arena.allocate(5).unwrap();

        assert_eq!(handle.len(), 5);
        assert_eq!(handle.block(), 8);
        assert!(arena.write(handle, b"hello"));
        assert_eq!(arena.read(handle).unwrap(), b"hello");
    }

    #[test]
    fn test_allocations_do_not_overlap() {
        let arena = Arena::new(1024, 256);
        let a = arena.allocate(24).unwrap();
        let b = arena.allocate(24).unwrap();

        assert_eq!(a.segment(), b.segment());
        assert!(a.offset() + a.block() <= b.offset() || b.offset() + b.block() <= a.offset());

        arena.write(a, &[1; 24]);
        arena.write(b, &[2; 24]);
        assert_eq!(arena.read(a).unwrap(), vec![1; 24]);
        assert_eq!(arena.read(b).unwrap(), vec![2; 24]);
    }

    #[test]
    fn test_grows_segments_on_demand() {
        let arena = Arena::new(512, 128);
        arena.allocate(128).unwrap();
        arena.allocate(128).unwrap();

        assert_eq!(arena.stats().segment_count, 2);
        assert_eq!(arena.stats().used_bytes, 256);
    }

    #[test]
    fn test_exhaustion_fails_without_growing_past_capacity() {
        let arena = Arena::new(256, 128);
        arena.allocate(128).unwrap();
        arena.allocate(128).unwrap();

        let result = arena.allocate(8);
        assert!(matches!(
            result,
            Err(CacheError::AllocationFailed { available: 0, .. })
        ));
        assert_eq!(arena.stats().segment_count, 2);
    }

    #[test]
    fn test_oversized_request_fails() {
        let arena = Arena::new(1024, 128);
        assert!(matches!(
            arena.allocate(129),
            Err(CacheError::AllocationFailed { requested: 129, .. })
        ));
    }

    #[test]
    fn test_free_makes_room_again() {
        let arena = Arena::new(128, 128);
        let handle = arena.allocate(128).unwrap();
        assert!(arena.allocate(8).is_err());

        arena.free(handle);
        assert!(arena.allocate(128).is_ok());
    }

    #[test]
    fn test_write_rejects_oversized_bytes() {
        let arena = Arena::new(128, 128);
        let handle = arena.allocate(8).unwrap();
        assert!(!arena.write(handle, &[0; 9]));
    }

    #[test]
    fn test_reset_releases_segments() {
        let arena = Arena::new(512, 128);
        let handle = arena.allocate(64).unwrap();
        arena.reset();

        assert_eq!(arena.stats().segment_count, 0);
        assert!(arena.read(handle).is_none());
        // Stale frees are ignored
        arena.free(handle);
        assert_eq!(arena.stats().used_bytes, 0);
    }

    #[test]
    fn test_segment_views() {
        let arena = Arena::new(512, 128);
        arena.allocate(16).unwrap();

        let limited = arena.segments(true);
        assert_eq!(limited.len(), 1);
        assert!(limited[0].free_blocks.is_none());
        assert_eq!(limited[0].used_bytes, 16);

        let full = arena.segments(false);
        let blocks = full[0].free_blocks.as_ref().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, 16);
        assert_eq!(blocks[0].size, 112);
    }
}
