//! Arena Segment Module
//!
//! A single contiguous region with a best-fit free list.
//!
//! ```text
//! +----------+------+----------+-----------------+
//! | block A  | free | block B  |      free       |
//! +----------+------+----------+-----------------+
//! 0                                           size
//! ```
//!
//! Free blocks are keyed by offset so neighbours can be coalesced on free.

use std::collections::BTreeMap;

use crate::models::{FreeBlock, SegmentInfo};

/// Allocation unit; every block is a multiple of this many bytes.
pub const ALIGNMENT: usize = 8;

/// Rounds a request up to a whole number of allocation units.
///
/// Zero-byte requests still take one unit so every live entry owns a
/// distinct range.
pub fn block_size(size: usize) -> usize {
    let size = size.max(1);
    (size + ALIGNMENT - 1) / ALIGNMENT * ALIGNMENT
}

// == Segment ==
/// A contiguous byte region with its own free list.
#[derive(Debug)]
pub struct Segment {
    /// Position in the arena's segment table
    id: u32,
    /// Backing bytes
    data: Vec<u8>,
    /// Free blocks: offset -> length
    free: BTreeMap<usize, usize>,
    /// Bytes currently handed out
    used: usize,
}

impl Segment {
    // == Constructor ==
    /// Creates a segment of `size` bytes that is entirely free.
    pub fn new(id: u32, size: usize) -> Self {
        let mut free = BTreeMap::new();
        if size > 0 {
            free.insert(0, size);
        }
        Self {
            id,
            data: vec![0; size],
            free,
            used: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn free_bytes(&self) -> usize {
        self.size() - self.used
    }

    // == Allocate ==
    /// Carves `block` bytes out of the smallest free block that fits.
    ///
    /// `block` must already be rounded with [`block_size`]. Returns the offset
    /// of the new block, or None if no free block is large enough.
    pub fn allocate(&mut self, block: usize) -> Option<usize> {
        let (offset, len) = self
            .free
            .iter()
            .filter(|(_, &len)| len >= block)
            .min_by_key(|(&offset, &len)| (len, offset))
            .map(|(&offset, &len)| (offset, len))?;

        self.free.remove(&offset);
        if len > block {
            self.free.insert(offset + block, len - block);
        }
        self.used += block;
        Some(offset)
    }

    // == Free ==
    /// Returns a block to the free list, merging it with adjacent free blocks.
    pub fn free(&mut self, offset: usize, block: usize) {
        let mut start = offset;
        let mut len = block;

        if let Some(next_len) = self.free.remove(&(offset + block)) {
            len += next_len;
        }

        let prev = self
            .free
            .range(..offset)
            .next_back()
            .map(|(&prev_offset, &prev_len)| (prev_offset, prev_len));
        if let Some((prev_offset, prev_len)) = prev {
            if prev_offset + prev_len == offset {
                self.free.remove(&prev_offset);
                start = prev_offset;
                len += prev_len;
            }
        }

        debug_assert!(self.used >= block, "freed more bytes than are in use");
        self.free.insert(start, len);
        self.used -= block;
    }

    // == Read / Write ==
    pub fn read(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Size of the largest free block, 0 if the segment is full.
    pub fn largest_free_block(&self) -> usize {
        self.free.values().copied().max().unwrap_or(0)
    }

    // == Snapshot ==
    /// Point-in-time view of this segment for `sma_info`.
    pub fn snapshot(&self, limited: bool) -> SegmentInfo {
        let free_blocks = if limited {
            None
        } else {
            Some(
                self.free
                    .iter()
                    .map(|(&offset, &size)| FreeBlock { offset, size })
                    .collect(),
            )
        };

        SegmentInfo {
            id: self.id,
            size: self.size(),
            used_bytes: self.used,
            free_bytes: self.free_bytes(),
            free_block_count: self.free.len(),
            largest_free_block: self.largest_free_block(),
            free_blocks,
        }
    }
}
