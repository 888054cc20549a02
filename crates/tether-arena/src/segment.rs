//! Contiguous byte segments and growable segment lists.
//!
//! A [`Segment`] is a fixed-size `Vec<u8>` with bump allocation. A
//! [`SegmentList`] is the per-context collection of segments that overflows
//! into a new segment when the current one is full.

use tether_core::ArenaError;

/// A single contiguous memory segment with bump allocation.
///
/// Segments are never freed while their context lives; they are only reset
/// (cursor back to zero) or dropped with the context.
pub struct Segment {
    /// Backing storage. Allocated to full capacity at creation.
    data: Vec<u8>,
    /// Bump pointer: next free byte.
    cursor: usize,
}

impl Segment {
    /// Create a new zeroed segment with the given capacity in bytes.
    pub fn new(capacity: u32) -> Self {
        Self {
            data: vec![0; capacity as usize],
            cursor: 0,
        }
    }

    /// Bump-allocate `len` bytes from this segment.
    ///
    /// Returns the starting offset, or `None` if there is insufficient
    /// remaining capacity. The region is zeroed before it is handed out,
    /// since a reset leaves stale bytes behind.
    pub fn alloc(&mut self, len: u32) -> Option<u32> {
        let new_cursor = self.cursor.checked_add(len as usize)?;
        if new_cursor > self.data.len() {
            return None;
        }
        let offset = self.cursor as u32;
        self.data[self.cursor..new_cursor].fill(0);
        self.cursor = new_cursor;
        Some(offset)
    }

    /// Get a shared slice at the given offset and length.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len` exceeds the segment's capacity.
    pub fn slice(&self, offset: u32, len: u32) -> &[u8] {
        let start = offset as usize;
        &self.data[start..start + len as usize]
    }

    /// Get a mutable slice at the given offset and length.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len` exceeds the segment's capacity.
    pub fn slice_mut(&mut self, offset: u32, len: u32) -> &mut [u8] {
        let start = offset as usize;
        &mut self.data[start..start + len as usize]
    }

    /// Reset the bump pointer to zero without deallocating.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Number of bytes currently allocated.
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Remaining free capacity in bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }
}

/// A growable list of [`Segment`]s with overflow-based bump allocation.
///
/// When the current segment is full, the next one is reused or a new one
/// is appended (up to `max_segments`). An allocation is always placed
/// entirely within one segment.
pub struct SegmentList {
    segments: Vec<Segment>,
    segment_size: u32,
    max_segments: u16,
    /// Index of the segment currently being filled.
    current: usize,
}

impl SegmentList {
    /// Create a new segment list with one pre-allocated segment.
    pub fn new(segment_size: u32, max_segments: u16) -> Self {
        Self {
            segments: vec![Segment::new(segment_size)],
            segment_size,
            max_segments,
            current: 0,
        }
    }

    /// Bump-allocate `len` bytes, growing into another segment if needed.
    ///
    /// Returns `(segment_index, offset)`, or
    /// `Err(ArenaError::CapacityExceeded)` if the request is larger than a
    /// segment or `max_segments` would be exceeded.
    pub fn alloc(&mut self, len: u32) -> Result<(u8, u32), ArenaError> {
        if len > self.segment_size {
            return Err(ArenaError::CapacityExceeded {
                requested: len as usize,
                capacity: self.segment_size as usize,
            });
        }

        if let Some(offset) = self.segments[self.current].alloc(len) {
            return Ok((self.current as u8, offset));
        }

        // Segments past `current` were emptied by a reset and can be reused.
        let next = self.current + 1;
        if next < self.segments.len() {
            if let Some(offset) = self.segments[next].alloc(len) {
                self.current = next;
                return Ok((next as u8, offset));
            }
        }

        if self.segments.len() >= self.max_segments as usize {
            return Err(ArenaError::CapacityExceeded {
                requested: len as usize,
                capacity: self.capacity_bytes(),
            });
        }

        let mut seg = Segment::new(self.segment_size);
        let offset = seg.alloc(len).ok_or(ArenaError::CapacityExceeded {
            requested: len as usize,
            capacity: self.segment_size as usize,
        })?;
        self.segments.push(seg);
        self.current = self.segments.len() - 1;
        Ok((self.current as u8, offset))
    }

    /// Shared slice from the given segment.
    pub fn slice(&self, segment_index: u8, offset: u32, len: u32) -> &[u8] {
        self.segments[segment_index as usize].slice(offset, len)
    }

    /// Mutable slice from the given segment.
    pub fn slice_mut(&mut self, segment_index: u8, offset: u32, len: u32) -> &mut [u8] {
        self.segments[segment_index as usize].slice_mut(offset, len)
    }

    /// Reset every segment's bump pointer without deallocating.
    ///
    /// Allocation restarts at segment 0, so addresses handed out before the
    /// reset are handed out again.
    pub fn reset(&mut self) {
        for seg in &mut self.segments {
            seg.reset();
        }
        self.current = 0;
    }

    /// Number of segments currently allocated.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total bytes in use across all segments.
    pub fn total_used(&self) -> usize {
        self.segments.iter().map(Segment::used).sum()
    }

    /// Memory held by the backing storage in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.segments.iter().map(Segment::capacity).sum()
    }

    fn capacity_bytes(&self) -> usize {
        self.max_segments as usize * self.segment_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_sequential_alloc() {
        let mut seg = Segment::new(256);
        assert_eq!(seg.alloc(16), Some(0));
        assert_eq!(seg.alloc(32), Some(16));
        assert_eq!(seg.used(), 48);
        assert_eq!(seg.remaining(), 208);
    }

    #[test]
    fn segment_alloc_fails_when_full() {
        let mut seg = Segment::new(64);
        assert!(seg.alloc(64).is_some());
        assert!(seg.alloc(1).is_none());
    }

    #[test]
    fn segment_realloc_after_reset_is_zeroed() {
        let mut seg = Segment::new(64);
        let off = seg.alloc(8).unwrap();
        seg.slice_mut(off, 8).fill(0xAB);
        seg.reset();
        let off2 = seg.alloc(8).unwrap();
        assert_eq!(off, off2);
        assert!(seg.slice(off2, 8).iter().all(|&b| b == 0));
    }

    #[test]
    fn list_grows_on_overflow() {
        let mut list = SegmentList::new(64, 4);
        assert_eq!(list.alloc(64).unwrap(), (0, 0));
        assert_eq!(list.alloc(8).unwrap(), (1, 0));
        assert_eq!(list.segment_count(), 2);
    }

    #[test]
    fn list_capacity_exceeded() {
        let mut list = SegmentList::new(64, 2);
        list.alloc(64).unwrap();
        list.alloc(64).unwrap();
        assert!(matches!(
            list.alloc(8),
            Err(ArenaError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn oversized_alloc_returns_error_not_panic() {
        let mut list = SegmentList::new(64, 4);
        assert!(matches!(
            list.alloc(65),
            Err(ArenaError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn list_reset_reuses_segments_and_addresses() {
        let mut list = SegmentList::new(64, 4);
        let first = list.alloc(48).unwrap();
        list.alloc(48).unwrap();
        assert_eq!(list.segment_count(), 2);

        list.reset();
        assert_eq!(list.total_used(), 0);
        assert_eq!(list.alloc(48).unwrap(), first);
        // Second segment is reused rather than a third appended.
        assert_eq!(list.alloc(48).unwrap(), (1, 0));
        assert_eq!(list.segment_count(), 2);
    }
}
