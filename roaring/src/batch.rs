//! Iteration into caller-provided buffers.

use crate::{bitmap::Iter, RoaringBitmap};

/// Fills buffers with consecutive values of a bitmap in ascending order.
pub struct BatchIterator<'a> {
    iter: Iter<'a>,
}

impl<'a> BatchIterator<'a> {
    /// Creates an iterator positioned at the smallest value of `bitmap`.
    pub fn new(bitmap: &'a RoaringBitmap) -> Self {
        Self {
            iter: bitmap.iter(),
        }
    }

    /// Writes up to `buffer.len()` values into `buffer`, returning how many were written.
    ///
    /// Returns 0 once the iterator is exhausted.
    pub fn next_batch(&mut self, buffer: &mut [u32]) -> usize {
        let mut written = 0;
        for (slot, value) in buffer.iter_mut().zip(&mut self.iter) {
            *slot = value;
            written += 1;
        }
        written
    }

    /// Returns whether any value remains.
    pub fn has_next(&self) -> bool {
        self.iter.len() > 0
    }

    /// Skips every value less than `target`.
    ///
    /// Targets at or before the current position are ignored. Targets past the last value
    /// exhaust the iterator.
    pub fn advance_if_needed(&mut self, target: u32) {
        self.iter.advance_to(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1; "single")]
    #[test_case(7; "odd")]
    #[test_case(256; "large")]
    fn test_batches_cover_bitmap(size: usize) {
        let mut bitmap = RoaringBitmap::from_range(100, 1_000).unwrap();
        bitmap.add(1 << 20);
        bitmap.add(u32::MAX);
        let mut iter = BatchIterator::new(&bitmap);
        let mut buffer = vec![0; size];
        let mut collected = Vec::new();
        while iter.has_next() {
            let n = iter.next_batch(&mut buffer);
            assert!(n > 0);
            collected.extend_from_slice(&buffer[..n]);
        }
        assert_eq!(iter.next_batch(&mut buffer), 0);
        assert_eq!(collected, bitmap.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_advance_if_needed() {
        let bitmap: RoaringBitmap = [5, 10, 70_000, 70_001].into_iter().collect();
        let mut iter = BatchIterator::new(&bitmap);
        let mut buffer = [0; 2];
        iter.advance_if_needed(7);
        assert_eq!(iter.next_batch(&mut buffer), 2);
        assert_eq!(buffer, [10, 70_000]);

        // Advancing backwards is a no-op.
        iter.advance_if_needed(0);
        assert_eq!(iter.next_batch(&mut buffer), 1);
        assert_eq!(buffer[0], 70_001);

        let mut iter = BatchIterator::new(&bitmap);
        iter.advance_if_needed(u32::MAX);
        assert!(!iter.has_next());
        assert_eq!(iter.next_batch(&mut buffer), 0);
    }
}
