//! A bitmap caching cumulative container cardinalities for repeated rank and select queries.

use crate::{combine, high_bits, low_bits, Error, RoaringBitmap};
use core::cell::OnceCell;

/// A [`RoaringBitmap`] whose rank, select and cardinality queries reuse a cache of cumulative
/// container cardinalities.
///
/// Every mutation goes through [`FastRankBitmap::mutate`], which dismisses the cache. The cache
/// is rebuilt on the next query.
#[derive(Clone, Debug, Default)]
pub struct FastRankBitmap {
    bitmap: RoaringBitmap,
    /// Cardinality of all containers up to and including each index.
    cumulative: OnceCell<Vec<u64>>,
}

impl PartialEq for FastRankBitmap {
    fn eq(&self, other: &Self) -> bool {
        self.bitmap == other.bitmap
    }
}

impl Eq for FastRankBitmap {}

impl From<RoaringBitmap> for FastRankBitmap {
    fn from(bitmap: RoaringBitmap) -> Self {
        Self {
            bitmap,
            cumulative: OnceCell::new(),
        }
    }
}

impl FastRankBitmap {
    /// Creates an empty bitmap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped bitmap.
    pub fn bitmap(&self) -> &RoaringBitmap {
        &self.bitmap
    }

    /// Consumes the wrapper, returning the bitmap.
    pub fn into_inner(self) -> RoaringBitmap {
        self.bitmap
    }

    /// Applies `f` to the bitmap, dismissing the cache.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut RoaringBitmap) -> R) -> R {
        self.cumulative.take();
        f(&mut self.bitmap)
    }

    /// Returns whether the cache is currently built.
    pub fn is_cached(&self) -> bool {
        self.cumulative.get().is_some()
    }

    /// Adds a value.
    pub fn add(&mut self, value: u32) {
        self.mutate(|b| b.add(value));
    }

    /// Removes a value.
    pub fn remove(&mut self, value: u32) {
        self.mutate(|b| b.remove(value));
    }

    /// Adds every value in `[start, end)`.
    pub fn add_range(&mut self, start: u64, end: u64) -> Result<(), Error> {
        self.mutate(|b| b.add_range(start, end))
    }

    /// Removes every value in `[start, end)`.
    pub fn remove_range(&mut self, start: u64, end: u64) -> Result<(), Error> {
        self.mutate(|b| b.remove_range(start, end))
    }

    fn cumulative(&self) -> &[u64] {
        self.cumulative.get_or_init(|| {
            let mut total = 0;
            self.bitmap
                .directory()
                .containers()
                .iter()
                .map(|c| {
                    total += c.len() as u64;
                    total
                })
                .collect()
        })
    }

    /// Returns the number of values.
    pub fn len(&self) -> u64 {
        self.cumulative().last().copied().unwrap_or_default()
    }

    /// Returns whether the bitmap is empty.
    pub fn is_empty(&self) -> bool {
        self.bitmap.is_empty()
    }

    /// Checks if the bitmap contains the given value.
    pub fn contains(&self, value: u32) -> bool {
        self.bitmap.contains(value)
    }

    /// Returns the number of values less than or equal to `value`.
    pub fn rank(&self, value: u32) -> u64 {
        let (high, low) = (high_bits(value), low_bits(value));
        let directory = self.bitmap.directory();
        let cumulative = self.cumulative();
        match directory.get_index(high) {
            Ok(index) => {
                let before = index.checked_sub(1).map_or(0, |i| cumulative[i]);
                before + directory.container_at(index).rank(low) as u64
            }
            Err(0) => 0,
            Err(index) => cumulative[index - 1],
        }
    }

    /// Returns the `index`th smallest value (0-based).
    pub fn select(&self, index: u64) -> Result<u32, Error> {
        let cumulative = self.cumulative();
        let container = cumulative.partition_point(|&total| total <= index);
        let directory = self.bitmap.directory();
        if container == directory.len() {
            return Err(Error::SelectOutOfBounds {
                index,
                cardinality: self.len(),
            });
        }
        let before = container.checked_sub(1).map_or(0, |i| cumulative[i]);
        directory
            .container_at(container)
            .select((index - before) as u32)
            .map(|low| combine(directory.key_at(container), low))
            .ok_or(Error::SelectOutOfBounds {
                index,
                cardinality: self.len(),
            })
    }
}
