//! Array container for sparse data.
//!
//! Stores up to 4096 sorted u16 values. When the cardinality exceeds this
//! threshold, the container is converted to a [`Bitmap`](super::Bitmap).

use super::policy::ARRAY_MAX_CARDINALITY;

/// Size ratio above which intersections gallop through the larger array.
const GALLOP_RATIO: usize = 64;

/// A container that stores sparse u16 values in a sorted array.
///
/// This is efficient for containers with cardinality <= 4096, as it uses
/// less memory than a full bitmap (which requires 8KB regardless of density).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Array {
    /// Sorted values stored in the container.
    values: Vec<u16>,
}

impl Array {
    /// Creates an empty array container.
    #[inline]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Creates an array container with the given capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity.min(ARRAY_MAX_CARDINALITY as usize)),
        }
    }

    /// Creates an array container from a sorted, deduplicated vector.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the values are not sorted or contain duplicates.
    #[inline]
    pub fn from_sorted_vec(values: Vec<u16>) -> Self {
        debug_assert!(
            values.windows(2).all(|w| w[0] < w[1]),
            "values must be sorted and unique"
        );
        Self { values }
    }

    /// Creates an array container holding every value in `[start, end)`.
    pub fn from_range(start: u32, end: u32) -> Self {
        debug_assert!(start <= end && end <= 1 << 16);
        Self {
            values: (start..end).map(|v| v as u16).collect(),
        }
    }

    /// Returns the number of values in the container.
    #[inline]
    pub fn len(&self) -> u32 {
        self.values.len() as u32
    }

    /// Returns whether the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns whether the container has reached the largest cardinality an array may hold.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= ARRAY_MAX_CARDINALITY
    }

    /// Checks if the container contains the given value.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    /// Inserts a value into the container.
    ///
    /// Returns `true` if the value was newly inserted, `false` if it already existed.
    #[inline]
    pub fn insert(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(_) => false,
            Err(pos) => {
                self.values.insert(pos, value);
                true
            }
        }
    }

    /// Removes a value from the container.
    ///
    /// Returns `true` if the value was present.
    #[inline]
    pub fn remove(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(pos) => {
                self.values.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns the positions `[lo, hi)` of the values that fall in `[start, end)`.
    #[inline]
    fn bounds(&self, start: u32, end: u32) -> (usize, usize) {
        let lo = self.values.partition_point(|&x| (x as u32) < start);
        let hi = lo + self.values[lo..].partition_point(|&x| (x as u32) < end);
        (lo, hi)
    }

    /// Returns the number of values in `[start, end)`.
    #[inline]
    pub fn count_range(&self, start: u32, end: u32) -> u32 {
        if start >= end {
            return 0;
        }
        let (lo, hi) = self.bounds(start, end);
        (hi - lo) as u32
    }

    /// Inserts a range of values [start, end) into the container.
    ///
    /// Returns the number of values newly inserted. The caller is responsible for
    /// converting the container if the result exceeds the array threshold.
    pub fn insert_range(&mut self, start: u32, end: u32) -> u32 {
        if start >= end {
            return 0;
        }
        let (lo, hi) = self.bounds(start, end);
        let added = (end - start) - (hi - lo) as u32;
        if added == 0 {
            return 0;
        }

        // Every existing value in [lo, hi) lies inside the range, so the range replaces them.
        self.values
            .splice(lo..hi, (start..end).map(|v| v as u16));
        added
    }

    /// Removes a range of values [start, end) from the container.
    ///
    /// Returns the number of values removed.
    pub fn remove_range(&mut self, start: u32, end: u32) -> u32 {
        if start >= end {
            return 0;
        }
        let (lo, hi) = self.bounds(start, end);
        self.values.drain(lo..hi);
        (hi - lo) as u32
    }

    /// Returns an iterator over the values in sorted order.
    #[inline]
    pub fn iter(&self) -> core::iter::Copied<core::slice::Iter<'_, u16>> {
        self.values.iter().copied()
    }

    /// Returns the underlying values as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        &self.values
    }

    /// Consumes the container and returns the underlying vector.
    #[inline]
    pub fn into_vec(self) -> Vec<u16> {
        self.values
    }

    /// Returns the minimum value in the container, if any.
    #[inline]
    pub fn min(&self) -> Option<u16> {
        self.values.first().copied()
    }

    /// Returns the maximum value in the container, if any.
    #[inline]
    pub fn max(&self) -> Option<u16> {
        self.values.last().copied()
    }

    /// Returns the number of values less than or equal to `value`.
    #[inline]
    pub fn rank(&self, value: u16) -> u32 {
        self.values.partition_point(|&x| x <= value) as u32
    }

    /// Returns the `n`th smallest value (0-based).
    #[inline]
    pub fn select(&self, n: u32) -> Option<u16> {
        self.values.get(n as usize).copied()
    }

    /// Returns the smallest value greater than or equal to `value`.
    pub fn next_value(&self, value: u16) -> Option<u16> {
        let pos = self.values.partition_point(|&x| x < value);
        self.values.get(pos).copied()
    }

    /// Returns the largest value less than or equal to `value`.
    pub fn previous_value(&self, value: u16) -> Option<u16> {
        let pos = self.values.partition_point(|&x| x <= value);
        pos.checked_sub(1).map(|p| self.values[p])
    }

    /// Returns the smallest value greater than or equal to `value` that is not in the container.
    pub fn next_absent_value(&self, value: u16) -> Option<u16> {
        let Ok(mut pos) = self.values.binary_search(&value) else {
            return Some(value);
        };

        // Walk the run of consecutive values starting at `value`.
        let mut candidate = value as u32;
        while pos < self.values.len() && self.values[pos] as u32 == candidate {
            candidate += 1;
            pos += 1;
        }
        u16::try_from(candidate).ok()
    }

    /// Returns the largest value less than or equal to `value` that is not in the container.
    pub fn previous_absent_value(&self, value: u16) -> Option<u16> {
        let Ok(pos) = self.values.binary_search(&value) else {
            return Some(value);
        };

        let mut candidate = value as i32;
        let mut pos = pos as isize;
        while pos >= 0 && self.values[pos as usize] as i32 == candidate {
            candidate -= 1;
            pos -= 1;
        }
        u16::try_from(candidate).ok()
    }

    /// Returns the number of runs of consecutive values.
    pub fn number_of_runs(&self) -> usize {
        if self.values.is_empty() {
            return 0;
        }
        1 + self
            .values
            .windows(2)
            .filter(|w| w[1] != w[0].wrapping_add(1))
            .count()
    }

    /// Returns whether the values are strictly increasing.
    pub fn is_sorted(&self) -> bool {
        self.values.windows(2).all(|w| w[0] < w[1])
    }

    /// Computes the union of two arrays.
    ///
    /// The result may exceed the array threshold; callers decide whether to keep it.
    pub fn union(&self, other: &Self) -> Self {
        let a = &self.values;
        let b = &other.values;
        let mut result = Vec::with_capacity(a.len() + b.len());
        let mut i = 0;
        let mut j = 0;

        while i < a.len() && j < b.len() {
            let av = a[i];
            let bv = b[j];
            if av < bv {
                result.push(av);
                i += 1;
            } else if bv < av {
                result.push(bv);
                j += 1;
            } else {
                result.push(av);
                i += 1;
                j += 1;
            }
        }

        // Extend with remaining elements
        result.extend_from_slice(&a[i..]);
        result.extend_from_slice(&b[j..]);
        Self { values: result }
    }

    /// Computes the intersection of two arrays.
    pub fn intersection(&self, other: &Self) -> Self {
        let (small, large) = if self.values.len() <= other.values.len() {
            (&self.values, &other.values)
        } else {
            (&other.values, &self.values)
        };
        let mut result = Vec::with_capacity(small.len());
        if small.len() * GALLOP_RATIO < large.len() {
            let mut pos = 0;
            for &v in small {
                pos = gallop(large, pos, v);
                if pos == large.len() {
                    break;
                }
                if large[pos] == v {
                    result.push(v);
                }
            }
            return Self { values: result };
        }

        let mut i = 0;
        let mut j = 0;
        while i < small.len() && j < large.len() {
            let av = small[i];
            let bv = large[j];
            if av < bv {
                i += 1;
            } else if bv < av {
                j += 1;
            } else {
                result.push(av);
                i += 1;
                j += 1;
            }
        }
        Self { values: result }
    }

    /// Returns the cardinality of the intersection without materializing it.
    pub fn intersection_len(&self, other: &Self) -> u32 {
        let a = &self.values;
        let b = &other.values;
        let mut count = 0;
        let mut i = 0;
        let mut j = 0;
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                core::cmp::Ordering::Less => i += 1,
                core::cmp::Ordering::Greater => j += 1,
                core::cmp::Ordering::Equal => {
                    count += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        count
    }

    /// Returns whether the two arrays share at least one value.
    pub fn intersects(&self, other: &Self) -> bool {
        let a = &self.values;
        let b = &other.values;
        let mut i = 0;
        let mut j = 0;
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                core::cmp::Ordering::Less => i += 1,
                core::cmp::Ordering::Greater => j += 1,
                core::cmp::Ordering::Equal => return true,
            }
        }
        false
    }

    /// Computes the difference (self - other).
    pub fn difference(&self, other: &Self) -> Self {
        let a = &self.values;
        let b = &other.values;
        let mut result = Vec::with_capacity(a.len());
        let mut i = 0;
        let mut j = 0;

        while i < a.len() && j < b.len() {
            let av = a[i];
            let bv = b[j];
            if av < bv {
                result.push(av);
                i += 1;
            } else if av > bv {
                j += 1;
            } else {
                i += 1;
                j += 1;
            }
        }
        // Remaining elements from a are all in the difference
        result.extend_from_slice(&a[i..]);
        Self { values: result }
    }

    /// Computes the symmetric difference of two arrays.
    ///
    /// The result may exceed the array threshold; callers decide whether to keep it.
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let a = &self.values;
        let b = &other.values;
        let mut result = Vec::with_capacity(a.len() + b.len());
        let mut i = 0;
        let mut j = 0;

        while i < a.len() && j < b.len() {
            let av = a[i];
            let bv = b[j];
            if av < bv {
                result.push(av);
                i += 1;
            } else if bv < av {
                result.push(bv);
                j += 1;
            } else {
                i += 1;
                j += 1;
            }
        }
        result.extend_from_slice(&a[i..]);
        result.extend_from_slice(&b[j..]);
        Self { values: result }
    }

    /// Retains only the values for which `keep` returns true.
    pub fn filter(&self, mut keep: impl FnMut(u16) -> bool) -> Self {
        Self {
            values: self.values.iter().copied().filter(|&v| keep(v)).collect(),
        }
    }
}

/// Returns the first position at or after `start` whose value is `>= target`.
fn gallop(values: &[u16], start: usize, target: u16) -> usize {
    if start >= values.len() || values[start] >= target {
        return start;
    }

    // Exponential probe, then binary search in the bracketed window.
    let mut step = 1;
    let mut hi = start + 1;
    while hi < values.len() && values[hi] < target {
        step *= 2;
        hi = start + step;
    }
    let hi = hi.min(values.len());
    let lo = start + step / 2;
    lo + values[lo..hi].partition_point(|&x| x < target)
}
