//! Run container for consecutive sequences.
//!
//! Stores values as a sorted list of inclusive `[start, end]` ranges. Runs never overlap and are
//! never adjacent: inserting a value or range that touches an existing run merges them. This is the
//! most compact representation for data with long stretches of consecutive values and for fully
//! saturated containers.

use super::{
    array::Array,
    bitmap::{Bitmap, WORDS},
};

/// A container that stores values as run-length encoded ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Run {
    /// Sorted, non-overlapping, non-adjacent inclusive ranges.
    runs: Vec<(u16, u16)>,
    /// Number of values covered by `runs`.
    len: u32,
}

#[inline]
fn run_len(&(start, end): &(u16, u16)) -> u32 {
    (end - start) as u32 + 1
}

impl Run {
    /// Creates an empty run container.
    #[inline]
    pub const fn new() -> Self {
        Self {
            runs: Vec::new(),
            len: 0,
        }
    }

    /// Creates a run container representing a fully saturated container [0, 65535].
    #[inline]
    pub fn full() -> Self {
        Self::from_range(0, 1 << 16)
    }

    /// Creates a run container holding every value in `[start, end)`.
    pub fn from_range(start: u32, end: u32) -> Self {
        if start >= end {
            return Self::new();
        }
        Self {
            runs: vec![(start as u16, (end - 1) as u16)],
            len: end - start,
        }
    }

    /// Creates a run container from ranges that are already sorted, non-overlapping and
    /// non-adjacent.
    pub fn from_sorted_runs(runs: Vec<(u16, u16)>) -> Self {
        let len = runs.iter().map(run_len).sum();
        let run = Self { runs, len };
        debug_assert!(run.is_valid(), "runs must be sorted, disjoint and non-adjacent");
        run
    }

    /// Creates a run container from an array container.
    pub fn from_array(array: &Array) -> Self {
        let mut runs: Vec<(u16, u16)> = Vec::new();
        for v in array.iter() {
            match runs.last_mut() {
                Some((_, end)) if *end as u32 + 1 == v as u32 => *end = v,
                _ => runs.push((v, v)),
            }
        }
        Self {
            runs,
            len: array.len(),
        }
    }

    /// Creates a run container from a bitmap container.
    pub fn from_bitmap(bitmap: &Bitmap) -> Self {
        // Fast path for full bitmap
        if bitmap.is_full() {
            return Self::full();
        }

        let words = bitmap.words();
        let mut runs = Vec::new();
        let mut index = 0;
        let mut word = words[0];
        loop {
            while word == 0 {
                index += 1;
                if index == WORDS {
                    return Self {
                        runs,
                        len: bitmap.len(),
                    };
                }
                word = words[index];
            }
            let start = index as u32 * 64 + word.trailing_zeros();

            // Fill the bits below the run start so trailing ones locate the run end.
            let mut filled = word | (word - 1);
            while filled == u64::MAX {
                index += 1;
                if index == WORDS {
                    runs.push((start as u16, u16::MAX));
                    return Self {
                        runs,
                        len: bitmap.len(),
                    };
                }
                filled = words[index];
            }
            let end = index as u32 * 64 + filled.trailing_ones();
            runs.push((start as u16, (end - 1) as u16));
            word = filled & (filled + 1);
        }
    }

    /// Returns the number of runs in the container.
    #[inline]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Returns the cardinality (number of values) in the container.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Returns whether the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Returns whether the container is fully saturated (contains all 65536 values).
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == 1 << 16
    }

    /// Returns the runs as inclusive `(start, end)` pairs.
    #[inline]
    pub fn runs(&self) -> &[(u16, u16)] {
        &self.runs
    }

    /// Checks if the container contains the given value.
    pub fn contains(&self, value: u16) -> bool {
        let pos = self.runs.partition_point(|&(start, _)| start <= value);
        pos > 0 && self.runs[pos - 1].1 >= value
    }

    /// Inserts a value into the container.
    ///
    /// Returns `true` if the value was newly inserted.
    pub fn insert(&mut self, value: u16) -> bool {
        self.insert_range(value as u32, value as u32 + 1) == 1
    }

    /// Removes a value from the container.
    ///
    /// Returns `true` if the value was present.
    pub fn remove(&mut self, value: u16) -> bool {
        self.remove_range(value as u32, value as u32 + 1) == 1
    }

    /// Inserts a range of values [start, end) into the container, merging every run it touches.
    ///
    /// Returns the number of values newly inserted.
    pub fn insert_range(&mut self, start: u32, end: u32) -> u32 {
        if start >= end {
            return 0;
        }
        let last = end - 1;
        let lo = self.runs.partition_point(|&(_, e)| e as u32 + 1 < start);
        let hi = self.runs.partition_point(|&(s, _)| s as u32 <= last + 1);
        if lo == hi {
            self.runs.insert(lo, (start as u16, last as u16));
            self.len += end - start;
            return end - start;
        }

        let merged_start = (self.runs[lo].0 as u32).min(start);
        let merged_end = (self.runs[hi - 1].1 as u32).max(last);
        let covered: u32 = self.runs[lo..hi].iter().map(run_len).sum();
        let merged_len = merged_end - merged_start + 1;
        self.runs
            .splice(lo..hi, [(merged_start as u16, merged_end as u16)]);
        self.len = self.len - covered + merged_len;
        merged_len - covered
    }

    /// Removes a range of values [start, end) from the container, splitting runs as needed.
    ///
    /// Returns the number of values removed.
    pub fn remove_range(&mut self, start: u32, end: u32) -> u32 {
        if start >= end {
            return 0;
        }
        let last = end - 1;
        let lo = self.runs.partition_point(|&(_, e)| (e as u32) < start);
        let hi = self.runs.partition_point(|&(s, _)| s as u32 <= last);
        if lo >= hi {
            return 0;
        }

        let first_start = self.runs[lo].0;
        let last_end = self.runs[hi - 1].1;
        let mut pieces = Vec::with_capacity(2);
        if (first_start as u32) < start {
            pieces.push((first_start, (start - 1) as u16));
        }
        if (last_end as u32) > last {
            pieces.push(((last + 1) as u16, last_end));
        }
        let covered: u32 = self.runs[lo..hi].iter().map(run_len).sum();
        let kept: u32 = pieces.iter().map(run_len).sum();
        self.runs.splice(lo..hi, pieces);
        self.len -= covered - kept;
        covered - kept
    }

    /// Returns the number of values in `[start, end)`.
    pub fn count_range(&self, start: u32, end: u32) -> u32 {
        if start >= end {
            return 0;
        }
        let lo = self.runs.partition_point(|&(_, e)| (e as u32) < start);
        self.runs[lo..]
            .iter()
            .take_while(|&&(s, _)| (s as u32) < end)
            .map(|&(s, e)| (e as u32 + 1).min(end) - (s as u32).max(start))
            .sum()
    }

    /// Returns whether every value in `[start, end)` is present.
    pub fn contains_range(&self, start: u32, end: u32) -> bool {
        if start >= end {
            return true;
        }
        let pos = self.runs.partition_point(|&(s, _)| s as u32 <= start);
        pos > 0 && self.runs[pos - 1].1 as u32 >= end - 1
    }

    /// Returns whether any value in `[start, end)` is present.
    pub fn intersects_range(&self, start: u32, end: u32) -> bool {
        if start >= end {
            return false;
        }
        let lo = self.runs.partition_point(|&(_, e)| (e as u32) < start);
        self.runs.get(lo).is_some_and(|&(s, _)| (s as u32) < end)
    }

    /// Returns the number of values less than or equal to `value`.
    pub fn rank(&self, value: u16) -> u32 {
        let mut rank = 0;
        for &(start, end) in &self.runs {
            if start > value {
                break;
            }
            rank += (end.min(value) - start) as u32 + 1;
        }
        rank
    }

    /// Returns the `n`th smallest value (0-based).
    pub fn select(&self, mut n: u32) -> Option<u16> {
        for run in &self.runs {
            let len = run_len(run);
            if n < len {
                return Some(run.0 + n as u16);
            }
            n -= len;
        }
        None
    }

    /// Returns the minimum value in the container, if any.
    #[inline]
    pub fn min(&self) -> Option<u16> {
        self.runs.first().map(|&(start, _)| start)
    }

    /// Returns the maximum value in the container, if any.
    #[inline]
    pub fn max(&self) -> Option<u16> {
        self.runs.last().map(|&(_, end)| end)
    }

    /// Returns the smallest value greater than or equal to `value`.
    pub fn next_value(&self, value: u16) -> Option<u16> {
        let pos = self.runs.partition_point(|&(_, end)| end < value);
        self.runs.get(pos).map(|&(start, _)| start.max(value))
    }

    /// Returns the largest value less than or equal to `value`.
    pub fn previous_value(&self, value: u16) -> Option<u16> {
        let pos = self.runs.partition_point(|&(start, _)| start <= value);
        pos.checked_sub(1).map(|p| self.runs[p].1.min(value))
    }

    /// Returns the smallest value greater than or equal to `value` that is not in the container.
    pub fn next_absent_value(&self, value: u16) -> Option<u16> {
        let pos = self.runs.partition_point(|&(start, _)| start <= value);
        match pos.checked_sub(1).map(|p| self.runs[p]) {
            Some((_, end)) if end >= value => end.checked_add(1),
            _ => Some(value),
        }
    }

    /// Returns the largest value less than or equal to `value` that is not in the container.
    pub fn previous_absent_value(&self, value: u16) -> Option<u16> {
        let pos = self.runs.partition_point(|&(start, _)| start <= value);
        match pos.checked_sub(1).map(|p| self.runs[p]) {
            Some((start, end)) if end >= value => start.checked_sub(1),
            _ => Some(value),
        }
    }

    /// Converts to an array container.
    pub fn to_array(&self) -> Array {
        let mut values = Vec::with_capacity(self.len as usize);
        for &(start, end) in &self.runs {
            values.extend(start..=end);
        }
        Array::from_sorted_vec(values)
    }

    /// Converts to a bitmap container.
    pub fn to_bitmap(&self) -> Bitmap {
        let mut bitmap = Bitmap::new();
        for &(start, end) in &self.runs {
            bitmap.insert_range(start as u32, end as u32 + 1);
        }
        bitmap
    }

    /// Returns the runs as half-open `[start, end)` ranges.
    pub fn ranges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.runs
            .iter()
            .map(|&(start, end)| (start as u32, end as u32 + 1))
    }

    /// Returns whether the runs are sorted, non-overlapping, non-adjacent and sum to `len`.
    pub fn is_valid(&self) -> bool {
        let ordered = self
            .runs
            .windows(2)
            .all(|w| w[0].0 <= w[0].1 && (w[0].1 as u32) + 1 < w[1].0 as u32);
        let last_ok = self.runs.last().map_or(true, |&(s, e)| s <= e);
        ordered && last_ok && self.len == self.runs.iter().map(run_len).sum::<u32>()
    }

    /// Returns an iterator over the values in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            runs: &self.runs,
            front_run: 0,
            front: self.runs.first().map_or(0, |&(s, _)| s as u32),
            back_run: self.runs.len().saturating_sub(1),
            back: self.runs.last().map_or(0, |&(_, e)| e as u32),
            remaining: self.len,
        }
    }
}

/// Iterator over the values of a [`Run`] container.
pub struct Iter<'a> {
    runs: &'a [(u16, u16)],
    front_run: usize,
    /// Next value yielded from the front.
    front: u32,
    back_run: usize,
    /// Next value yielded from the back.
    back: u32,
    remaining: u32,
}

impl Iter<'_> {
    /// Skips every value less than `target`.
    pub fn advance_to(&mut self, target: u16) {
        let target = target as u32;
        while self.remaining > 0 {
            let end = self.runs[self.front_run].1 as u32;
            if end < target {
                let skipped = (end - self.front + 1).min(self.remaining);
                self.remaining -= skipped;
                self.front_run += 1;
                if let Some(&(start, _)) = self.runs.get(self.front_run) {
                    self.front = start as u32;
                }
                continue;
            }
            if target > self.front {
                let skipped = (target - self.front).min(self.remaining);
                self.remaining -= skipped;
                self.front = target;
            }
            break;
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.front;
        self.remaining -= 1;
        if value == self.runs[self.front_run].1 as u32 {
            self.front_run += 1;
            if let Some(&(start, _)) = self.runs.get(self.front_run) {
                self.front = start as u32;
            }
        } else {
            self.front += 1;
        }
        Some(value as u16)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.back;
        self.remaining -= 1;
        if value == self.runs[self.back_run].0 as u32 {
            if self.back_run > 0 {
                self.back_run -= 1;
                self.back = self.runs[self.back_run].1 as u32;
            }
        } else {
            self.back -= 1;
        }
        Some(value as u16)
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_full() {
        let run = Run::new();
        assert!(run.is_empty());
        assert_eq!(run.len(), 0);
        let full = Run::full();
        assert!(full.is_full());
        assert_eq!(full.runs(), &[(0, u16::MAX)]);
        assert!(full.contains(0) && full.contains(u16::MAX));
    }

    #[test]
    fn test_auto_merge_adjacent() {
        let mut run = Run::new();
        assert!(run.insert(5));
        assert!(run.insert(7));
        assert_eq!(run.run_count(), 2);
        assert!(run.insert(6));
        assert_eq!(run.runs(), &[(5, 7)]);
        assert!(!run.insert(6));
        assert_eq!(run.len(), 3);
    }

    #[test]
    fn test_insert_range_bridges_runs() {
        let mut run = Run::from_sorted_runs(vec![(0, 9), (20, 29), (40, 49)]);
        assert_eq!(run.insert_range(10, 40), 20);
        assert_eq!(run.runs(), &[(0, 49)]);
        assert_eq!(run.len(), 50);
        assert_eq!(run.insert_range(65530, 65536), 6);
        assert_eq!(run.max(), Some(u16::MAX));
        assert!(run.is_valid());
    }

    #[test]
    fn test_remove_range_splits() {
        let mut run = Run::from_range(0, 100);
        assert_eq!(run.remove_range(10, 20), 10);
        assert_eq!(run.runs(), &[(0, 9), (20, 99)]);
        assert!(run.remove(50));
        assert_eq!(run.runs(), &[(0, 9), (20, 49), (51, 99)]);
        assert_eq!(run.remove_range(0, 100), 89);
        assert!(run.is_empty());
        assert!(run.is_valid());
    }

    #[test]
    fn test_count_and_contains_range() {
        let run = Run::from_sorted_runs(vec![(10, 19), (30, 39)]);
        assert_eq!(run.count_range(0, 65536), 20);
        assert_eq!(run.count_range(15, 35), 10);
        assert!(run.contains_range(11, 20));
        assert!(!run.contains_range(11, 21));
        assert!(run.intersects_range(20, 31));
        assert!(!run.intersects_range(20, 30));
    }

    #[test]
    fn test_rank_select_navigation() {
        let run = Run::from_sorted_runs(vec![(10, 19), (30, 39), (65530, 65535)]);
        assert_eq!(run.rank(9), 0);
        assert_eq!(run.rank(10), 1);
        assert_eq!(run.rank(35), 16);
        assert_eq!(run.select(10), Some(30));
        assert_eq!(run.select(26), None);
        assert_eq!(run.next_value(20), Some(30));
        assert_eq!(run.previous_value(25), Some(19));
        assert_eq!(run.next_absent_value(15), Some(20));
        assert_eq!(run.next_absent_value(65531), None);
        assert_eq!(run.previous_absent_value(35), Some(29));
        assert_eq!(Run::from_range(0, 5).previous_absent_value(3), None);
    }

    #[test]
    fn test_from_bitmap_and_array() {
        let mut bitmap = Bitmap::new();
        bitmap.insert_range(0, 3);
        bitmap.insert_range(60, 200);
        bitmap.insert(65535);
        let run = Run::from_bitmap(&bitmap);
        assert_eq!(run.runs(), &[(0, 2), (60, 199), (65535, 65535)]);
        assert_eq!(run.len(), bitmap.len());
        assert_eq!(run.to_bitmap(), bitmap);

        let array = Array::from_sorted_vec(vec![1, 2, 3, 10]);
        let run = Run::from_array(&array);
        assert_eq!(run.runs(), &[(1, 3), (10, 10)]);
        assert_eq!(run.to_array(), array);

        assert!(Run::from_bitmap(&Bitmap::full()).is_full());
        assert!(Run::from_bitmap(&Bitmap::new()).is_empty());
    }

    #[test]
    fn test_iterator() {
        let run = Run::from_sorted_runs(vec![(1, 3), (10, 11)]);
        assert_eq!(run.iter().collect::<Vec<_>>(), vec![1, 2, 3, 10, 11]);
        assert_eq!(run.iter().rev().collect::<Vec<_>>(), vec![11, 10, 3, 2, 1]);

        let mut iter = run.iter();
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next_back(), Some(11));
        iter.advance_to(10);
        assert_eq!(iter.len(), 1);
        assert_eq!(iter.next(), Some(10));
        assert_eq!(iter.next(), None);

        let mut iter = run.iter();
        iter.advance_to(u16::MAX);
        assert_eq!(iter.next(), None);
    }
}
