//! The public compressed bitmap type.

use crate::{
    combine,
    container::{self, Container, Kind, RangeConsumer},
    directory::Directory,
    high_bits, low_bits, Error,
};
use core::fmt;
use tracing::debug;

/// Exclusive upper bound of every range of 32-bit values.
pub const MAX_RANGE_END: u64 = 1 << 32;

/// Returns an error unless `[start, end)` is a valid range of 32-bit values.
#[inline]
pub(crate) fn check_range(start: u64, end: u64) -> Result<(), Error> {
    if start > end || end > MAX_RANGE_END {
        return Err(Error::InvalidRange { start, end });
    }
    Ok(())
}

/// Splits a non-empty range into the `(key, start, end)` pieces each container covers.
fn key_ranges(start: u64, end: u64) -> impl Iterator<Item = (u16, u32, u32)> {
    debug_assert!(start < end && end <= MAX_RANGE_END);
    let first = (start >> 16) as u32;
    let last = ((end - 1) >> 16) as u32;
    (first..=last).map(move |key| {
        let lo = if key == first { (start & 0xFFFF) as u32 } else { 0 };
        let hi = if key == last {
            ((end - 1) & 0xFFFF) as u32 + 1
        } else {
            1 << 16
        };
        (key as u16, lo, hi)
    })
}

/// A compressed set of `u32` values.
///
/// Values are grouped by their high 16 bits into containers, each holding the low 16 bits in
/// the representation that encodes them most compactly. Equality compares contents only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RoaringBitmap {
    pub(crate) directory: Directory,
}

impl RoaringBitmap {
    /// Creates an empty bitmap.
    pub const fn new() -> Self {
        Self {
            directory: Directory::new(),
        }
    }

    /// Creates a bitmap holding every value in `[start, end)`.
    pub fn from_range(start: u64, end: u64) -> Result<Self, Error> {
        let mut bitmap = Self::new();
        bitmap.add_range(start, end)?;
        Ok(bitmap)
    }

    /// Creates a bitmap from a directory whose keys are strictly increasing and whose
    /// containers are non-empty.
    pub fn from_directory(directory: Directory) -> Self {
        debug_assert!(directory.is_valid());
        Self { directory }
    }

    /// Returns the directory of containers.
    #[inline]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Consumes the bitmap, returning its directory.
    pub fn into_directory(self) -> Directory {
        self.directory
    }

    /// Returns the container for the high 16-bit `key`, if any.
    pub fn container(&self, key: u16) -> Option<&Container> {
        self.directory.get(key)
    }

    /// Returns the number of containers.
    #[inline]
    pub fn container_count(&self) -> usize {
        self.directory.len()
    }

    /// Returns the number of values in the bitmap.
    pub fn len(&self) -> u64 {
        self.directory
            .containers()
            .iter()
            .map(|c| c.len() as u64)
            .sum()
    }

    /// Returns whether the bitmap is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Removes every value.
    pub fn clear(&mut self) {
        self.directory.clear();
    }

    /// Checks if the bitmap contains the given value.
    pub fn contains(&self, value: u32) -> bool {
        self.directory
            .get(high_bits(value))
            .is_some_and(|c| c.contains(low_bits(value)))
    }

    /// Adds a value.
    pub fn add(&mut self, value: u32) {
        let (key, low) = (high_bits(value), low_bits(value));
        match self.directory.get_index(key) {
            Ok(index) => self.directory.update_at(index, |c| c.add(low)),
            Err(index) => {
                self.directory
                    .insert_new_key_value_at(index, key, Container::new().add(low))
            }
        }
    }

    /// Adds a value, returning `true` if it was not already present.
    pub fn check_add(&mut self, value: u32) -> bool {
        if self.contains(value) {
            return false;
        }
        self.add(value);
        true
    }

    /// Removes a value.
    pub fn remove(&mut self, value: u32) {
        if let Ok(index) = self.directory.get_index(high_bits(value)) {
            let low = low_bits(value);
            self.directory.update_at(index, |c| c.remove(low));
        }
    }

    /// Removes a value, returning `true` if it was present.
    pub fn check_remove(&mut self, value: u32) -> bool {
        if !self.contains(value) {
            return false;
        }
        self.remove(value);
        true
    }

    /// Toggles a value.
    pub fn flip(&mut self, value: u32) {
        let (key, low) = (high_bits(value), low_bits(value));
        match self.directory.get_index(key) {
            Ok(index) => self.directory.update_at(index, |c| c.flip(low)),
            Err(index) => {
                self.directory
                    .insert_new_key_value_at(index, key, Container::new().add(low))
            }
        }
    }

    /// Adds every value in `[start, end)`.
    ///
    /// `start == end` is a no-op. Fails if `start > end` or `end > 2^32`.
    pub fn add_range(&mut self, start: u64, end: u64) -> Result<(), Error> {
        check_range(start, end)?;
        if start == end {
            return Ok(());
        }
        for (key, lo, hi) in key_ranges(start, end) {
            match self.directory.get_index(key) {
                Ok(index) => self.directory.update_at(index, |c| c.add_range(lo, hi)),
                Err(index) => self.directory.insert_new_key_value_at(
                    index,
                    key,
                    Container::range_of_ones(lo, hi),
                ),
            }
        }
        Ok(())
    }

    /// Removes every value in `[start, end)`.
    ///
    /// `start == end` is a no-op. Fails if `start > end` or `end > 2^32`.
    pub fn remove_range(&mut self, start: u64, end: u64) -> Result<(), Error> {
        check_range(start, end)?;
        if start == end {
            return Ok(());
        }
        for (key, lo, hi) in key_ranges(start, end) {
            if let Ok(index) = self.directory.get_index(key) {
                self.directory.update_at(index, |c| c.remove_range(lo, hi));
            }
        }
        Ok(())
    }

    /// Toggles every value in `[start, end)`.
    ///
    /// `start == end` is a no-op. Fails if `start > end` or `end > 2^32`.
    pub fn flip_range(&mut self, start: u64, end: u64) -> Result<(), Error> {
        check_range(start, end)?;
        if start == end {
            return Ok(());
        }
        for (key, lo, hi) in key_ranges(start, end) {
            match self.directory.get_index(key) {
                Ok(index) => self.directory.update_at(index, |c| c.flip_range(lo, hi)),
                Err(index) => self.directory.insert_new_key_value_at(
                    index,
                    key,
                    Container::range_of_ones(lo, hi),
                ),
            }
        }
        Ok(())
    }

    /// Iterates over the containers overlapping a non-empty range, with the part of the range
    /// each one covers.
    fn overlapping(&self, start: u64, end: u64) -> impl Iterator<Item = (&Container, u32, u32)> {
        let first = (start >> 16) as u16;
        let last = ((end - 1) >> 16) as u16;
        let from = self.directory.lower_bound(first);
        self.directory
            .iter()
            .skip(from)
            .take_while(move |&(key, _)| key <= last)
            .map(move |(key, container)| {
                let lo = if key == first { (start & 0xFFFF) as u32 } else { 0 };
                let hi = if key == last {
                    ((end - 1) & 0xFFFF) as u32 + 1
                } else {
                    1 << 16
                };
                (container, lo, hi)
            })
    }

    /// Returns whether every value in `[start, end)` is present. Empty ranges are always
    /// contained.
    pub fn contains_range(&self, start: u64, end: u64) -> Result<bool, Error> {
        check_range(start, end)?;
        if start == end {
            return Ok(true);
        }
        let keys = ((end - 1) >> 16) - (start >> 16) + 1;
        let mut seen = 0;
        for (container, lo, hi) in self.overlapping(start, end) {
            if !container.contains_range(lo, hi) {
                return Ok(false);
            }
            seen += 1;
        }
        Ok(seen == keys)
    }

    /// Returns whether any value in `[start, end)` is present.
    pub fn intersects_range(&self, start: u64, end: u64) -> Result<bool, Error> {
        check_range(start, end)?;
        if start == end {
            return Ok(false);
        }
        Ok(self
            .overlapping(start, end)
            .any(|(container, lo, hi)| container.intersects_range(lo, hi)))
    }

    /// Returns the number of values in `[start, end)`.
    pub fn range_cardinality(&self, start: u64, end: u64) -> Result<u64, Error> {
        check_range(start, end)?;
        if start == end {
            return Ok(0);
        }
        Ok(self
            .overlapping(start, end)
            .map(|(container, lo, hi)| container.count_range(lo, hi) as u64)
            .sum())
    }

    /// Returns the smallest value, if any.
    pub fn min(&self) -> Option<u32> {
        let (key, container) = self.directory.iter().next()?;
        container.min().map(|low| combine(key, low))
    }

    /// Returns the largest value, if any.
    pub fn max(&self) -> Option<u32> {
        let (key, container) = self.directory.iter().next_back()?;
        container.max().map(|low| combine(key, low))
    }

    /// Returns the number of values less than or equal to `value`.
    pub fn rank(&self, value: u32) -> u64 {
        let (high, low) = (high_bits(value), low_bits(value));
        let mut rank = 0;
        for (key, container) in self.directory.iter() {
            if key < high {
                rank += container.len() as u64;
                continue;
            }
            if key == high {
                rank += container.rank(low) as u64;
            }
            break;
        }
        rank
    }

    /// Returns the `index`th smallest value (0-based).
    pub fn select(&self, index: u64) -> Result<u32, Error> {
        let mut remaining = index;
        for (key, container) in self.directory.iter() {
            let len = container.len() as u64;
            if remaining < len {
                if let Some(low) = container.select(remaining as u32) {
                    return Ok(combine(key, low));
                }
                break;
            }
            remaining -= len;
        }
        Err(Error::SelectOutOfBounds {
            index,
            cardinality: self.len(),
        })
    }

    /// Returns the smallest value greater than or equal to `value`.
    pub fn next_value(&self, value: u32) -> Option<u32> {
        let (high, low) = (high_bits(value), low_bits(value));
        let from = self.directory.lower_bound(high);
        self.directory.iter().skip(from).find_map(|(key, container)| {
            let found = if key == high {
                container.next_value(low)
            } else {
                container.min()
            };
            found.map(|low| combine(key, low))
        })
    }

    /// Returns the largest value less than or equal to `value`.
    pub fn previous_value(&self, value: u32) -> Option<u32> {
        let (high, low) = (high_bits(value), low_bits(value));
        let until = self.directory.keys().partition_point(|&k| k <= high);
        self.directory
            .iter()
            .take(until)
            .rev()
            .find_map(|(key, container)| {
                let found = if key == high {
                    container.previous_value(low)
                } else {
                    container.max()
                };
                found.map(|low| combine(key, low))
            })
    }

    /// Returns the smallest absent value greater than or equal to `value`.
    pub fn next_absent_value(&self, value: u32) -> Option<u32> {
        let (mut high, mut low) = (high_bits(value), low_bits(value));
        loop {
            let Some(container) = self.directory.get(high) else {
                return Some(combine(high, low));
            };
            if let Some(found) = container.next_absent_value(low) {
                return Some(combine(high, found));
            }
            high = high.checked_add(1)?;
            low = 0;
        }
    }

    /// Returns the largest absent value less than or equal to `value`.
    pub fn previous_absent_value(&self, value: u32) -> Option<u32> {
        let (mut high, mut low) = (high_bits(value), low_bits(value));
        loop {
            let Some(container) = self.directory.get(high) else {
                return Some(combine(high, low));
            };
            if let Some(found) = container.previous_absent_value(low) {
                return Some(combine(high, found));
            }
            high = high.checked_sub(1)?;
            low = u16::MAX;
        }
    }

    /// Returns an iterator over the values in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.directory)
    }

    /// Reports the membership of every value in `[start, start + length)` to `consumer`.
    ///
    /// Value `start + i` is reported at position `i`.
    pub fn for_all_in_range<C: RangeConsumer + ?Sized>(
        &self,
        start: u32,
        length: u32,
        consumer: &mut C,
    ) -> Result<(), Error> {
        let end = start as u64 + length as u64;
        check_range(start as u64, end)?;
        if length == 0 {
            return Ok(());
        }
        let mut index = self.directory.lower_bound(high_bits(start));
        for (key, lo, hi) in key_ranges(start as u64, end) {
            let offset = ((key as u64) << 16 | lo as u64) - start as u64;
            let offset = offset as u32;
            if index < self.directory.len() && self.directory.key_at(index) == key {
                self.directory
                    .container_at(index)
                    .for_all_in_range(lo, hi, offset, consumer);
                index += 1;
            } else {
                consumer.accept_all_absent(offset, offset + (hi - lo));
            }
        }
        Ok(())
    }

    /// Converts containers to runs wherever that is smaller.
    ///
    /// Returns whether any run container remains afterwards.
    pub fn run_optimize(&mut self) -> bool {
        self.directory.map_containers(Container::run_optimize);
        self.has_run_compression()
    }

    /// Converts every run container to an array or bitmap.
    ///
    /// Returns whether any container changed.
    pub fn remove_run_compression(&mut self) -> bool {
        let changed = self.has_run_compression();
        self.directory
            .map_containers(Container::remove_run_compression);
        changed
    }

    /// Returns an estimate of the memory the bitmap occupies, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        8 + self
            .directory
            .containers()
            .iter()
            .map(|c| 2 + c.size_in_bytes())
            .sum::<usize>()
    }

    /// Returns whether any container uses the run representation.
    pub fn has_run_compression(&self) -> bool {
        self.directory
            .containers()
            .iter()
            .any(|c| c.kind() == Kind::Run)
    }

    /// Checks every structural invariant: strictly increasing keys, non-empty containers and
    /// consistent, legal container representations.
    pub fn validate(&self) -> bool {
        if !self.directory.is_valid() {
            debug!(
                containers = self.directory.len(),
                "directory keys out of order or empty container"
            );
            return false;
        }
        for (key, container) in self.directory.iter() {
            if !container.is_valid() {
                debug!(key, kind = ?container.kind(), "invalid container");
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for RoaringBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.len();
        if len <= 16 {
            return f.debug_set().entries(self.iter()).finish();
        }
        write!(
            f,
            "RoaringBitmap<{} values in {} containers, [{}, {}]>",
            len,
            self.directory.len(),
            self.min().unwrap_or_default(),
            self.max().unwrap_or_default()
        )
    }
}

impl FromIterator<u32> for RoaringBitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut bitmap = Self::new();
        bitmap.extend(iter);
        bitmap
    }
}

impl Extend<u32> for RoaringBitmap {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<'a> IntoIterator for &'a RoaringBitmap {
    type Item = u32;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Iterator over the values of a [`RoaringBitmap`] in ascending order.
pub struct Iter<'a> {
    directory: &'a Directory,
    /// Next container to open from the front.
    front_index: usize,
    /// One past the next container to open from the back.
    back_index: usize,
    front: Option<(u16, container::Iter<'a>)>,
    back: Option<(u16, container::Iter<'a>)>,
}

impl<'a> Iter<'a> {
    fn new(directory: &'a Directory) -> Self {
        Self {
            directory,
            front_index: 0,
            back_index: directory.len(),
            front: None,
            back: None,
        }
    }

    /// Skips every value less than `target`. Targets at or before the current position are
    /// ignored.
    pub fn advance_to(&mut self, target: u32) {
        let (high, low) = (high_bits(target), low_bits(target));
        if let Some((key, iter)) = &mut self.front {
            if *key > high {
                return;
            }
            if *key == high {
                iter.advance_to(low);
                return;
            }
            self.front = None;
        }

        let keys = &self.directory.keys()[self.front_index..self.back_index];
        self.front_index += keys.partition_point(|&k| k < high);
        if self.front_index < self.back_index {
            if self.directory.key_at(self.front_index) == high {
                let mut iter = self.directory.container_at(self.front_index).iter();
                iter.advance_to(low);
                self.front = Some((high, iter));
                self.front_index += 1;
            }
            return;
        }

        // Only the container already opened from the back remains.
        if let Some((key, iter)) = &mut self.back {
            if *key < high {
                self.back = None;
            } else if *key == high {
                iter.advance_to(low);
            }
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if let Some((key, iter)) = &mut self.front {
                if let Some(low) = iter.next() {
                    return Some(combine(*key, low));
                }
                self.front = None;
            }
            if self.front_index < self.back_index {
                let index = self.front_index;
                self.front = Some((
                    self.directory.key_at(index),
                    self.directory.container_at(index).iter(),
                ));
                self.front_index += 1;
                continue;
            }
            let (key, iter) = self.back.as_mut()?;
            let key = *key;
            match iter.next() {
                Some(low) => return Some(combine(key, low)),
                None => {
                    self.back = None;
                    return None;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let opened = |side: &Option<(u16, container::Iter<'_>)>| {
            side.as_ref().map_or(0, |(_, iter)| iter.len())
        };
        let middle: usize = self.directory.containers()[self.front_index..self.back_index]
            .iter()
            .map(|c| c.len() as usize)
            .sum();
        let len = opened(&self.front) + middle + opened(&self.back);
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<u32> {
        loop {
            if let Some((key, iter)) = &mut self.back {
                if let Some(low) = iter.next_back() {
                    return Some(combine(*key, low));
                }
                self.back = None;
            }
            if self.front_index < self.back_index {
                self.back_index -= 1;
                let index = self.back_index;
                self.back = Some((
                    self.directory.key_at(index),
                    self.directory.container_at(index).iter(),
                ));
                continue;
            }
            let (key, iter) = self.front.as_mut()?;
            let key = *key;
            match iter.next_back() {
                Some(low) => return Some(combine(key, low)),
                None => {
                    self.front = None;
                    return None;
                }
            }
        }
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_add_remove_contains() {
        let mut bitmap = RoaringBitmap::new();
        assert!(bitmap.is_empty());
        assert!(bitmap.check_add(7));
        assert!(!bitmap.check_add(7));
        bitmap.add(1 << 20);
        bitmap.add(u32::MAX);
        assert_eq!(bitmap.len(), 3);
        assert_eq!(bitmap.container_count(), 3);
        assert!(bitmap.contains(u32::MAX));
        assert!(!bitmap.contains(8));
        assert!(bitmap.check_remove(1 << 20));
        assert!(!bitmap.check_remove(1 << 20));
        assert_eq!(bitmap.container_count(), 2);
        bitmap.remove(7);
        bitmap.remove(u32::MAX);
        assert!(bitmap.is_empty());
        assert!(bitmap.validate());
    }

    #[test_case(0, 0; "empty")]
    #[test_case(0, 1; "single")]
    #[test_case(65530, 65542; "crosses key")]
    #[test_case(10, 300_000; "many keys")]
    #[test_case(MAX_RANGE_END - 5, MAX_RANGE_END; "top of range")]
    fn test_add_range(start: u64, end: u64) {
        let mut bitmap = RoaringBitmap::new();
        bitmap.add_range(start, end).unwrap();
        assert_eq!(bitmap.len(), end - start);
        assert!(bitmap.contains_range(start, end).unwrap());
        assert_eq!(bitmap.range_cardinality(start, end).unwrap(), end - start);
        if start < end {
            assert_eq!(bitmap.min(), Some(start as u32));
            assert_eq!(bitmap.max(), Some((end - 1) as u32));
        }
        assert!(bitmap.validate());
        bitmap.remove_range(start, end).unwrap();
        assert!(bitmap.is_empty());
    }

    #[test]
    fn test_invalid_ranges() {
        let mut bitmap = RoaringBitmap::new();
        assert_eq!(
            bitmap.add_range(5, 4),
            Err(Error::InvalidRange { start: 5, end: 4 })
        );
        assert!(bitmap.remove_range(0, MAX_RANGE_END + 1).is_err());
        assert!(bitmap.flip_range(2, 1).is_err());
        assert!(bitmap.contains_range(2, 1).is_err());
        assert!(bitmap.for_all_in_range(u32::MAX, 2, &mut Vec::<u32>::new()).is_err());
        assert!(bitmap.is_empty());
    }

    #[test]
    fn test_range_queries() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.add_range(100, 200).unwrap();
        bitmap.add_range(70_000, 70_010).unwrap();
        assert!(bitmap.contains_range(150, 200).unwrap());
        assert!(!bitmap.contains_range(150, 201).unwrap());
        assert!(!bitmap.contains_range(150, 70_005).unwrap());
        assert!(bitmap.intersects_range(199, 70_000).unwrap());
        assert!(!bitmap.intersects_range(200, 70_000).unwrap());
        assert_eq!(bitmap.range_cardinality(150, 70_005).unwrap(), 55);
        assert!(bitmap.contains_range(3, 3).unwrap());
    }

    #[test]
    fn test_flip_range() {
        let mut bitmap = RoaringBitmap::from_range(0, 10).unwrap();
        bitmap.flip_range(5, 70_000).unwrap();
        assert_eq!(bitmap.len(), 5 + 70_000 - 10);
        assert!(!bitmap.contains(5));
        assert!(bitmap.contains(69_999));
        bitmap.flip_range(0, 70_000).unwrap();
        assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9]);
        bitmap.flip(5);
        bitmap.flip(1 << 30);
        assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![6, 7, 8, 9, 1 << 30]);
    }

    #[test]
    fn test_rank_select() {
        let bitmap: RoaringBitmap = [1, 5, 65_536, 65_540, 1 << 31].into_iter().collect();
        assert_eq!(bitmap.rank(0), 0);
        assert_eq!(bitmap.rank(5), 2);
        assert_eq!(bitmap.rank(65_537), 3);
        assert_eq!(bitmap.rank(u32::MAX), 5);
        for i in 0..bitmap.len() {
            let value = bitmap.select(i).unwrap();
            assert_eq!(bitmap.rank(value), i + 1);
        }
        assert_eq!(
            bitmap.select(5),
            Err(Error::SelectOutOfBounds {
                index: 5,
                cardinality: 5
            })
        );
    }

    #[test]
    fn test_navigation() {
        let mut bitmap: RoaringBitmap = [10, 20, 1 << 20].into_iter().collect();
        assert_eq!(bitmap.next_value(0), Some(10));
        assert_eq!(bitmap.next_value(21), Some(1 << 20));
        assert_eq!(bitmap.next_value((1 << 20) + 1), None);
        assert_eq!(bitmap.previous_value(9), None);
        assert_eq!(bitmap.previous_value(1 << 19), Some(20));
        assert_eq!(bitmap.next_absent_value(10), Some(11));
        assert_eq!(bitmap.previous_absent_value(10), Some(9));

        bitmap.add_range(0, 1 << 17).unwrap();
        assert_eq!(bitmap.next_absent_value(5), Some(1 << 17));
        assert_eq!(bitmap.previous_absent_value(5), None);

        let full = RoaringBitmap::from_range(0, MAX_RANGE_END).unwrap();
        assert_eq!(full.next_absent_value(0), None);
        assert_eq!(full.len(), MAX_RANGE_END);
    }

    #[test]
    fn test_iter_both_directions() {
        let values = [0, 3, 65_535, 65_536, 200_000, u32::MAX];
        let bitmap: RoaringBitmap = values.into_iter().collect();
        assert_eq!(bitmap.iter().collect::<Vec<_>>(), values);
        assert_eq!(
            bitmap.iter().rev().collect::<Vec<_>>(),
            values.iter().rev().copied().collect::<Vec<_>>()
        );

        let mut iter = bitmap.iter();
        assert_eq!(iter.len(), 6);
        assert_eq!(iter.next(), Some(0));
        assert_eq!(iter.next_back(), Some(u32::MAX));
        assert_eq!(iter.next_back(), Some(200_000));
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some(3));
        assert_eq!(iter.next(), Some(65_535));
        assert_eq!(iter.next(), Some(65_536));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn test_iter_advance_to() {
        let bitmap: RoaringBitmap = [1, 70_000, 70_005, 300_000].into_iter().collect();
        let mut iter = bitmap.iter();
        iter.advance_to(70_001);
        assert_eq!(iter.next(), Some(70_005));
        iter.advance_to(2);
        assert_eq!(iter.next(), Some(300_000));
        iter.advance_to(u32::MAX);
        assert_eq!(iter.next(), None);

        let mut iter = bitmap.iter();
        assert_eq!(iter.next_back(), Some(300_000));
        iter.advance_to(70_003);
        assert_eq!(iter.next(), Some(70_005));
        assert_eq!(iter.next(), None);
    }

    #[derive(Default)]
    struct Bits(Vec<bool>);

    impl RangeConsumer for Bits {
        fn accept_present(&mut self, position: u32) {
            assert_eq!(position as usize, self.0.len());
            self.0.push(true);
        }

        fn accept_absent(&mut self, position: u32) {
            assert_eq!(position as usize, self.0.len());
            self.0.push(false);
        }
    }

    impl RangeConsumer for Vec<u32> {
        fn accept_present(&mut self, position: u32) {
            self.push(position);
        }

        fn accept_absent(&mut self, _position: u32) {}
    }

    #[test]
    fn test_for_all_in_range() {
        let mut bitmap: RoaringBitmap = [65_534, 65_536, 131_073].into_iter().collect();
        bitmap.add_range(65_540, 65_543).unwrap();
        let mut bits = Bits::default();
        bitmap.for_all_in_range(65_533, 200_000 - 65_533, &mut bits).unwrap();
        assert_eq!(bits.0.len(), 200_000 - 65_533);
        let present: Vec<u32> = bits
            .0
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(|(i, _)| i as u32 + 65_533)
            .collect();
        assert_eq!(present, bitmap.iter().collect::<Vec<_>>());

        let mut positions = Vec::new();
        bitmap.for_all_in_range(65_536, 5, &mut positions).unwrap();
        assert_eq!(positions, vec![0, 4]);
    }

    #[test]
    fn test_run_optimize() {
        let mut bitmap = RoaringBitmap::new();
        for v in 64..=128 {
            bitmap.add(v);
        }
        bitmap.add(1 << 20);
        let before = bitmap.clone();
        assert!(!bitmap.has_run_compression());
        assert!(bitmap.run_optimize());
        assert_eq!(bitmap.container(0).map(|c| c.kind()), Some(Kind::Run));
        assert_eq!(bitmap, before);
        assert!(bitmap.iter().eq(before.iter()));
        assert!(bitmap.remove_run_compression());
        assert!(!bitmap.remove_run_compression());
        assert_eq!(bitmap.container(0).map(|c| c.kind()), Some(Kind::Array));
        assert!(bitmap.validate());
    }

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(RoaringBitmap::new().size_in_bytes(), 8);
        let sparse: RoaringBitmap = [1, 2, 3].into_iter().collect();
        assert_eq!(sparse.size_in_bytes(), 8 + 2 + 6 + 4);
        let mut dense = RoaringBitmap::from_range(0, 10_000).unwrap();
        assert_eq!(dense.size_in_bytes(), 8 + 2 + 4 + 4);
        dense.remove_run_compression();
        assert_eq!(dense.size_in_bytes(), 8 + 2 + 8192);
    }

    #[test]
    fn test_debug() {
        let bitmap: RoaringBitmap = [1, 2].into_iter().collect();
        assert_eq!(format!("{bitmap:?}"), "{1, 2}");
        let bitmap = RoaringBitmap::from_range(0, 100).unwrap();
        assert_eq!(
            format!("{bitmap:?}"),
            "RoaringBitmap<100 values in 1 containers, [0, 99]>"
        );
    }
}
