//! Bitmap container for dense data.
//!
//! Stores all 65536 possible values of a container as a fixed array of 1024 words and tracks
//! its cardinality incrementally, so `len` never requires a popcount.

use super::{array::Array, policy::BITMAP_WORDS};
use core::fmt;

/// Number of 64-bit words in a bitmap container.
pub const WORDS: usize = BITMAP_WORDS;

/// Number of bits in a bitmap container.
const BITS: u32 = (WORDS * 64) as u32;

/// Number of words scanned between early-exit checks when bounding the run count.
const RUN_BLOCK_WORDS: usize = 128;

/// A container that stores values as a 65536-bit vector.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Bitmap {
    words: [u64; WORDS],
    len: u32,
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap").field("len", &self.len).finish()
    }
}

/// Calls `f(word_index, mask)` for every word overlapping `[start, end)`.
#[inline]
fn for_each_mask(start: u32, end: u32, mut f: impl FnMut(usize, u64)) {
    if start >= end {
        return;
    }
    let first = (start / 64) as usize;
    let last = ((end - 1) / 64) as usize;
    let first_mask = u64::MAX << (start % 64);
    let last_mask = u64::MAX >> (63 - (end - 1) % 64);
    if first == last {
        f(first, first_mask & last_mask);
        return;
    }
    f(first, first_mask);
    for i in first + 1..last {
        f(i, u64::MAX);
    }
    f(last, last_mask);
}

/// Returns the position of the `n`th set bit of `word` (0-based).
#[inline]
fn select_in_word(mut word: u64, n: u32) -> u32 {
    for _ in 0..n {
        word &= word - 1;
    }
    word.trailing_zeros()
}

impl Bitmap {
    /// Creates an empty bitmap container.
    pub const fn new() -> Self {
        Self {
            words: [0; WORDS],
            len: 0,
        }
    }

    /// Creates a bitmap container with every value set.
    pub const fn full() -> Self {
        Self {
            words: [u64::MAX; WORDS],
            len: BITS,
        }
    }

    /// Creates a bitmap container from raw words, computing the cardinality.
    pub fn from_words(words: [u64; WORDS]) -> Self {
        let len = words.iter().map(|w| w.count_ones()).sum();
        Self { words, len }
    }

    /// Creates a bitmap container holding the values of an array container.
    pub fn from_array(array: &Array) -> Self {
        let mut bitmap = Self::new();
        for v in array.iter() {
            bitmap.words[(v >> 6) as usize] |= 1 << (v & 63);
        }
        bitmap.len = array.len();
        bitmap
    }

    /// Returns the raw words.
    #[inline]
    pub fn words(&self) -> &[u64; WORDS] {
        &self.words
    }

    /// Returns the number of values in the container.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Returns whether the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns whether every value is set.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == BITS
    }

    /// Checks if the container contains the given value.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.words[(value >> 6) as usize] & (1 << (value & 63)) != 0
    }

    /// Sets a value, returning `true` if it was not already set.
    #[inline]
    pub fn insert(&mut self, value: u16) -> bool {
        let word = &mut self.words[(value >> 6) as usize];
        let mask = 1u64 << (value & 63);
        let inserted = *word & mask == 0;
        *word |= mask;
        self.len += inserted as u32;
        inserted
    }

    /// Clears a value, returning `true` if it was set.
    #[inline]
    pub fn remove(&mut self, value: u16) -> bool {
        let word = &mut self.words[(value >> 6) as usize];
        let mask = 1u64 << (value & 63);
        let removed = *word & mask != 0;
        *word &= !mask;
        self.len -= removed as u32;
        removed
    }

    /// Toggles a value, returning `true` if it is now set.
    #[inline]
    pub fn flip(&mut self, value: u16) -> bool {
        let word = &mut self.words[(value >> 6) as usize];
        let mask = 1u64 << (value & 63);
        *word ^= mask;
        let set = *word & mask != 0;
        if set {
            self.len += 1;
        } else {
            self.len -= 1;
        }
        set
    }

    /// Sets every value in `[start, end)`, returning the number of values newly set.
    pub fn insert_range(&mut self, start: u32, end: u32) -> u32 {
        let mut added = 0;
        for_each_mask(start, end, |i, mask| {
            added += (!self.words[i] & mask).count_ones();
            self.words[i] |= mask;
        });
        self.len += added;
        added
    }

    /// Clears every value in `[start, end)`, returning the number of values removed.
    pub fn remove_range(&mut self, start: u32, end: u32) -> u32 {
        let mut removed = 0;
        for_each_mask(start, end, |i, mask| {
            removed += (self.words[i] & mask).count_ones();
            self.words[i] &= !mask;
        });
        self.len -= removed;
        removed
    }

    /// Toggles every value in `[start, end)`.
    pub fn flip_range(&mut self, start: u32, end: u32) {
        let mut len = self.len as i64;
        for_each_mask(start, end, |i, mask| {
            len -= (self.words[i] & mask).count_ones() as i64;
            self.words[i] ^= mask;
            len += (self.words[i] & mask).count_ones() as i64;
        });
        self.len = len as u32;
    }

    /// Returns the number of values in `[start, end)`.
    pub fn count_range(&self, start: u32, end: u32) -> u32 {
        let mut count = 0;
        for_each_mask(start, end, |i, mask| {
            count += (self.words[i] & mask).count_ones();
        });
        count
    }

    /// Returns whether every value in `[start, end)` is set.
    pub fn contains_range(&self, start: u32, end: u32) -> bool {
        let mut all = true;
        for_each_mask(start, end, |i, mask| {
            all &= self.words[i] & mask == mask;
        });
        all
    }

    /// Sets every value in `[start, end)` without maintaining the cardinality.
    pub(crate) fn insert_range_lazy(&mut self, start: u32, end: u32) {
        for_each_mask(start, end, |i, mask| self.words[i] |= mask);
    }

    /// Sets a value without maintaining the cardinality.
    #[inline]
    pub(crate) fn insert_lazy(&mut self, value: u16) {
        self.words[(value >> 6) as usize] |= 1 << (value & 63);
    }

    /// Unions `other` into this bitmap without maintaining the cardinality.
    pub(crate) fn or_lazy(&mut self, other: &Self) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
    }

    /// Recomputes the cardinality after lazy updates.
    pub(crate) fn repair(&mut self) {
        self.len = self.words.iter().map(|w| w.count_ones()).sum();
    }

    /// Returns the number of values less than or equal to `value`.
    pub fn rank(&self, value: u16) -> u32 {
        let index = (value >> 6) as usize;
        let below: u32 = self.words[..index].iter().map(|w| w.count_ones()).sum();
        let mask = u64::MAX >> (63 - (value & 63));
        below + (self.words[index] & mask).count_ones()
    }

    /// Returns the `n`th smallest value (0-based).
    pub fn select(&self, mut n: u32) -> Option<u16> {
        if n >= self.len {
            return None;
        }
        for (i, &word) in self.words.iter().enumerate() {
            let ones = word.count_ones();
            if n < ones {
                return Some((i as u32 * 64 + select_in_word(word, n)) as u16);
            }
            n -= ones;
        }
        None
    }

    /// Returns the smallest value in the container, if any.
    pub fn min(&self) -> Option<u16> {
        self.next_value(0)
    }

    /// Returns the largest value in the container, if any.
    pub fn max(&self) -> Option<u16> {
        self.previous_value(u16::MAX)
    }

    /// Returns the smallest set value greater than or equal to `value`.
    pub fn next_value(&self, value: u16) -> Option<u16> {
        let mut index = (value >> 6) as usize;
        let mut word = self.words[index] & (u64::MAX << (value & 63));
        loop {
            if word != 0 {
                return Some((index as u32 * 64 + word.trailing_zeros()) as u16);
            }
            index += 1;
            if index == WORDS {
                return None;
            }
            word = self.words[index];
        }
    }

    /// Returns the largest set value less than or equal to `value`.
    pub fn previous_value(&self, value: u16) -> Option<u16> {
        let mut index = (value >> 6) as usize;
        let mut word = self.words[index] & (u64::MAX >> (63 - (value & 63)));
        loop {
            if word != 0 {
                return Some((index as u32 * 64 + 63 - word.leading_zeros()) as u16);
            }
            index = index.checked_sub(1)?;
            word = self.words[index];
        }
    }

    /// Returns the smallest unset value greater than or equal to `value`.
    pub fn next_absent_value(&self, value: u16) -> Option<u16> {
        let mut index = (value >> 6) as usize;
        let mut word = !self.words[index] & (u64::MAX << (value & 63));
        loop {
            if word != 0 {
                return Some((index as u32 * 64 + word.trailing_zeros()) as u16);
            }
            index += 1;
            if index == WORDS {
                return None;
            }
            word = !self.words[index];
        }
    }

    /// Returns the largest unset value less than or equal to `value`.
    pub fn previous_absent_value(&self, value: u16) -> Option<u16> {
        let mut index = (value >> 6) as usize;
        let mut word = !self.words[index] & (u64::MAX >> (63 - (value & 63)));
        loop {
            if word != 0 {
                return Some((index as u32 * 64 + 63 - word.leading_zeros()) as u16);
            }
            index = index.checked_sub(1)?;
            word = !self.words[index];
        }
    }

    /// Returns the exact number of runs of consecutive set values.
    pub fn number_of_runs(&self) -> usize {
        let mut runs = 0usize;
        for i in 0..WORDS - 1 {
            let word = self.words[i];
            let next = self.words[i + 1];
            runs += (!word & (word << 1)).count_ones() as usize;
            runs += ((word >> 63) & !next) as usize;
        }
        let last = self.words[WORDS - 1];
        runs += (!last & (last << 1)).count_ones() as usize;
        runs += (last >> 63) as usize;
        runs
    }

    /// Returns a lower bound on the number of runs.
    ///
    /// Runs ending on a word boundary are not counted. Scanning stops as soon as the bound
    /// exceeds `limit`.
    pub fn number_of_runs_lower_bound(&self, limit: usize) -> usize {
        let mut runs = 0usize;
        for block in self.words.chunks(RUN_BLOCK_WORDS) {
            for &word in block {
                runs += (!word & (word << 1)).count_ones() as usize;
            }
            if runs > limit {
                return runs;
            }
        }
        runs
    }

    /// Converts to an array container.
    pub fn to_array(&self) -> Array {
        let mut values = Vec::with_capacity(self.len as usize);
        values.extend(self.iter());
        Array::from_sorted_vec(values)
    }

    /// Returns an iterator over the set values in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            words: &self.words,
            front: 0,
            back: BITS,
            remaining: self.len,
        }
    }

    /// Returns whether the stored cardinality matches the popcount of the words.
    pub fn is_consistent(&self) -> bool {
        self.len == self.words.iter().map(|w| w.count_ones()).sum::<u32>()
    }

    /// Returns the union of two bitmaps.
    pub fn or_new(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.or_assign(other);
        result
    }

    /// Returns the intersection of two bitmaps.
    pub fn and_new(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.and_assign(other);
        result
    }

    /// Returns `self - other`.
    pub fn and_not_new(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.and_not_assign(other);
        result
    }

    /// Returns the symmetric difference of two bitmaps.
    pub fn xor_new(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.xor_assign(other);
        result
    }

    /// Unions `other` into this bitmap.
    pub fn or_assign(&mut self, other: &Self) {
        let mut len = 0;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
            len += a.count_ones();
        }
        self.len = len;
    }

    /// Intersects this bitmap with `other`.
    pub fn and_assign(&mut self, other: &Self) {
        let mut len = 0;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= *b;
            len += a.count_ones();
        }
        self.len = len;
    }

    /// Removes the values of `other` from this bitmap.
    pub fn and_not_assign(&mut self, other: &Self) {
        let mut len = 0;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= !*b;
            len += a.count_ones();
        }
        self.len = len;
    }

    /// Replaces this bitmap with the symmetric difference of itself and `other`.
    pub fn xor_assign(&mut self, other: &Self) {
        let mut len = 0;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a ^= *b;
            len += a.count_ones();
        }
        self.len = len;
    }

    /// Returns the cardinality of the intersection without materializing it.
    pub fn and_len(&self, other: &Self) -> u32 {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones())
            .sum()
    }

    /// Returns whether the two bitmaps share at least one value.
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Returns the values that fall inside any of the half-open `ranges`.
    pub(crate) fn retain_ranges(&self, ranges: impl Iterator<Item = (u32, u32)>) -> Self {
        let mut result = Self::new();
        let mut len = 0;
        for (start, end) in ranges {
            for_each_mask(start, end, |i, mask| {
                let word = self.words[i] & mask;
                result.words[i] |= word;
                len += word.count_ones();
            });
        }
        result.len = len;
        result
    }

    /// Returns whether any value in `[start, end)` is set.
    pub fn intersects_range(&self, start: u32, end: u32) -> bool {
        let mut any = false;
        for_each_mask(start, end, |i, mask| {
            any |= self.words[i] & mask != 0;
        });
        any
    }
}

/// Iterator over the set values of a [`Bitmap`].
pub struct Iter<'a> {
    words: &'a [u64; WORDS],
    /// Smallest position not yet yielded from the front.
    front: u32,
    /// One past the largest position not yet yielded from the back.
    back: u32,
    remaining: u32,
}

impl Iter<'_> {
    /// Skips every value less than `target`.
    pub fn advance_to(&mut self, target: u16) {
        let target = target as u32;
        if target <= self.front || self.remaining == 0 {
            return;
        }
        let end = target.min(self.back);
        let mut skipped = 0;
        for_each_mask(self.front, end, |i, mask| {
            skipped += (self.words[i] & mask).count_ones();
        });
        self.remaining -= skipped;
        self.front = end;
    }
}

impl Iterator for Iter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        let mut index = (self.front / 64) as usize;
        let mut word = self.words[index] & (u64::MAX << (self.front % 64));
        while word == 0 {
            index += 1;
            word = self.words[index];
        }
        let value = index as u32 * 64 + word.trailing_zeros();
        self.front = value + 1;
        self.remaining -= 1;
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
        let last = self.back - 1;
        let mut index = (last / 64) as usize;
        let mut word = self.words[index] & (u64::MAX >> (63 - last % 64));
        while word == 0 {
            index -= 1;
            word = self.words[index];
        }
        let value = index as u32 * 64 + 63 - word.leading_zeros();
        self.back = value;
        self.remaining -= 1;
        Some(value as u16)
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_insert_remove_flip() {
        let mut b = Bitmap::new();
        assert!(b.insert(70));
        assert!(!b.insert(70));
        assert!(b.contains(70));
        assert_eq!(b.len(), 1);
        assert!(!b.flip(70));
        assert!(b.is_empty());
        assert!(b.flip(3));
        assert!(b.remove(3));
        assert!(!b.remove(3));
        assert!(b.is_consistent());
    }

    #[test_case(0, 64; "one word")]
    #[test_case(5, 6; "single bit")]
    #[test_case(63, 65; "word boundary")]
    #[test_case(100, 5000; "many words")]
    #[test_case(0, 65536; "everything")]
    fn test_ranges(start: u32, end: u32) {
        let mut b = Bitmap::new();
        assert_eq!(b.insert_range(start, end), end - start);
        assert_eq!(b.len(), end - start);
        assert_eq!(b.count_range(start, end), end - start);
        assert!(b.contains_range(start, end));
        assert_eq!(b.insert_range(start, end), 0);
        assert_eq!(b.min(), Some(start as u16));
        assert_eq!(b.max(), Some((end - 1) as u16));
        assert_eq!(b.number_of_runs(), 1);
        b.flip_range(start, end);
        assert!(b.is_empty());
        b.insert_range(start, end);
        assert_eq!(b.remove_range(start, end), end - start);
        assert!(b.is_empty());
        assert!(b.is_consistent());
    }

    #[test]
    fn test_rank_select() {
        let mut b = Bitmap::new();
        for v in (0..65535u32).step_by(7) {
            b.insert(v as u16);
        }
        for (i, v) in b.iter().enumerate() {
            assert_eq!(b.select(i as u32), Some(v));
            assert_eq!(b.rank(v), i as u32 + 1);
        }
        assert_eq!(b.select(b.len()), None);
    }

    #[test]
    fn test_navigation() {
        let mut b = Bitmap::new();
        b.insert_range(100, 200);
        b.insert(65535);
        assert_eq!(b.next_value(0), Some(100));
        assert_eq!(b.next_value(200), Some(65535));
        assert_eq!(b.previous_value(99), None);
        assert_eq!(b.previous_value(1000), Some(199));
        assert_eq!(b.next_absent_value(100), Some(200));
        assert_eq!(b.next_absent_value(65535), None);
        assert_eq!(b.previous_absent_value(150), Some(99));
        assert_eq!(Bitmap::full().previous_absent_value(u16::MAX), None);
    }

    #[test]
    fn test_number_of_runs() {
        let mut b = Bitmap::new();
        assert_eq!(b.number_of_runs(), 0);
        b.insert_range(0, 10);
        b.insert_range(60, 70);
        b.insert_range(127, 129);
        b.insert(65535);
        assert_eq!(b.number_of_runs(), 4);
        assert!(b.number_of_runs_lower_bound(usize::MAX) <= 4);
        assert_eq!(Bitmap::full().number_of_runs(), 1);
    }

    #[test]
    fn test_iter_both_ends() {
        let mut b = Bitmap::new();
        b.insert_range(10, 15);
        b.insert(64);
        let mut iter = b.iter();
        assert_eq!(iter.len(), 6);
        assert_eq!(iter.next(), Some(10));
        assert_eq!(iter.next_back(), Some(64));
        assert_eq!(iter.next_back(), Some(14));
        assert_eq!(iter.collect::<Vec<_>>(), vec![11, 12, 13]);

        let mut iter = b.iter();
        iter.advance_to(13);
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some(13));
        iter.advance_to(2);
        assert_eq!(iter.next(), Some(14));
    }

    #[test]
    fn test_word_operations() {
        let mut a = Bitmap::new();
        a.insert_range(0, 100);
        let mut b = Bitmap::new();
        b.insert_range(50, 150);
        assert_eq!(a.or_new(&b).len(), 150);
        assert_eq!(a.and_new(&b).len(), 50);
        assert_eq!(a.and_len(&b), 50);
        assert_eq!(a.and_not_new(&b).len(), 50);
        assert_eq!(a.xor_new(&b).len(), 100);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_lazy_repair() {
        let mut a = Bitmap::new();
        a.insert_range_lazy(0, 10);
        a.insert_lazy(20);
        assert!(!a.is_consistent());
        a.repair();
        assert_eq!(a.len(), 11);
    }
}
