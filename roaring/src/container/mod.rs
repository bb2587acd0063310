//! Containers hold the low 16 bits of every value sharing one high 16-bit key.
//!
//! ```text
//!                     cardinality
//!        0 ........... 4096 ......................... 65536
//!        |-- Array ----|------------ Bitmap -------------|
//!
//!        Run replaces either one when `run_optimize` finds it strictly smaller.
//! ```
//!
//! Every mutation takes the container by value and returns the (possibly different) container
//! that now holds the result. Conversions follow [`policy`].

pub mod array;
pub mod bitmap;
mod ops;
pub mod policy;
pub mod run;

pub use array::Array;
pub use bitmap::Bitmap;
pub use ops::{Lazy, Unrepaired};
pub use policy::Kind;
pub use run::Run;

use policy::{ARRAY_MAX_CARDINALITY, BITMAP_SIZE, CONTAINER_CAPACITY};
use tracing::debug;

/// Receives the membership of every position in a range, in ascending order.
///
/// Positions are relative to the start of the visited range.
pub trait RangeConsumer {
    /// Called for a position whose value is present.
    fn accept_present(&mut self, position: u32);

    /// Called for a position whose value is absent.
    fn accept_absent(&mut self, position: u32);

    /// Called for every position in `[start, end)` when all of them are present.
    fn accept_all_present(&mut self, start: u32, end: u32) {
        for position in start..end {
            self.accept_present(position);
        }
    }

    /// Called for every position in `[start, end)` when all of them are absent.
    fn accept_all_absent(&mut self, start: u32, end: u32) {
        for position in start..end {
            self.accept_absent(position);
        }
    }
}

/// The values of one 16-bit key, in one of three representations.
#[derive(Clone, Debug)]
pub enum Container {
    Array(Array),
    Bitmap(Box<Bitmap>),
    Run(Run),
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Bitmap(a), Self::Bitmap(b)) => a == b,
            (Self::Run(a), Self::Run(b)) => a == b,
            _ => self.len() == other.len() && self.iter().eq(other.iter()),
        }
    }
}

impl Eq for Container {}

impl Container {
    /// Creates an empty container.
    pub const fn new() -> Self {
        Self::Array(Array::new())
    }

    /// Creates a container holding all 65536 values.
    pub fn full() -> Self {
        Self::Run(Run::full())
    }

    /// Creates a container holding every value in `[start, end)`.
    pub fn range_of_ones(start: u32, end: u32) -> Self {
        debug_assert!(start <= end && end <= CONTAINER_CAPACITY);
        match policy::range_kind(end.saturating_sub(start)) {
            Kind::Array => Self::Array(Array::from_range(start, end)),
            _ => Self::Run(Run::from_range(start, end)),
        }
    }

    /// Wraps an array, converting it to a bitmap if it exceeds the array threshold.
    pub fn from_array(array: Array) -> Self {
        if array.len() > ARRAY_MAX_CARDINALITY {
            Self::Bitmap(Box::new(Bitmap::from_array(&array)))
        } else {
            Self::Array(array)
        }
    }

    /// Wraps a bitmap, converting it to an array if it fits under the array threshold.
    pub fn from_bitmap(bitmap: Bitmap) -> Self {
        Self::from_boxed_bitmap(Box::new(bitmap))
    }

    pub(crate) fn from_boxed_bitmap(bitmap: Box<Bitmap>) -> Self {
        if bitmap.len() <= ARRAY_MAX_CARDINALITY {
            Self::Array(bitmap.to_array())
        } else {
            Self::Bitmap(bitmap)
        }
    }

    /// Wraps a run container, converting it if another representation is smaller.
    pub fn from_run(run: Run) -> Self {
        Self::Run(run).to_efficient()
    }

    /// Returns the representation in use.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Array(_) => Kind::Array,
            Self::Bitmap(_) => Kind::Bitmap,
            Self::Run(_) => Kind::Run,
        }
    }

    /// Returns the number of values in the container.
    #[inline]
    pub fn len(&self) -> u32 {
        match self {
            Self::Array(a) => a.len(),
            Self::Bitmap(b) => b.len(),
            Self::Run(r) => r.len(),
        }
    }

    /// Returns whether the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether the container holds all 65536 values.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == CONTAINER_CAPACITY
    }

    /// Checks if the container contains the given value.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        match self {
            Self::Array(a) => a.contains(value),
            Self::Bitmap(b) => b.contains(value),
            Self::Run(r) => r.contains(value),
        }
    }

    /// Returns the number of values in `[start, end)`.
    pub fn count_range(&self, start: u32, end: u32) -> u32 {
        match self {
            Self::Array(a) => a.count_range(start, end),
            Self::Bitmap(b) => b.count_range(start, end),
            Self::Run(r) => r.count_range(start, end),
        }
    }

    /// Returns whether every value in `[start, end)` is present.
    pub fn contains_range(&self, start: u32, end: u32) -> bool {
        match self {
            Self::Run(r) => r.contains_range(start, end),
            Self::Bitmap(b) => b.contains_range(start, end),
            Self::Array(a) => a.count_range(start, end) == end.saturating_sub(start),
        }
    }

    /// Returns whether any value in `[start, end)` is present.
    pub fn intersects_range(&self, start: u32, end: u32) -> bool {
        match self {
            Self::Run(r) => r.intersects_range(start, end),
            Self::Bitmap(b) => b.intersects_range(start, end),
            Self::Array(a) => a.count_range(start, end) > 0,
        }
    }

    /// Adds a value.
    pub fn add(self, value: u16) -> Self {
        match self {
            Self::Array(mut a) => {
                if a.is_full() && !a.contains(value) {
                    let mut bitmap = Bitmap::from_array(&a);
                    bitmap.insert(value);
                    return Self::Bitmap(Box::new(bitmap));
                }
                a.insert(value);
                Self::Array(a)
            }
            Self::Bitmap(mut b) => {
                b.insert(value);
                Self::Bitmap(b)
            }
            Self::Run(mut r) => {
                if !r.insert(value) {
                    return Self::Run(r);
                }
                Self::Run(r).to_efficient()
            }
        }
    }

    /// Removes a value.
    pub fn remove(self, value: u16) -> Self {
        match self {
            Self::Array(mut a) => {
                a.remove(value);
                Self::Array(a)
            }
            Self::Bitmap(mut b) => {
                if !b.remove(value) {
                    return Self::Bitmap(b);
                }
                Self::from_boxed_bitmap(b)
            }
            Self::Run(mut r) => {
                if !r.remove(value) {
                    return Self::Run(r);
                }
                Self::Run(r).to_efficient()
            }
        }
    }

    /// Toggles a value.
    pub fn flip(self, value: u16) -> Self {
        match self {
            Self::Bitmap(mut b) => {
                b.flip(value);
                Self::from_boxed_bitmap(b)
            }
            other if other.contains(value) => other.remove(value),
            other => other.add(value),
        }
    }

    /// Adds every value in `[start, end)`.
    pub fn add_range(self, start: u32, end: u32) -> Self {
        debug_assert!(end <= CONTAINER_CAPACITY);
        if start >= end {
            return self;
        }
        match self {
            Self::Array(mut a) => {
                let len = a.len() + (end - start) - a.count_range(start, end);
                if len > ARRAY_MAX_CARDINALITY {
                    let mut bitmap = Bitmap::from_array(&a);
                    bitmap.insert_range(start, end);
                    return Self::Bitmap(Box::new(bitmap));
                }
                a.insert_range(start, end);
                Self::Array(a)
            }
            Self::Bitmap(mut b) => {
                b.insert_range(start, end);
                Self::Bitmap(b)
            }
            Self::Run(mut r) => {
                r.insert_range(start, end);
                Self::Run(r).to_efficient()
            }
        }
    }

    /// Removes every value in `[start, end)`.
    pub fn remove_range(self, start: u32, end: u32) -> Self {
        debug_assert!(end <= CONTAINER_CAPACITY);
        if start >= end {
            return self;
        }
        match self {
            Self::Array(mut a) => {
                a.remove_range(start, end);
                Self::Array(a)
            }
            Self::Bitmap(mut b) => {
                b.remove_range(start, end);
                Self::from_boxed_bitmap(b)
            }
            Self::Run(mut r) => {
                r.remove_range(start, end);
                Self::Run(r).to_efficient()
            }
        }
    }

    /// Toggles every value in `[start, end)`.
    pub fn flip_range(self, start: u32, end: u32) -> Self {
        if start >= end {
            return self;
        }
        match self {
            Self::Bitmap(mut b) => {
                b.flip_range(start, end);
                Self::from_boxed_bitmap(b)
            }
            other => other.xor(&Self::range_of_ones(start, end)),
        }
    }

    /// Returns the number of values less than or equal to `value`.
    pub fn rank(&self, value: u16) -> u32 {
        match self {
            Self::Array(a) => a.rank(value),
            Self::Bitmap(b) => b.rank(value),
            Self::Run(r) => r.rank(value),
        }
    }

    /// Returns the `n`th smallest value (0-based).
    pub fn select(&self, n: u32) -> Option<u16> {
        match self {
            Self::Array(a) => a.select(n),
            Self::Bitmap(b) => b.select(n),
            Self::Run(r) => r.select(n),
        }
    }

    /// Returns the smallest value, if any.
    pub fn min(&self) -> Option<u16> {
        match self {
            Self::Array(a) => a.min(),
            Self::Bitmap(b) => b.min(),
            Self::Run(r) => r.min(),
        }
    }

    /// Returns the largest value, if any.
    pub fn max(&self) -> Option<u16> {
        match self {
            Self::Array(a) => a.max(),
            Self::Bitmap(b) => b.max(),
            Self::Run(r) => r.max(),
        }
    }

    /// Returns the smallest value greater than or equal to `value`.
    pub fn next_value(&self, value: u16) -> Option<u16> {
        match self {
            Self::Array(a) => a.next_value(value),
            Self::Bitmap(b) => b.next_value(value),
            Self::Run(r) => r.next_value(value),
        }
    }

    /// Returns the largest value less than or equal to `value`.
    pub fn previous_value(&self, value: u16) -> Option<u16> {
        match self {
            Self::Array(a) => a.previous_value(value),
            Self::Bitmap(b) => b.previous_value(value),
            Self::Run(r) => r.previous_value(value),
        }
    }

    /// Returns the smallest absent value greater than or equal to `value`.
    pub fn next_absent_value(&self, value: u16) -> Option<u16> {
        match self {
            Self::Array(a) => a.next_absent_value(value),
            Self::Bitmap(b) => b.next_absent_value(value),
            Self::Run(r) => r.next_absent_value(value),
        }
    }

    /// Returns the largest absent value less than or equal to `value`.
    pub fn previous_absent_value(&self, value: u16) -> Option<u16> {
        match self {
            Self::Array(a) => a.previous_absent_value(value),
            Self::Bitmap(b) => b.previous_absent_value(value),
            Self::Run(r) => r.previous_absent_value(value),
        }
    }

    /// Returns the number of runs of consecutive values.
    pub fn number_of_runs(&self) -> usize {
        match self {
            Self::Array(a) => a.number_of_runs(),
            Self::Bitmap(b) => b.number_of_runs(),
            Self::Run(r) => r.run_count(),
        }
    }

    /// Converts to a run container if that is strictly smaller.
    ///
    /// Run containers are re-evaluated and may convert back to an array or bitmap.
    pub fn run_optimize(self) -> Self {
        match self {
            Self::Array(a) => {
                let runs = a.number_of_runs();
                if policy::should_run_optimize(Kind::Array, a.len(), runs) {
                    Self::Run(Run::from_array(&a))
                } else {
                    Self::Array(a)
                }
            }
            Self::Bitmap(b) => {
                let bound = b.number_of_runs_lower_bound(policy::MAX_USEFUL_RUNS);
                if policy::run_size(bound) >= BITMAP_SIZE {
                    return Self::Bitmap(b);
                }
                let runs = b.number_of_runs();
                if policy::should_run_optimize(Kind::Bitmap, b.len(), runs) {
                    Self::Run(Run::from_bitmap(&b))
                } else {
                    Self::Bitmap(b)
                }
            }
            run @ Self::Run(_) => run.to_efficient(),
        }
    }

    /// Converts a run container to an array or bitmap. Other containers are returned unchanged.
    pub fn remove_run_compression(self) -> Self {
        match self {
            Self::Run(r) => {
                if r.len() <= ARRAY_MAX_CARDINALITY {
                    Self::Array(r.to_array())
                } else {
                    Self::Bitmap(Box::new(r.to_bitmap()))
                }
            }
            other => other,
        }
    }

    /// Converts a run container that is no longer the smallest encoding.
    pub fn to_efficient(self) -> Self {
        match self {
            Self::Run(r) if !policy::keep_run(r.len(), r.run_count()) => {
                Self::Run(r).remove_run_compression()
            }
            other => other,
        }
    }

    /// Returns the size of the encoded payload in bytes.
    pub fn serialized_size(&self) -> usize {
        match self {
            Self::Array(a) => policy::array_size(a.len()),
            Self::Bitmap(_) => BITMAP_SIZE,
            Self::Run(r) => policy::run_size(r.run_count()),
        }
    }

    /// Returns an estimate of the memory the container occupies, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Array(a) => policy::array_size(a.len()) + 4,
            Self::Bitmap(_) => BITMAP_SIZE,
            Self::Run(r) => 4 * r.run_count() + 4,
        }
    }

    /// Returns whether the container is internally consistent and uses a legal representation.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Array(a) => {
                if !a.is_sorted() {
                    debug!(len = a.len(), "array values not strictly increasing");
                    return false;
                }
                if a.len() > ARRAY_MAX_CARDINALITY {
                    debug!(len = a.len(), "array exceeds maximum cardinality");
                    return false;
                }
                true
            }
            Self::Bitmap(b) => {
                if !b.is_consistent() {
                    debug!(len = b.len(), "bitmap cardinality does not match popcount");
                    return false;
                }
                if b.len() <= ARRAY_MAX_CARDINALITY {
                    debug!(len = b.len(), "bitmap at or below array threshold");
                    return false;
                }
                true
            }
            Self::Run(r) => {
                if !r.is_valid() {
                    debug!(runs = r.run_count(), "runs overlap, touch or miscount");
                    return false;
                }
                true
            }
        }
    }

    /// Returns an iterator over the values in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        match self {
            Self::Array(a) => Iter::Array(a.as_slice()),
            Self::Bitmap(b) => Iter::Bitmap(b.iter()),
            Self::Run(r) => Iter::Run(r.iter()),
        }
    }

    /// Reports the membership of every value in `[start, end)` to `consumer`.
    ///
    /// Value `start + i` is reported at position `offset + i`.
    pub fn for_all_in_range<C: RangeConsumer + ?Sized>(
        &self,
        start: u32,
        end: u32,
        offset: u32,
        consumer: &mut C,
    ) {
        if start >= end {
            return;
        }
        let position = |value: u32| offset + (value - start);
        let mut cursor = start;
        match self {
            Self::Run(r) => {
                for (run_start, run_end) in r.ranges() {
                    if run_end <= start {
                        continue;
                    }
                    if run_start >= end {
                        break;
                    }
                    let run_start = run_start.max(start);
                    let run_end = run_end.min(end);
                    if cursor < run_start {
                        consumer.accept_all_absent(position(cursor), position(run_start));
                    }
                    consumer.accept_all_present(position(run_start), position(run_end));
                    cursor = run_end;
                }
            }
            _ => {
                let mut iter = self.iter();
                iter.advance_to(start as u16);
                for value in iter {
                    let value = value as u32;
                    if value >= end {
                        break;
                    }
                    if cursor < value {
                        consumer.accept_all_absent(position(cursor), position(value));
                    }
                    consumer.accept_present(position(value));
                    cursor = value + 1;
                }
            }
        }
        if cursor < end {
            consumer.accept_all_absent(position(cursor), position(end));
        }
    }
}

/// Iterator over the values of a [`Container`].
pub enum Iter<'a> {
    Array(&'a [u16]),
    Bitmap(bitmap::Iter<'a>),
    Run(run::Iter<'a>),
}

impl Iter<'_> {
    /// Skips every value less than `target`.
    pub fn advance_to(&mut self, target: u16) {
        match self {
            Self::Array(values) => {
                let pos = values.partition_point(|&v| v < target);
                *values = &values[pos..];
            }
            Self::Bitmap(iter) => iter.advance_to(target),
            Self::Run(iter) => iter.advance_to(target),
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        match self {
            Self::Array(values) => {
                let (&first, rest) = values.split_first()?;
                *values = rest;
                Some(first)
            }
            Self::Bitmap(iter) => iter.next(),
            Self::Run(iter) => iter.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Array(values) => (values.len(), Some(values.len())),
            Self::Bitmap(iter) => iter.size_hint(),
            Self::Run(iter) => iter.size_hint(),
        }
    }
}

impl DoubleEndedIterator for Iter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<u16> {
        match self {
            Self::Array(values) => {
                let (&last, rest) = values.split_last()?;
                *values = rest;
                Some(last)
            }
            Self::Bitmap(iter) => iter.next_back(),
            Self::Run(iter) => iter.next_back(),
        }
    }
}

impl ExactSizeIterator for Iter<'_> {}
