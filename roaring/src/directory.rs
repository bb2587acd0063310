//! Sorted mapping from high 16-bit keys to the containers holding their low bits.

use crate::{container::Container, Error};

/// Capacity below which the directory doubles when it grows.
const DOUBLING_LIMIT: usize = 1024;

/// Capacity allocated on the first append.
const INITIAL_CAPACITY: usize = 4;

/// Keys and containers of a bitmap, kept in strictly increasing key order.
///
/// A directory never holds an empty container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Directory {
    keys: Vec<u16>,
    containers: Vec<Container>,
}

impl Directory {
    /// Creates an empty directory.
    pub const fn new() -> Self {
        Self {
            keys: Vec::new(),
            containers: Vec::new(),
        }
    }

    /// Creates an empty directory able to hold `capacity` containers without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            containers: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of containers.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns whether the directory is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the keys in ascending order.
    #[inline]
    pub fn keys(&self) -> &[u16] {
        &self.keys
    }

    /// Returns the containers in key order.
    #[inline]
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Returns the key at `index`.
    #[inline]
    pub fn key_at(&self, index: usize) -> u16 {
        self.keys[index]
    }

    /// Returns the container at `index`.
    #[inline]
    pub fn container_at(&self, index: usize) -> &Container {
        &self.containers[index]
    }

    /// Returns the container for `key`, if any.
    pub fn get(&self, key: u16) -> Option<&Container> {
        self.get_index(key).ok().map(|i| &self.containers[i])
    }

    /// Iterates over `(key, container)` pairs in key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u16, &Container)> + ExactSizeIterator {
        self.keys.iter().copied().zip(self.containers.iter())
    }

    /// Finds `key`, returning its index or the index where it would be inserted.
    ///
    /// Appending in ascending key order is the common case, so the last key is checked first.
    pub fn get_index(&self, key: u16) -> Result<usize, usize> {
        match self.keys.last() {
            None => Err(0),
            Some(&last) if last == key => Ok(self.keys.len() - 1),
            Some(&last) if last < key => Err(self.keys.len()),
            _ => self.keys.binary_search(&key),
        }
    }

    /// Reserves room for one more entry using the directory's growth policy.
    fn grow(&mut self) {
        let capacity = self.keys.capacity();
        if self.keys.len() < capacity {
            return;
        }
        let target = if capacity == 0 {
            INITIAL_CAPACITY
        } else if capacity < DOUBLING_LIMIT {
            capacity * 2
        } else {
            capacity + capacity / 4
        };
        let additional = target - self.keys.len();
        self.keys.reserve_exact(additional);
        self.containers.reserve_exact(additional);
    }

    /// Appends a container whose key is greater than every existing key.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `key` does not exceed the last key.
    pub fn append(&mut self, key: u16, container: Container) {
        debug_assert!(
            self.keys.last().map_or(true, |&last| last < key),
            "keys must be strictly increasing"
        );
        self.grow();
        self.keys.push(key);
        self.containers.push(container);
    }

    /// Appends a container unless it is empty.
    #[inline]
    pub fn append_non_empty(&mut self, key: u16, container: Container) {
        if !container.is_empty() {
            self.append(key, container);
        }
    }

    /// Appends clones of the entries of `other` in `[start, end)`.
    pub fn append_copies(&mut self, other: &Directory, start: usize, end: usize) {
        for i in start..end {
            self.append(other.keys[i], other.containers[i].clone());
        }
    }

    /// Moves every entry of `other` to the end of this directory.
    ///
    /// Fails without modifying either directory if `other`'s first key does not exceed this
    /// directory's last key.
    pub fn append_all(&mut self, other: Directory) -> Result<(), Error> {
        if let (Some(&previous), Some(&next)) = (self.keys.last(), other.keys.first()) {
            if next <= previous {
                return Err(Error::NonMonotonicKeys { previous, next });
            }
        }
        self.keys.extend(other.keys);
        self.containers.extend(other.containers);
        Ok(())
    }

    /// Inserts a container at `index`, shifting the tail by one slot.
    pub fn insert_new_key_value_at(&mut self, index: usize, key: u16, container: Container) {
        debug_assert!(index == 0 || self.keys[index - 1] < key);
        debug_assert!(index == self.keys.len() || key < self.keys[index]);
        self.grow();
        self.keys.insert(index, key);
        self.containers.insert(index, container);
    }

    /// Removes and returns the container at `index`.
    pub fn remove_at_index(&mut self, index: usize) -> Container {
        self.keys.remove(index);
        self.containers.remove(index)
    }

    /// Removes the entries in `[start, end)`.
    pub fn remove_index_range(&mut self, start: usize, end: usize) {
        self.keys.drain(start..end);
        self.containers.drain(start..end);
    }

    /// Replaces the container at `index` with the result of `f`, removing the entry if the
    /// result is empty.
    pub fn update_at(&mut self, index: usize, f: impl FnOnce(Container) -> Container) {
        let container = core::mem::take(&mut self.containers[index]);
        let container = f(container);
        if container.is_empty() {
            self.remove_at_index(index);
        } else {
            self.containers[index] = container;
        }
    }

    /// Applies `f` to every container, dropping entries that become empty.
    pub fn map_containers(&mut self, mut f: impl FnMut(Container) -> Container) {
        let keys = core::mem::take(&mut self.keys);
        let containers = core::mem::take(&mut self.containers);
        for (key, container) in keys.into_iter().zip(containers) {
            let container = f(container);
            if !container.is_empty() {
                self.keys.push(key);
                self.containers.push(container);
            }
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.containers.clear();
    }

    /// Returns the index of the first key greater than or equal to `key`.
    #[inline]
    pub fn lower_bound(&self, key: u16) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    /// Returns the first index at or after `start` whose key is at least `key`, galloping from
    /// `start`.
    pub fn advance_until(&self, key: u16, start: usize) -> usize {
        let keys = &self.keys;
        if start >= keys.len() || keys[start] >= key {
            return start;
        }
        let mut step = 1;
        let mut hi = start + 1;
        while hi < keys.len() && keys[hi] < key {
            step *= 2;
            hi = start + step;
        }
        let hi = hi.min(keys.len());
        let lo = start + step / 2;
        lo + keys[lo..hi].partition_point(|&k| k < key)
    }

    /// Returns whether keys are strictly increasing and no container is empty.
    pub fn is_valid(&self) -> bool {
        self.keys.len() == self.containers.len()
            && self.keys.windows(2).all(|w| w[0] < w[1])
            && self.containers.iter().all(|c| !c.is_empty())
    }

    /// Consumes the directory, returning its keys and containers.
    pub fn into_parts(self) -> (Vec<u16>, Vec<Container>) {
        (self.keys, self.containers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(value: u16) -> Container {
        Container::new().add(value)
    }

    #[test]
    fn test_get_index_fast_path() {
        let mut d = Directory::new();
        assert_eq!(d.get_index(5), Err(0));
        d.append(1, single(1));
        d.append(5, single(5));
        d.append(9, single(9));
        assert_eq!(d.get_index(9), Ok(2));
        assert_eq!(d.get_index(10), Err(3));
        assert_eq!(d.get_index(5), Ok(1));
        assert_eq!(d.get_index(0), Err(0));
        assert_eq!(d.get_index(6), Err(2));
        assert_eq!(d.get(5).map(|c| c.len()), Some(1));
        assert!(d.get(6).is_none());
    }

    #[test]
    fn test_growth_policy() {
        let mut d = Directory::new();
        d.append(0, single(0));
        assert_eq!(d.keys.capacity(), INITIAL_CAPACITY);
        for key in 1..1024u16 {
            d.append(key, single(key));
        }
        assert_eq!(d.keys.capacity(), 1024);
        d.append(1024, single(0));
        assert_eq!(d.keys.capacity(), 1280);
        assert!(d.is_valid());
    }

    #[test]
    fn test_insert_and_remove() {
        let mut d = Directory::new();
        d.append(1, single(1));
        d.append(9, single(9));
        d.insert_new_key_value_at(1, 5, single(5));
        assert_eq!(d.keys(), &[1, 5, 9]);
        let removed = d.remove_at_index(0);
        assert!(removed.contains(1));
        assert_eq!(d.keys(), &[5, 9]);

        d.update_at(0, |c| c.remove(5));
        assert_eq!(d.keys(), &[9]);
        d.update_at(0, |c| c.add(10));
        assert_eq!(d.container_at(0).len(), 2);
    }

    #[test]
    fn test_append_all_rejects_overlap() {
        let mut left = Directory::new();
        left.append(1, single(1));
        left.append(4, single(4));
        let mut right = Directory::new();
        right.append(4, single(4));
        assert_eq!(
            left.clone().append_all(right.clone()),
            Err(Error::NonMonotonicKeys {
                previous: 4,
                next: 4
            })
        );

        let mut right = Directory::new();
        right.append(7, single(7));
        left.append_all(right).unwrap();
        assert_eq!(left.keys(), &[1, 4, 7]);
        left.append_all(Directory::new()).unwrap();
        assert_eq!(left.len(), 3);
    }

    #[test]
    fn test_advance_until() {
        let mut d = Directory::new();
        for key in (0..100u16).map(|k| k * 3) {
            d.append(key, single(0));
        }
        assert_eq!(d.advance_until(0, 0), 0);
        assert_eq!(d.advance_until(7, 0), 3);
        assert_eq!(d.advance_until(297, 10), 99);
        assert_eq!(d.advance_until(298, 10), 100);
        assert_eq!(d.lower_bound(8), 3);
    }

    #[test]
    fn test_map_containers_drops_empty() {
        let mut d = Directory::new();
        d.append(1, single(1));
        d.append(2, single(2));
        d.map_containers(|c| if c.contains(1) { c.remove(1) } else { c });
        assert_eq!(d.keys(), &[2]);
    }
}
