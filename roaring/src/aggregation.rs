//! Aggregation of many bitmaps at once.
//!
//! - [`and`] intersects the key sets first ([`work_shy_and`]) so containers are only touched
//!   for keys present in every input.
//! - [`or`] and [`xor`] always combine the two smallest intermediate results next, which keeps
//!   the total merge work close to linear in the input size.
//! - [`horizontal_or`] unions key by key, chaining lazy unions within each key.

use crate::{
    container::{Container, Lazy},
    directory::Directory,
    ops, RoaringBitmap,
};
use std::{
    borrow::Cow,
    cmp::Reverse,
    collections::BinaryHeap,
};
use tracing::{debug, trace};

/// Words in the scratch buffer [`work_shy_and`] uses to intersect key sets.
pub const SCRATCH_WORDS: usize = 1024;

/// Folds intersections from left to right, stopping once the result is empty.
pub fn naive_and<'a>(bitmaps: impl IntoIterator<Item = &'a RoaringBitmap>) -> RoaringBitmap {
    let mut bitmaps = bitmaps.into_iter();
    let Some(first) = bitmaps.next() else {
        return RoaringBitmap::new();
    };
    let mut answer = first.clone();
    for bitmap in bitmaps {
        if answer.is_empty() {
            break;
        }
        answer &= bitmap;
    }
    answer
}

/// Folds unions from left to right.
pub fn naive_or<'a>(bitmaps: impl IntoIterator<Item = &'a RoaringBitmap>) -> RoaringBitmap {
    let mut answer = RoaringBitmap::new();
    for bitmap in bitmaps {
        answer |= bitmap;
    }
    answer
}

/// Folds symmetric differences from left to right.
pub fn naive_xor<'a>(bitmaps: impl IntoIterator<Item = &'a RoaringBitmap>) -> RoaringBitmap {
    let mut answer = RoaringBitmap::new();
    for bitmap in bitmaps {
        answer ^= bitmap;
    }
    answer
}

/// Clears every key of `scratch` not present in `keys`, returning how many remain.
fn retain_keys(scratch: &mut [u64; SCRATCH_WORDS], keys: &[u16]) -> u32 {
    let mut keys = keys.iter().peekable();
    let mut remaining = 0;
    for (index, word) in scratch.iter_mut().enumerate() {
        let mut mask = 0u64;
        while let Some(&&key) = keys.peek() {
            if key as usize >> 6 != index {
                break;
            }
            mask |= 1 << (key & 63);
            keys.next();
        }
        *word &= mask;
        remaining += word.count_ones();
    }
    remaining
}

/// Intersects `bitmaps`, first discarding every key absent from any input.
///
/// `scratch` is zeroed on return.
pub fn work_shy_and(scratch: &mut [u64; SCRATCH_WORDS], bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    let Some((first, rest)) = bitmaps.split_first() else {
        return RoaringBitmap::new();
    };
    scratch.fill(0);
    for &key in first.directory().keys() {
        scratch[key as usize >> 6] |= 1 << (key & 63);
    }
    let mut remaining = first.container_count() as u32;
    for bitmap in rest {
        if remaining == 0 {
            break;
        }
        remaining = retain_keys(scratch, bitmap.directory().keys());
        trace!(remaining, "intersected key sets");
    }
    debug!(
        inputs = bitmaps.len(),
        keys = remaining,
        "work-shy intersection"
    );

    let mut out = Directory::with_capacity(remaining as usize);
    let mut cursors = vec![0usize; bitmaps.len()];
    let mut containers: Vec<&Container> = Vec::with_capacity(bitmaps.len());
    for (index, &word) in scratch.iter().enumerate() {
        let mut word = word;
        while word != 0 {
            let key = (index * 64 + word.trailing_zeros() as usize) as u16;
            word &= word - 1;

            containers.clear();
            for (bitmap, cursor) in bitmaps.iter().zip(cursors.iter_mut()) {
                let directory = bitmap.directory();
                *cursor = directory.advance_until(key, *cursor);
                containers.push(directory.container_at(*cursor));
            }
            containers.sort_by_key(|c| c.len());
            let mut result = containers[0].clone();
            for container in &containers[1..] {
                if result.is_empty() {
                    break;
                }
                result = result.iand(container);
            }
            out.append_non_empty(key, result);
        }
    }
    scratch.fill(0);
    RoaringBitmap::from_directory(out)
}

/// Intersects `bitmaps`.
pub fn and(bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    if bitmaps.len() > 2 {
        let mut scratch = [0u64; SCRATCH_WORDS];
        return work_shy_and(&mut scratch, bitmaps);
    }
    naive_and(bitmaps)
}

/// Reduces `bitmaps` by repeatedly combining the two with the smallest in-memory size.
///
/// Ties are broken by position, so the reduction order is deterministic.
fn priority_queue_reduce(
    bitmaps: &[RoaringBitmap],
    combine: impl Fn(&RoaringBitmap, &RoaringBitmap) -> RoaringBitmap,
    combine_into: impl Fn(&mut RoaringBitmap, &RoaringBitmap),
) -> RoaringBitmap {
    let mut slots: Vec<Cow<'_, RoaringBitmap>> = bitmaps.iter().map(Cow::Borrowed).collect();
    let mut heap: BinaryHeap<_> = slots
        .iter()
        .enumerate()
        .map(|(slot, bitmap)| Reverse((bitmap.size_in_bytes(), slot)))
        .collect();
    while heap.len() > 1 {
        let (Some(Reverse((_, x))), Some(Reverse((_, y)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        let left = core::mem::take(&mut slots[x]);
        let right = core::mem::take(&mut slots[y]);
        // Reuse an intermediate result's allocation when there is one.
        let merged = match (left, right) {
            (Cow::Owned(mut merged), other) | (other, Cow::Owned(mut merged)) => {
                combine_into(&mut merged, other.as_ref());
                merged
            }
            (Cow::Borrowed(a), Cow::Borrowed(b)) => combine(a, b),
        };
        let size = merged.size_in_bytes();
        slots[x] = Cow::Owned(merged);
        heap.push(Reverse((size, x)));
    }
    match heap.pop() {
        Some(Reverse((_, slot))) => core::mem::take(&mut slots[slot]).into_owned(),
        None => RoaringBitmap::new(),
    }
}

/// Unions `bitmaps`, always merging the two smallest intermediate results next.
pub fn priority_queue_or(bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    priority_queue_reduce(bitmaps, ops::or, ops::or_assign)
}

/// Computes the symmetric difference of `bitmaps`, always merging the two smallest
/// intermediate results next.
pub fn priority_queue_xor(bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    priority_queue_reduce(bitmaps, ops::xor, ops::xor_assign)
}

/// Unions `bitmaps`.
pub fn or(bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    priority_queue_or(bitmaps)
}

/// Computes the values present in an odd number of `bitmaps`.
pub fn xor(bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    priority_queue_xor(bitmaps)
}

/// Unions containers sharing one key, deferring cardinality repair to the end.
pub(crate) fn union_of(containers: &[&Container]) -> Container {
    match containers {
        [] => Container::new(),
        [only] => (*only).clone(),
        [first, second, rest @ ..] => rest
            .iter()
            .fold(first.lazy_or(second), |lazy: Lazy, c| lazy.lazy_or(c))
            .repair(),
    }
}

/// Computes the symmetric difference of containers sharing one key, in order.
pub(crate) fn symmetric_difference_of(containers: &[&Container]) -> Container {
    match containers {
        [] => Container::new(),
        [first, rest @ ..] => rest
            .iter()
            .fold((*first).clone(), |acc, c| acc.ixor(c)),
    }
}

/// Unions `bitmaps` key by key.
pub fn horizontal_or(bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    let mut heap: BinaryHeap<Reverse<(u16, usize)>> = bitmaps
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.is_empty())
        .map(|(i, b)| Reverse((b.directory().key_at(0), i)))
        .collect();
    let mut positions = vec![0usize; bitmaps.len()];
    let mut out = Directory::new();
    let mut group: Vec<&Container> = Vec::new();
    while let Some(Reverse((key, first))) = heap.pop() {
        group.clear();
        let mut members = vec![first];
        while let Some(&Reverse((next, index))) = heap.peek() {
            if next != key {
                break;
            }
            heap.pop();
            members.push(index);
        }
        for index in members {
            let directory = bitmaps[index].directory();
            group.push(directory.container_at(positions[index]));
            positions[index] += 1;
            if positions[index] < directory.len() {
                heap.push(Reverse((directory.key_at(positions[index]), index)));
            }
        }
        out.append_non_empty(key, union_of(&group));
    }
    RoaringBitmap::from_directory(out)
}

/// Returns the cardinality of the intersection of `bitmaps`.
pub fn and_len(bitmaps: &[RoaringBitmap]) -> u64 {
    match bitmaps {
        [] => 0,
        [only] => only.len(),
        [a, b] => ops::and_len(a, b),
        _ => and(bitmaps).len(),
    }
}

/// Returns the cardinality of the union of `bitmaps`.
pub fn or_len(bitmaps: &[RoaringBitmap]) -> u64 {
    match bitmaps {
        [] => 0,
        [only] => only.len(),
        [a, b] => ops::or_len(a, b),
        _ => horizontal_or(bitmaps).len(),
    }
}
