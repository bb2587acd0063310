//! Multi-bitmap reduction on a [`rayon::ThreadPool`].
//!
//! Containers of all inputs are grouped by key. Each group is reduced independently, and the
//! results are concatenated in key order. Because groups never share a key, the output does not
//! depend on how groups are scheduled. A pool with a single thread reduces groups in place on
//! the calling thread.

use crate::{
    aggregation::{symmetric_difference_of, union_of},
    container::Container,
    directory::Directory,
    RoaringBitmap,
};
use rayon::{prelude::*, ThreadPool};
use std::collections::BTreeMap;
use tracing::debug;

/// Collects the containers of `bitmaps` by key, preserving input order within each key.
pub fn group_by_key(bitmaps: &[RoaringBitmap]) -> Vec<(u16, Vec<&Container>)> {
    let mut groups: BTreeMap<u16, Vec<&Container>> = BTreeMap::new();
    for bitmap in bitmaps {
        for (key, container) in bitmap.directory().iter() {
            groups.entry(key).or_default().push(container);
        }
    }
    groups.into_iter().collect()
}

fn reduce(
    pool: &ThreadPool,
    bitmaps: &[RoaringBitmap],
    combine: fn(&[&Container]) -> Container,
) -> RoaringBitmap {
    let groups = group_by_key(bitmaps);
    let threads = pool.current_num_threads();
    debug!(
        inputs = bitmaps.len(),
        groups = groups.len(),
        threads,
        "reducing bitmaps"
    );
    let reduced: Vec<(u16, Container)> = if threads <= 1 {
        groups
            .iter()
            .map(|(key, containers)| (*key, combine(containers)))
            .collect()
    } else {
        pool.install(|| {
            groups
                .par_iter()
                .map(|(key, containers)| (*key, combine(containers)))
                .collect()
        })
    };

    let mut directory = Directory::with_capacity(reduced.len());
    for (key, container) in reduced {
        directory.append_non_empty(key, container);
    }
    RoaringBitmap::from_directory(directory)
}

/// Unions `bitmaps` using `pool`.
pub fn or(pool: &ThreadPool, bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    reduce(pool, bitmaps, union_of)
}

/// Computes the values present in an odd number of `bitmaps` using `pool`.
pub fn xor(pool: &ThreadPool, bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
    reduce(pool, bitmaps, symmetric_difference_of)
}
