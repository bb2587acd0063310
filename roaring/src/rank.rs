//! Constant-time rank queries over an immutable bitmap.
//!
//! [`SuccinctRank`] owns a snapshot of the bitmap it indexes. It records the cumulative
//! cardinality before every container and, inside each container, enough to answer a rank
//! without scanning:
//!
//! - Array: binary search over the values.
//! - Bitmap: the cumulative popcount before every block of 4 words, so a query is one table
//!   lookup, at most 3 word popcounts and one masked popcount.
//! - Run: the cumulative length before every run.
//!
//! With more than [`SMALL_BITMAP_THRESHOLD`] containers, the matching container is found
//! through a bitset of present keys and a two-level popcount index over it. Smaller
//! directories are scanned linearly.

use crate::{container::Container, high_bits, low_bits, RoaringBitmap};

/// Directories with at most this many containers are scanned linearly.
pub const SMALL_BITMAP_THRESHOLD: usize = 16;

const WORDS_PER_BLOCK: usize = 4;
const BLOCKS_PER_CONTAINER: usize = 1024 / WORDS_PER_BLOCK;

/// Words of the present-key bitset.
const KEY_WORDS: usize = (1 << 16) / 64;
const WORDS_PER_SUPERBLOCK: usize = 8;
const SUPERBLOCKS: usize = KEY_WORDS / WORDS_PER_SUPERBLOCK;
const BITS_PER_PACKED_BLOCK: usize = 9;
const BLOCK_MASK: u64 = (1 << BITS_PER_PACKED_BLOCK) - 1;

/// Returns a mask of the bits at or below `bit`.
#[inline]
const fn mask_through(bit: usize) -> u64 {
    u64::MAX >> (63 - bit)
}

/// Auxiliary data for ranking inside one container.
#[derive(Clone, Debug)]
enum Local {
    /// Arrays answer directly.
    Array,
    /// Popcount before each block of [`WORDS_PER_BLOCK`] words.
    Bitmap(Box<[u16; BLOCKS_PER_CONTAINER]>),
    /// Cardinality before each run.
    Run(Vec<u32>),
}

impl Local {
    fn build(container: &Container) -> Self {
        match container {
            Container::Array(_) => Self::Array,
            Container::Bitmap(bitmap) => {
                let mut blocks = Box::new([0u16; BLOCKS_PER_CONTAINER]);
                let mut cumulative = 0u32;
                for (block, chunk) in blocks
                    .iter_mut()
                    .zip(bitmap.words().chunks_exact(WORDS_PER_BLOCK))
                {
                    *block = cumulative as u16;
                    cumulative += chunk.iter().map(|w| w.count_ones()).sum::<u32>();
                }
                Self::Bitmap(blocks)
            }
            Container::Run(run) => {
                let mut cumulative = 0;
                let prefix = run
                    .runs()
                    .iter()
                    .map(|&(start, end)| {
                        let before = cumulative;
                        cumulative += (end - start) as u32 + 1;
                        before
                    })
                    .collect();
                Self::Run(prefix)
            }
        }
    }

    fn rank(&self, container: &Container, low: u16) -> u32 {
        match (self, container) {
            (Self::Bitmap(blocks), Container::Bitmap(bitmap)) => {
                let words = bitmap.words();
                let word = low as usize >> 6;
                let base = word & !(WORDS_PER_BLOCK - 1);
                let mut rank = blocks[low as usize >> 8] as u32;
                for &skipped in &words[base..word] {
                    rank += skipped.count_ones();
                }
                rank + (words[word] & mask_through(low as usize & 63)).count_ones()
            }
            (Self::Run(prefix), Container::Run(run)) => {
                let runs = run.runs();
                let index = runs.partition_point(|&(start, _)| start <= low);
                if index == 0 {
                    return 0;
                }
                let (start, end) = runs[index - 1];
                prefix[index - 1] + (low.min(end) - start) as u32 + 1
            }
            _ => container.rank(low),
        }
    }
}

/// Present-key bitset with a two-level rank index.
#[derive(Clone, Debug)]
struct KeyIndex {
    bits: Box<[u64; KEY_WORDS]>,
    /// For each superblock: keys before it, then the packed per-word counts within it.
    counts: Vec<u64>,
}

impl KeyIndex {
    fn build(keys: &[u16]) -> Self {
        let mut bits = Box::new([0u64; KEY_WORDS]);
        for &key in keys {
            bits[key as usize >> 6] |= 1 << (key & 63);
        }

        let mut counts = Vec::with_capacity(SUPERBLOCKS * 2);
        let mut cumulative = 0u64;
        for superblock in bits.chunks_exact(WORDS_PER_SUPERBLOCK) {
            counts.push(cumulative);
            let mut packed = 0u64;
            let mut within = superblock[0].count_ones() as u64;
            for (j, word) in superblock.iter().enumerate().skip(1) {
                packed |= (within & BLOCK_MASK) << (BITS_PER_PACKED_BLOCK * (j - 1));
                within += word.count_ones() as u64;
            }
            counts.push(packed);
            cumulative += within;
        }
        Self { bits, counts }
    }

    /// Returns the number of present keys less than or equal to `key`.
    fn rank(&self, key: u16) -> usize {
        let word = key as usize >> 6;
        let superblock = word / WORDS_PER_SUPERBLOCK;
        let within = word % WORDS_PER_SUPERBLOCK;
        let mut rank = self.counts[superblock * 2];
        if within > 0 {
            let packed = self.counts[superblock * 2 + 1];
            rank += (packed >> (BITS_PER_PACKED_BLOCK * (within - 1))) & BLOCK_MASK;
        }
        rank += (self.bits[word] & mask_through(key as usize & 63)).count_ones() as u64;
        rank as usize
    }
}

/// An immutable bitmap with precomputed rank structures.
#[derive(Clone, Debug)]
pub struct SuccinctRank {
    bitmap: RoaringBitmap,
    keys: Option<KeyIndex>,
    /// Cardinality of all containers before each index, with the total last.
    cumulative: Vec<u64>,
    local: Vec<Local>,
}

impl SuccinctRank {
    /// Indexes a copy of `bitmap`. Later changes to `bitmap` are not reflected.
    pub fn build(bitmap: &RoaringBitmap) -> Self {
        Self::new(bitmap.clone())
    }

    /// Indexes `bitmap`, taking ownership of it.
    pub fn new(bitmap: RoaringBitmap) -> Self {
        let directory = bitmap.directory();
        let mut cumulative = Vec::with_capacity(directory.len() + 1);
        let mut total = 0u64;
        cumulative.push(total);
        for container in directory.containers() {
            total += container.len() as u64;
            cumulative.push(total);
        }
        let local = directory.containers().iter().map(Local::build).collect();
        let keys =
            (directory.len() > SMALL_BITMAP_THRESHOLD).then(|| KeyIndex::build(directory.keys()));
        Self {
            bitmap,
            keys,
            cumulative,
            local,
        }
    }

    /// Returns the index of the last container whose key is at most `key`.
    fn find_container(&self, key: u16) -> Option<usize> {
        match &self.keys {
            Some(index) => index.rank(key).checked_sub(1),
            None => self
                .bitmap
                .directory()
                .keys()
                .iter()
                .position(|&k| k > key)
                .unwrap_or(self.container_count())
                .checked_sub(1),
        }
    }

    /// Returns the number of values less than or equal to `value`.
    pub fn rank(&self, value: u32) -> u64 {
        let (high, low) = (high_bits(value), low_bits(value));
        let Some(index) = self.find_container(high) else {
            return 0;
        };
        let directory = self.bitmap.directory();
        if directory.key_at(index) < high {
            return self.cumulative[index + 1];
        }
        let container = directory.container_at(index);
        self.cumulative[index] + self.local[index].rank(container, low) as u64
    }

    /// Returns the number of values.
    pub fn cardinality(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or_default()
    }

    /// Returns the indexed bitmap.
    pub fn snapshot(&self) -> &RoaringBitmap {
        &self.bitmap
    }

    /// Consumes the index, returning the indexed bitmap.
    pub fn into_inner(self) -> RoaringBitmap {
        self.bitmap
    }

    /// Returns whether containers are found by linear scan.
    pub fn uses_linear_scan(&self) -> bool {
        self.keys.is_none()
    }

    /// Returns the number of containers.
    pub fn container_count(&self) -> usize {
        self.bitmap.container_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn mixed_bitmap(rng: &mut StdRng, keys: u32) -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        for key in 0..keys {
            let base = (key * 3 + rng.gen_range(0..3)) << 16;
            match key % 3 {
                0 => {
                    for _ in 0..100 {
                        bitmap.add(base | rng.gen_range(0..1 << 16));
                    }
                }
                1 => {
                    for _ in 0..30_000 {
                        bitmap.add(base | rng.gen_range(0..1 << 16));
                    }
                }
                _ => {
                    for start in (0..60_000u64).step_by(7_000) {
                        let start = base as u64 + start;
                        bitmap.add_range(start, start + 500).unwrap();
                    }
                }
            }
        }
        bitmap
    }

    fn check(bitmap: RoaringBitmap, rng: &mut StdRng) {
        let index = SuccinctRank::build(&bitmap);
        assert_eq!(index.cardinality(), bitmap.len());
        for value in bitmap.iter().step_by(97) {
            assert_eq!(index.rank(value), bitmap.rank(value));
            let before = value.saturating_sub(1);
            assert_eq!(index.rank(before), bitmap.rank(before));
        }
        for _ in 0..2_000 {
            let value = rng.gen();
            assert_eq!(index.rank(value), bitmap.rank(value));
        }
        assert_eq!(index.rank(u32::MAX), bitmap.len());
        assert_eq!(index.snapshot(), &bitmap);
    }

    #[test]
    fn test_small_directory_scans() {
        let mut rng = StdRng::seed_from_u64(0);
        let bitmap = mixed_bitmap(&mut rng, 9);
        let index = SuccinctRank::build(&bitmap);
        assert!(index.uses_linear_scan());
        assert_eq!(index.container_count(), 9);
        check(bitmap, &mut rng);
    }

    #[test]
    fn test_large_directory_indexes_keys() {
        let mut rng = StdRng::seed_from_u64(1);
        let bitmap = mixed_bitmap(&mut rng, 200);
        let index = SuccinctRank::build(&bitmap);
        assert!(!index.uses_linear_scan());
        check(bitmap, &mut rng);
    }

    #[test]
    fn test_empty() {
        let index = SuccinctRank::new(RoaringBitmap::new());
        assert_eq!(index.rank(0), 0);
        assert_eq!(index.rank(u32::MAX), 0);
        assert_eq!(index.cardinality(), 0);
        assert_eq!(index.container_count(), 0);
    }

    #[test]
    fn test_every_key_present() {
        let bitmap: RoaringBitmap = (0..=u16::MAX as u32).map(|key| key << 16 | 7).collect();
        let index = SuccinctRank::build(&bitmap);
        assert_eq!(index.rank(6), 0);
        assert_eq!(index.rank(7), 1);
        assert_eq!(index.rank((1000 << 16) | 7), 1001);
        assert_eq!(index.rank(u32::MAX), 65_536);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut bitmap: RoaringBitmap = [1, 2, 3].into_iter().collect();
        let index = SuccinctRank::build(&bitmap);
        bitmap.add(0);
        assert_eq!(index.rank(3), 3);
        assert_eq!(index.into_inner().len(), 3);
    }
}
