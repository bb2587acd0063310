use commonware_roaring::RoaringBitmap;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Generates a bitmap mixing sparse values with dense ranges.
pub fn random_bitmap(seed: u64, values: usize, ranges: usize) -> RoaringBitmap {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bitmap = RoaringBitmap::new();
    for _ in 0..values {
        bitmap.add(rng.gen_range(0..1 << 24));
    }
    for _ in 0..ranges {
        let start = rng.gen_range(0..1u64 << 24);
        bitmap.add_range(start, start + rng.gen_range(1..50_000)).unwrap();
    }
    bitmap
}
