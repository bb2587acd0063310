//! Algebraic and round-trip properties of [`RoaringBitmap`].

use commonware_codec::{Decode, Encode};
use commonware_roaring::{
    codec::MAX_CONTAINERS, ops, Container, Kind, RoaringBitmap,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use test_case::test_case;

fn random_bitmap(rng: &mut StdRng) -> RoaringBitmap {
    let mut bitmap = RoaringBitmap::new();
    let keys = rng.gen_range(1..8u64);
    for _ in 0..rng.gen_range(0..200) {
        bitmap.add(rng.gen_range(0..(keys << 16) as u32));
    }
    for _ in 0..rng.gen_range(0..4) {
        let start = rng.gen_range(0..keys << 16);
        bitmap.add_range(start, start + rng.gen_range(1..30_000)).unwrap();
    }
    for _ in 0..rng.gen_range(0..3) {
        let start = rng.gen_range(0..keys << 16);
        bitmap.remove_range(start, start + rng.gen_range(1..5_000)).unwrap();
    }
    if rng.gen_bool(0.5) {
        bitmap.run_optimize();
    }
    bitmap
}

fn kinds(bitmap: &RoaringBitmap) -> Vec<Kind> {
    bitmap
        .directory()
        .containers()
        .iter()
        .map(Container::kind)
        .collect()
}

fn round_trip(bitmap: &RoaringBitmap) -> RoaringBitmap {
    let decoded = RoaringBitmap::decode_cfg(bitmap.encode(), &MAX_CONTAINERS).unwrap();
    assert!(decoded.validate());
    assert_eq!(kinds(&decoded), kinds(bitmap));
    decoded
}

#[test]
fn test_cardinality_matches_materialized() {
    let mut rng = StdRng::seed_from_u64(0);
    for _ in 0..100 {
        let (a, b) = (random_bitmap(&mut rng), random_bitmap(&mut rng));
        assert_eq!(ops::and(&a, &b).len(), a.and_len(&b));
        assert_eq!(ops::or(&a, &b).len(), a.or_len(&b));
        assert_eq!(ops::xor(&a, &b).len(), a.xor_len(&b));
        assert_eq!(ops::and_not(&a, &b).len(), a.and_not_len(&b));
    }
}

#[test]
fn test_xor_is_union_minus_intersection() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..100 {
        let (a, b) = (random_bitmap(&mut rng), random_bitmap(&mut rng));
        let xor = &a ^ &b;
        assert!(xor.validate());
        assert_eq!(xor, &(&a | &b) - &(&a & &b));
    }
}

#[test]
fn test_subset_intersection() {
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..50 {
        let a = random_bitmap(&mut rng);
        let b: RoaringBitmap = a.iter().filter(|_| rng.gen_bool(0.3)).collect();
        assert!(b.is_subset(&a));
        assert_eq!(&a & &b, b);
    }
}

#[test]
fn test_rank_of_select() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..20 {
        let bitmap = random_bitmap(&mut rng);
        let len = bitmap.len();
        for _ in 0..200.min(len) {
            let index = rng.gen_range(0..len);
            let value = bitmap.select(index).unwrap();
            assert_eq!(bitmap.rank(value), index + 1);
        }
        assert!(bitmap.select(len).is_err());
    }
}

#[test_case(false; "plain")]
#[test_case(true; "run optimized")]
fn test_round_trip(optimize: bool) {
    let mut array_only: RoaringBitmap = (0..1_000u32).map(|v| v * 3).collect();
    let mut bitmap_only: RoaringBitmap = (0..20_000u32).map(|v| v * 3).collect();
    let mut run_only = RoaringBitmap::from_range(10, 50_000).unwrap();
    run_only.add_range(1 << 20, (1 << 20) + 300).unwrap();
    let mut mixed = array_only.clone();
    mixed.add_range(3 << 16, 4 << 16).unwrap();
    mixed.extend((0..10_000u32).map(|v| (5 << 16) + v * 2));
    mixed.add(u32::MAX);

    let mut rng = StdRng::seed_from_u64(4);
    let mut bitmaps = vec![array_only, bitmap_only, run_only, mixed];
    bitmaps.extend((0..20).map(|_| random_bitmap(&mut rng)));
    for bitmap in &mut bitmaps {
        if optimize {
            bitmap.run_optimize();
        } else {
            bitmap.remove_run_compression();
        }
        assert_eq!(&round_trip(bitmap), bitmap);
    }
    assert_eq!(kinds(&bitmaps[0]), vec![Kind::Array]);
    assert_eq!(kinds(&bitmaps[1]), vec![Kind::Bitmap]);
    let expected = if optimize { Kind::Run } else { Kind::Bitmap };
    assert_eq!(kinds(&bitmaps[2])[0], expected);
}

#[test]
fn test_round_trip_sparse_keys() {
    let values = [0, 1, 2, 65_536, 131_072, 196_608];
    let added: RoaringBitmap = values.into_iter().collect();
    let decoded = round_trip(&added);
    assert_eq!(decoded.iter().collect::<Vec<_>>(), values);
    assert_eq!(kinds(&decoded), vec![Kind::Array; 4]);

    let mut ranged = RoaringBitmap::new();
    for value in values {
        ranged.add_range(value as u64, value as u64 + 1).unwrap();
    }
    let decoded_ranged = round_trip(&ranged);
    assert_eq!(kinds(&decoded_ranged), kinds(&decoded));
    assert_eq!(decoded_ranged, decoded);
    assert_eq!(decoded_ranged, added);

    // A single range of three values starts out as a run container.
    let mut run = RoaringBitmap::from_range(0, 3).unwrap();
    assert_eq!(kinds(&run), vec![Kind::Run]);
    run.extend([65_536, 131_072, 196_608]);
    let decoded_run = round_trip(&run);
    assert_eq!(decoded_run, added);
    assert_eq!(kinds(&decoded_run)[0], Kind::Run);
}

#[test]
fn test_or_not_with_empty_operand() {
    let bitmap: RoaringBitmap = [0, 10].into_iter().collect();
    let result = bitmap.or_not(&RoaringBitmap::new(), 7).unwrap();
    assert_eq!(
        result.iter().collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4, 5, 6, 10]
    );
}

#[test]
fn test_run_optimize_preserves_iteration() {
    let array: RoaringBitmap = (64..=128).collect();
    assert_eq!(kinds(&array), vec![Kind::Array]);
    let mut optimized = array.clone();
    assert!(optimized.run_optimize());
    assert_eq!(kinds(&optimized), vec![Kind::Run]);
    assert_eq!(optimized.len(), array.len());
    assert!(optimized.iter().eq(array.iter()));
    assert_eq!(optimized, array);
}
