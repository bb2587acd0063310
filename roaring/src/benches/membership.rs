use super::utils::random_bitmap;
use commonware_roaring::{RoaringBitmap, SuccinctRank};
use criterion::{criterion_group, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

const QUERIES: usize = 10_000;

fn bench_insert(c: &mut Criterion) {
    for values in [1_000, 100_000] {
        let mut rng = StdRng::seed_from_u64(0);
        let inputs: Vec<u32> = (0..values).map(|_| rng.gen_range(0..1 << 24)).collect();
        c.bench_function(&format!("{}/fn=add values={values}", module_path!()), |b| {
            b.iter(|| {
                let mut bitmap = RoaringBitmap::new();
                for &value in &inputs {
                    bitmap.add(value);
                }
                black_box(bitmap)
            });
        });
    }
}

fn bench_queries(c: &mut Criterion) {
    let bitmap = random_bitmap(1, 200_000, 50);
    let mut rng = StdRng::seed_from_u64(2);
    let queries: Vec<u32> = (0..QUERIES).map(|_| rng.gen_range(0..1 << 24)).collect();
    c.bench_function(&format!("{}/fn=contains", module_path!()), |b| {
        b.iter(|| queries.iter().filter(|&&q| bitmap.contains(q)).count());
    });
    c.bench_function(&format!("{}/fn=rank", module_path!()), |b| {
        b.iter(|| queries.iter().map(|&q| bitmap.rank(q)).sum::<u64>());
    });
    let index = SuccinctRank::build(&bitmap);
    c.bench_function(&format!("{}/fn=succinct_rank", module_path!()), |b| {
        b.iter(|| queries.iter().map(|&q| index.rank(q)).sum::<u64>());
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_insert, bench_queries
}
