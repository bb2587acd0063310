use super::utils::random_bitmap;
use commonware_codec::Encode;
use commonware_roaring::RoaringBitmap;
use criterion::{criterion_group, Criterion};
use std::hint::black_box;

fn bench_codec(c: &mut Criterion) {
    for optimize in [false, true] {
        let mut bitmap = random_bitmap(7, 100_000, 100);
        if optimize {
            bitmap.run_optimize();
        }
        let encoded = bitmap.encode();
        c.bench_function(
            &format!("{}/fn=encode runs={optimize}", module_path!()),
            |b| b.iter(|| black_box(bitmap.encode())),
        );
        c.bench_function(
            &format!("{}/fn=decode runs={optimize}", module_path!()),
            |b| {
                b.iter(|| {
                    let mut buf = encoded.as_ref();
                    black_box(RoaringBitmap::deserialize(&mut buf).unwrap())
                })
            },
        );
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_codec
}
