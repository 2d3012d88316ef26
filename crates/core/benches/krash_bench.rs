//! Benchmarks for light and full hashing

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use krash_core::{Full, Light, Params, build_cache};

fn testing_light() -> Light {
    Light::with_params(0, Params::testing()).expect("testing params are valid")
}

fn bench_light_hash(c: &mut Criterion) {
    let light = testing_light();
    let header = [0x42u8; 32];

    c.bench_function("krash_light", |b| {
        let mut nonce: u64 = 0;
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            light.compute(black_box(&header), nonce)
        })
    });
}

fn bench_full_hash(c: &mut Criterion) {
    let light = testing_light();
    let full = Full::new(&light, |_| true).expect("dataset fits in memory");
    let header = [0x42u8; 32];

    c.bench_function("krash_full", |b| {
        let mut nonce: u64 = 0;
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            full.compute(black_box(&header), nonce)
        })
    });
}

fn bench_cache_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("krash_cache");
    for size in [832u64, 64 * 1021] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| build_cache(black_box(&[0u8; 32]), size))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_light_hash, bench_full_hash, bench_cache_build);
criterion_main!(benches);
