use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use faceid_assign::{AssignConfig, PrototypeAssigner};
use faceid_vecstore::{IndexConfig, Prototype, PrototypeIndex};

fn random_unit_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut v = Vec::with_capacity(dim);
    let mut state = seed;
    for _ in 0..dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        v.push(((state >> 33) as f32) / (u32::MAX as f32) - 0.5);
    }
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let s = (1.0 / norm) as f32;
        for x in &mut v {
            *x *= s;
        }
    }
    v
}

fn assigner(n: usize) -> PrototypeAssigner {
    let index = Arc::new(PrototypeIndex::open(
        IndexConfig {
            cache_capacity: 0,
            ..IndexConfig::default()
        },
        n,
    ));
    let batch: Vec<Prototype> = (0..n)
        .map(|i| Prototype::new(format!("person:{i:05}"), random_unit_vec(512, i as u64 + 1)))
        .collect();
    index.bulk_load(batch).unwrap();
    PrototypeAssigner::new(index, AssignConfig::default()).unwrap()
}

fn bench_assign(c: &mut Criterion) {
    let a = assigner(1000);
    let emb = random_unit_vec(512, 999);

    c.bench_function("assign_single_512d_1k", |b| {
        b.iter(|| {
            let _ = black_box(a.assign(black_box(&emb)));
        });
    });
}

fn bench_batch(c: &mut Criterion) {
    let a = assigner(1000);
    let items: Vec<(usize, Vec<f32>)> = (0..256)
        .map(|i| (i, random_unit_vec(512, 10_000 + i as u64)))
        .collect();

    c.bench_function("assign_batch_256_512d_1k", |b| {
        b.iter(|| {
            let _ = black_box(a.batch(black_box(&items)));
        });
    });
}

criterion_group!(benches, bench_assign, bench_batch);
criterion_main!(benches);
