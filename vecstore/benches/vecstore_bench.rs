use criterion::{black_box, criterion_group, criterion_main, Criterion};
use faceid_vecstore::{BackendKind, IndexConfig, Prototype, PrototypeIndex};

fn random_unit_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut v = Vec::with_capacity(dim);
    let mut state = seed;
    for _ in 0..dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        v.push(((state >> 33) as f32) / (u32::MAX as f32) - 0.5);
    }
    v
}

fn prototypes(n: usize, dim: usize) -> Vec<Prototype> {
    (0..n)
        .map(|i| Prototype::new(format!("p{i}"), random_unit_vec(dim, i as u64 + 1)))
        .collect()
}

fn open(kind: BackendKind) -> PrototypeIndex {
    PrototypeIndex::with_backend(
        IndexConfig {
            cache_capacity: 0,
            ..IndexConfig::default()
        },
        kind,
    )
}

fn bench_add(c: &mut Criterion) {
    let idx = open(BackendKind::Exact);
    idx.bulk_load(prototypes(10_000, 512)).unwrap();
    let emb = random_unit_vec(512, 424242);

    c.bench_function("vecstore_exact_add_512d_10k", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            idx.add(black_box(&format!("new{}", i % 1000)), black_box(&emb), None)
                .unwrap();
        });
    });
}

fn bench_search(c: &mut Criterion) {
    let batch = prototypes(10_000, 512);
    let query = random_unit_vec(512, 999_999);

    let exact = open(BackendKind::Exact);
    exact.bulk_load(batch.clone()).unwrap();
    c.bench_function("vecstore_exact_search_512d_10k", |b| {
        b.iter(|| {
            let _ = black_box(exact.search(black_box(&query), 5, 0.5));
        });
    });

    let approx = open(BackendKind::Approximate);
    approx.bulk_load(batch).unwrap();
    c.bench_function("vecstore_ivf_search_512d_10k", |b| {
        b.iter(|| {
            let _ = black_box(approx.search(black_box(&query), 5, 0.5));
        });
    });
}

fn bench_bulk_load(c: &mut Criterion) {
    let batch = prototypes(10_000, 512);
    c.bench_function("vecstore_exact_bulk_load_512d_10k", |b| {
        b.iter_with_setup(
            || (open(BackendKind::Exact), batch.clone()),
            |(idx, batch)| idx.bulk_load(black_box(batch)).unwrap(),
        );
    });
}

criterion_group!(benches, bench_add, bench_search, bench_bulk_load);
criterion_main!(benches);
