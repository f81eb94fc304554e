//! # Pool Benchmark
//!
//! Allocation, lookup and churn for both key layouts.
//!
//! Run with: `cargo bench --package stagecraft_core --bench pool_benchmark`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stagecraft_core::{FixedSizePool, KeyLayout, PoolConfig};

const LAYOUTS: [(&str, KeyLayout); 2] = [
    ("unbounded", KeyLayout::Unbounded),
    (
        "bounded",
        KeyLayout::Bounded {
            maximum_block_count: 27,
        },
    ),
];

fn config(key_layout: KeyLayout) -> PoolConfig {
    PoolConfig {
        key_layout,
        ..PoolConfig::default()
    }
}

/// Fill a fresh pool, growing through several blocks.
fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_allocate");

    for (name, layout) in LAYOUTS {
        for count in [1_000_u32, 100_000] {
            group.bench_with_input(BenchmarkId::new(name, count), &count, |b, &count| {
                b.iter(|| {
                    let mut pool = FixedSizePool::new(config(layout));
                    for i in 0..count {
                        black_box(pool.allocate(i));
                    }
                    pool
                });
            });
        }
    }
    group.finish();
}

/// Resolve every key. Unbounded keys walk the block list.
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_resolve");

    for (name, layout) in LAYOUTS {
        let mut pool = FixedSizePool::new(config(layout));
        let keys: Vec<_> = (0..100_000_u32).map(|i| pool.allocate(i)).collect();
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut sum = 0_u64;
                for key in &keys {
                    sum += u64::from(*pool.get(*key).unwrap_or(&0));
                }
                black_box(sum)
            });
        });
    }
    group.finish();
}

/// Steady-state free/allocate churn through the free list.
fn bench_churn(c: &mut Criterion) {
    let mut pool = FixedSizePool::new(PoolConfig::default());
    let mut keys: Vec<_> = (0..10_000_u32).map(|i| pool.allocate(i)).collect();

    c.bench_function("pool_churn_10k", |b| {
        b.iter(|| {
            for key in &mut keys {
                let value = pool.free(*key).unwrap_or_default();
                *key = pool.allocate(black_box(value));
            }
        });
    });
}

criterion_group!(benches, bench_allocate, bench_resolve, bench_churn);
criterion_main!(benches);
