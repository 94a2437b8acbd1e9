//! Criterion micro-benchmarks for native arena allocation and release.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use loam_arena::NativeArena;
use std::hint::black_box;

fn bench_allocate_free(c: &mut Criterion) {
    let arena = NativeArena::with_defaults();
    c.bench_function("arena_allocate_free_256b", |b| {
        b.iter(|| {
            let mut handle = arena.allocate(black_box(256)).unwrap();
            arena.free(&mut handle);
        });
    });
}

fn bench_c_strings(c: &mut Criterion) {
    let arena = NativeArena::with_defaults();
    c.bench_function("arena_c_string_64", |b| {
        let text = "x".repeat(64);
        b.iter(|| {
            let mut handle = arena.alloc_c_string(black_box(&text)).unwrap();
            arena.free(&mut handle);
        });
    });
}

fn bench_free_all(c: &mut Criterion) {
    c.bench_function("arena_free_all_1k_blocks", |b| {
        b.iter_batched(
            || {
                let arena = NativeArena::with_defaults();
                for i in 0..1000 {
                    let _ = arena.allocate(16 + i % 128).unwrap();
                }
                arena
            },
            |arena| black_box(arena.free_all()),
            BatchSize::SmallInput,
        );
    });
}

fn bench_free_address(c: &mut Criterion) {
    c.bench_function("arena_free_address_among_1k", |b| {
        b.iter_batched(
            || {
                let arena = NativeArena::with_defaults();
                let handles: Vec<_> = (0..1000).map(|_| arena.allocate(32).unwrap()).collect();
                let target = handles[500].as_ptr();
                (arena, target)
            },
            |(arena, target)| black_box(arena.free_address(target)),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_allocate_free,
    bench_c_strings,
    bench_free_all,
    bench_free_address
);
criterion_main!(benches);
