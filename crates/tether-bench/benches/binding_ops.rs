//! Criterion micro-benchmarks for the weak binding cache stack.

use std::hint::black_box;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, Criterion};
use tether_bench::{call_scope, BenchRow};
use tether_bind::{BindingStack, NativeStruct};
use tether_core::BlockAddr;
use tether_test_utils::{shared_stack, small_tree};

fn addr(i: u32) -> BlockAddr {
    BlockAddr::new(1, 0, i * 8)
}

/// Benchmark: bind 1K wrappers into a fresh cache, then pop it.
fn bench_bind_pop_1k(c: &mut Criterion) {
    let mut stack = BindingStack::with_capacity(1024);
    let rows: Vec<_> = (0..1024).map(|_| Rc::new(BenchRow::default())).collect();

    c.bench_function("bind_pop_1k", |b| {
        b.iter(|| {
            let previous = stack.push();
            for (i, row) in rows.iter().enumerate() {
                BenchRow::init(row, &mut stack, addr(i as u32));
            }
            stack.pop(previous).unwrap();
        });
    });
}

/// Benchmark: cached lookups against a 1K-entry cache.
fn bench_obtain_hit_1k(c: &mut Criterion) {
    let mut stack = BindingStack::with_capacity(1024);
    let rows: Vec<_> = (0..1024).map(|_| Rc::new(BenchRow::default())).collect();
    for (i, row) in rows.iter().enumerate() {
        stack.bind(addr(i as u32), row);
    }

    c.bench_function("obtain_hit_1k", |b| {
        b.iter(|| {
            for i in 0..1024 {
                black_box(stack.obtain::<BenchRow>(addr(i)));
            }
        });
    });
}

/// Benchmark: one full call scope binding 64 rows.
///
/// Each call runs under a throwaway parent so the interceptor records it
/// charges are reclaimed every iteration.
fn bench_call_scope_64(c: &mut Criterion) {
    let mut tree = small_tree();
    let stack = shared_stack();
    let root = tree.root();

    c.bench_function("call_scope_64", |b| {
        b.iter(|| {
            let outer = tree.create(root, "outer").unwrap();
            let rows = call_scope(&mut tree, &stack, outer, 64).unwrap();
            tree.delete(outer).unwrap();
            black_box(rows.last().map(|row| row.has_valid_address()));
        });
    });
}

criterion_group!(
    benches,
    bench_bind_pop_1k,
    bench_obtain_hit_1k,
    bench_call_scope_64
);
criterion_main!(benches);
