//! Criterion micro-benchmarks for interceptor installation and dispatch.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tether_intercept::ScopeHooks;
use tether_test_utils::{small_tree, EventLog};

/// Benchmark: create a context, register four observers, delete it.
fn bench_scope_churn_4(c: &mut Criterion) {
    let mut tree = small_tree();
    let log = EventLog::new();
    let observers: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|label| log.scope_observer(label))
        .collect();
    // Records and links are charged to `outer`; resetting it reclaims them.
    let outer = tree.create(tree.root(), "outer").unwrap();

    c.bench_function("scope_churn_4", |b| {
        b.iter(|| {
            let ctx = tree.create(outer, "call").unwrap();
            for observer in &observers {
                tree.add_end_of_scope_observer(ctx, observer.clone()).unwrap();
            }
            tree.delete(ctx).unwrap();
            tree.reset(outer).unwrap();
            log.clear();
        });
    });
}

/// Benchmark: alloc + free through an interceptor with a free observer,
/// then a reset to reclaim the bump storage.
fn bench_intercepted_free(c: &mut Criterion) {
    let mut tree = small_tree();
    let log = EventLog::new();
    let ctx = tree.create(tree.root(), "call").unwrap();
    tree.set_free_observer(ctx, Some(log.free_observer("f")))
        .unwrap();

    c.bench_function("intercepted_free", |b| {
        b.iter(|| {
            let block = tree.alloc(ctx, 8).unwrap();
            tree.free(ctx, block).unwrap();
            tree.reset(ctx).unwrap();
            log.clear();
            black_box(block);
        });
    });
}

criterion_group!(benches, bench_scope_churn_4, bench_intercepted_free);
criterion_main!(benches);
