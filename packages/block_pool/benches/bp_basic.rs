//! Basic benchmarks for the `block_pool` crate, comparing bulk insertion against `Vec`.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use block_pool::{BlockPool, IndexedPool};
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;

const BULK_COUNT: usize = 10_000;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("bp_basic");

    let allocs_op = allocs.operation("allocate_first");
    group.bench_function("allocate_first", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(BlockPool::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.allocate(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("allocate_reused");
    group.bench_function("allocate_reused", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(BlockPool::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            // Leave one vacant slot at the head of each free list.
            for pool in &mut pools {
                let position = pool.allocate(TEST_VALUE).unwrap();
                pool.deallocate(position);
            }

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.allocate(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("indexed_add_bulk");
    group.bench_function("indexed_add_bulk", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut pool = IndexedPool::<TestItem>::new();
                pool.resize(BULK_COUNT);

                for value in 0..BULK_COUNT {
                    _ = black_box(pool.add(black_box(value)));
                }

                drop(black_box(pool));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("vec_push_bulk");
    group.bench_function("vec_push_bulk", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut items = Vec::<TestItem>::with_capacity(BULK_COUNT);

                for value in 0..BULK_COUNT {
                    items.push(black_box(value));
                }

                drop(black_box(items));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("indexed_get");
    group.bench_function("indexed_get", |b| {
        let mut pool = IndexedPool::<TestItem>::new();
        for value in 0..BULK_COUNT {
            _ = pool.add(value);
        }

        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for iteration in 0..iters {
                let position = usize::try_from(iteration).unwrap() % BULK_COUNT;
                _ = black_box(pool.get(black_box(position)));
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
