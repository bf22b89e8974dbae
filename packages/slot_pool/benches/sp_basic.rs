//! Basic benchmarks for the `slot_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use slot_pool::SlotPool;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = usize;
const GROW_SIZE: usize = 1024;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("sp_basic");

    let allocs_op = allocs.operation("build_empty");
    group.bench_function("build_empty", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(SlotPool::<TestItem, GROW_SIZE>::new()));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("allocate_one");
    group.bench_function("allocate_one", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(SlotPool::<TestItem, GROW_SIZE>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.allocate().unwrap());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("recycle_one");
    group.bench_function("recycle_one", |b| {
        // Steady state: the free list always has a slot, so no block is ever obtained.
        b.iter_custom(|iters| {
            let mut pool = SlotPool::<TestItem, GROW_SIZE>::new();

            let primed = pool.allocate().unwrap();
            // SAFETY: The slot came from this pool and holds no constructed value.
            unsafe { pool.deallocate(primed) };

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let slot = black_box(pool.allocate().unwrap());

                // SAFETY: The slot came from this pool and holds no constructed value.
                unsafe { pool.deallocate(slot) };
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("sp_slow");

    let allocs_op = allocs.operation("allocate_10k");
    group.bench_function("allocate_10k", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(SlotPool::<TestItem, GROW_SIZE>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                for _ in 0..10_000 {
                    _ = black_box(pool.allocate().unwrap());
                }
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("forward_10_back_5_times_1000");
    group.bench_function("forward_10_back_5_times_1000", |b| {
        // We take 10 slots, return the first 5 and repeat this 1000 times.
        // This keeps both the free list and the untouched-slot path busy.
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(SlotPool::<TestItem, GROW_SIZE>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let mut to_return = Vec::with_capacity(5);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                for _ in 0..1000 {
                    to_return.clear();

                    // Take the 5 that we will later return.
                    for _ in 0..5 {
                        to_return.push(pool.allocate().unwrap());
                    }

                    // Take the 5 that we will keep.
                    for _ in 0..5 {
                        _ = black_box(pool.allocate().unwrap());
                    }

                    // Return the first 5.
                    for slot in to_return.drain(..) {
                        // SAFETY: The slot came from this pool and holds no constructed value.
                        unsafe { pool.deallocate(slot) };
                    }
                }
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("deallocate_10k");
    group.bench_function("deallocate_10k", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(SlotPool::<TestItem, GROW_SIZE>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let slot_sets = pools
                .iter_mut()
                .map(|pool| {
                    iter::repeat_with(|| pool.allocate().unwrap())
                        .take(10_000)
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for (pool, slot_set) in pools.iter_mut().zip(&slot_sets) {
                for slot in slot_set {
                    // SAFETY: Each slot came from this pool, exactly once, holding no value.
                    unsafe { pool.deallocate(*slot) };
                }
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
