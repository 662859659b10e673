//! Basic usage of the `block_pool` crate:
//!
//! * Reserving storage up front.
//! * Adding values and reading them back by position.
//! * Removing values and refilling the holes they leave.
//! * Copying a pool.
//!
//! Run with `RUST_LOG=block_pool=debug` to see block growth events.

use std::time::Instant;

use block_pool::IndexedPool;
use tracing_subscriber::EnvFilter;

const COUNT: usize = 10_000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut pool = IndexedPool::<u64>::new();

    // Obtaining the blocks ahead of time keeps growth out of the insertion loop.
    pool.resize(COUNT);
    println!(
        "Reserved {} blocks of {} slots for {} values",
        pool.block_count(),
        pool.block_capacity(),
        pool.logical_size()
    );

    let start = Instant::now();
    for value in 0..COUNT {
        _ = pool.add(u64::try_from(value).unwrap());
    }
    let pool_elapsed = start.elapsed();

    let start = Instant::now();
    let mut items = Vec::with_capacity(COUNT);
    for value in 0..COUNT {
        items.push(u64::try_from(value).unwrap());
    }
    let vec_elapsed = start.elapsed();

    println!("Added {COUNT} values to the pool in {pool_elapsed:?} and to a Vec in {vec_elapsed:?}");

    // Positions are stable; reading back uses the same arithmetic as indexing a Vec.
    println!("Value at position 500: {}", pool[500]);

    pool.remove_at(500);
    println!("Position 500 deleted: {}", pool.is_deleted(500));

    // The hole left behind is the first slot to be reused.
    let position = pool.add(123_456);
    println!("New value landed at position {position}: {}", pool[position]);

    let copy = pool.clone();
    println!(
        "Copy holds {} values, position {position} reads {}",
        copy.len(),
        copy[position]
    );
}
