//! A fixed-block object pool with constant-time allocation and positional access.
//!
//! This crate provides two containers:
//!
//! * [`BlockPool`] stores values of a single type `T` in blocks of a fixed number of slots.
//!   Vacant slots form an intrusive free list, so storing a value pops the head of the list and
//!   removing one pushes its slot back. When no vacant slot remains, the pool grows by exactly
//!   one block. Blocks are never moved or released until the pool is dropped, so values have
//!   stable addresses.
//! * [`IndexedPool`] layers an array-like interface over a [`BlockPool`]: values are addressed
//!   by position, removing a value leaves a hole that the next added value fills, and the
//!   container can be resized up front to avoid growth during a hot loop.
//!
//! Block memory comes from a [`BackingAllocator`], which also constructs and tears down the
//! values in their slots. The default, [`SystemBacking`], uses the global Rust allocator.
//!
//! # Positions
//!
//! Every slot is identified by a position: `block_index * block_capacity + index_in_block`.
//! Positions stay valid for as long as the value remains in the pool and are reused afterwards.
//!
//! # Alignment
//!
//! Every slot satisfies the alignment of `T`. With [`AlignmentPolicy::Aligned`] (the default)
//! each block is requested byte-aligned with extra headroom and the first slot is shifted to the
//! first suitably aligned address. With [`AlignmentPolicy::Unadjusted`] the backing allocator is
//! asked for the alignment directly.
//!
//! # Examples
//!
//! ```
//! use block_pool::IndexedPool;
//!
//! let mut pool = IndexedPool::<u64>::new();
//!
//! // Reserve room for 10 000 values ahead of time.
//! pool.resize(10_000);
//! assert!(pool.block_count() >= 3);
//!
//! let position = pool.add(42);
//! assert_eq!(pool[position], 42);
//!
//! pool.remove_at(position);
//! assert!(pool.is_deleted(position));
//! ```
//!
//! # Logging
//!
//! Block growth, resizing and allocation failures are reported as [`tracing`] events. The crate
//! does not install a subscriber.
//!
//! # Thread safety
//!
//! Both containers are thread-mobile ([`Send`]) if `T` and the backing allocator are, but not
//! thread-safe ([`Sync`]).

mod alignment;
mod backing;
mod block;
mod block_pool;
mod builder;
mod coordinates;
mod drop_policy;
mod error;
mod indexed_pool;

pub use alignment::AlignmentPolicy;
pub(crate) use alignment::padding_for;
pub use backing::*;
pub(crate) use block::*;
pub use block_pool::*;
pub use builder::*;
pub(crate) use coordinates::*;
pub use drop_policy::*;
pub(crate) use error::or_alloc_failure;
pub use error::{Error, Result};
pub use indexed_pool::*;
