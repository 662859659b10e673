use std::alloc::{Layout, handle_alloc_error};

use thiserror::Error;

/// Errors that can occur when a pool needs more storage from its backing allocator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The backing allocator could not provide the memory needed for a new block.
    #[error("backing allocator failed to provide {} bytes aligned to {}", layout.size(), layout.align())]
    OutOfMemory {
        /// The layout that was requested from the backing allocator.
        layout: Layout,
    },

    /// The size of a block could not be represented as a valid memory layout.
    #[error("block of {block_capacity} slots of {slot_size} bytes exceeds the maximum layout size")]
    CapacityOverflow {
        /// The number of slots in each block of the pool.
        block_capacity: usize,

        /// The size of one slot, in bytes.
        slot_size: usize,
    },
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

/// Unwraps the result of an operation that needed memory, treating failure the same way the
/// standard collections do: out of memory aborts via [`handle_alloc_error`], an impossible
/// layout panics.
pub(crate) fn or_alloc_failure<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(Error::OutOfMemory { layout }) => handle_alloc_error(layout),
        Err(error) => panic!("{error}"),
    }
}
