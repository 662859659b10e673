use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

use crate::{Error, Result};

/// The capability a pool relies on to obtain raw block memory and to construct and tear down
/// the values stored in its slots.
///
/// The pool asks for one raw allocation per block and returns it when the pool is dropped.
/// Values are constructed into vacant slots and torn down when a slot is deallocated or
/// when the pool is dropped with values still present.
///
/// The default implementation, [`SystemBacking`], uses the global Rust allocator. Custom
/// implementations can be used to route block memory elsewhere or to observe value
/// lifecycles.
///
/// # Examples
///
/// ```
/// use std::alloc::Layout;
/// use std::ptr::NonNull;
///
/// use block_pool::{BackingAllocator, BlockPool, Result, SystemBacking};
///
/// #[derive(Debug, Default)]
/// struct CountingBacking {
///     inner: SystemBacking,
///     blocks: usize,
/// }
///
/// impl BackingAllocator for CountingBacking {
///     fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>> {
///         self.blocks += 1;
///         self.inner.allocate(layout)
///     }
///
///     unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
///         // SAFETY: Forwarding the caller's guarantees.
///         unsafe { self.inner.deallocate(ptr, layout) }
///     }
/// }
///
/// let mut pool = BlockPool::<u64>::builder()
///     .backing(CountingBacking::default())
///     .build();
///
/// pool.allocate(42).unwrap();
/// assert_eq!(pool.backing().blocks, 1);
/// ```
pub trait BackingAllocator {
    /// Allocates a raw memory region satisfying `layout`.
    ///
    /// The layout is never zero-sized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the memory cannot be provided.
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>>;

    /// Releases a memory region previously returned by [`allocate()`][Self::allocate].
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` was returned by `allocate()` on this same allocator
    /// with exactly this `layout` and that it has not already been released.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);

    /// Moves `value` into the slot at `slot`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `slot` is valid for writes, properly aligned for `T` and
    /// does not currently hold a live value.
    unsafe fn construct<T>(&mut self, slot: NonNull<T>, value: T) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            slot.write(value);
        }
    }

    /// Tears down the live value at `slot`, leaving the slot's memory uninitialized.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `slot` holds a live value of type `T` that is not used again
    /// after this call.
    unsafe fn destroy<T>(&mut self, slot: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            slot.drop_in_place();
        }
    }
}

/// A [`BackingAllocator`] that obtains block memory from the global Rust allocator.
///
/// This is the backing allocator used by pools unless configured otherwise.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SystemBacking;

impl BackingAllocator for SystemBacking {
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>> {
        debug_assert!(layout.size() > 0, "block layouts are never zero-sized");

        // SAFETY: The layout is not zero-sized, as pools always request room for at least
        // one slot plus headroom.
        NonNull::new(unsafe { alloc(layout) }).ok_or(Error::OutOfMemory { layout })
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: The caller guarantees that the pointer came from `alloc()` with this layout.
        unsafe {
            dealloc(ptr.as_ptr(), layout);
        }
    }
}
