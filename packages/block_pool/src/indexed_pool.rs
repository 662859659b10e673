use std::any::type_name;
use std::fmt;
use std::num::NonZero;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use tracing::debug;

use crate::{
    BackingAllocator, BlockPool, IndexedPoolBuilder, Result, SystemBacking, or_alloc_failure,
};

/// A positional container of `T` values stored in a [`BlockPool`].
///
/// Values are addressed by position, like the elements of an array. Unlike an array, removing a
/// value leaves a hole that the next added value fills, so positions of other values never
/// shift. Position `p` lives in block `p / block_capacity` at slot `p % block_capacity`.
///
/// Besides the number of live values, the container keeps a *logical size*: the number of
/// values the caller has asked it to hold, either by adding them one at a time or by
/// [resizing][Self::resize]. Removing values does not decrease the logical size, so the two
/// counts may diverge.
///
/// # Examples
///
/// ```
/// use block_pool::IndexedPool;
/// use new_zealand::nz;
///
/// let mut pool = IndexedPool::<i32>::with_block_capacity(nz!(4));
///
/// let a = pool.add(10);
/// let b = pool.add(20);
/// let c = pool.add(30);
/// assert_eq!((a, b, c), (0, 1, 2));
///
/// pool.remove_at(1);
/// assert!(pool.is_deleted(1));
///
/// // The hole is filled by the next value.
/// assert_eq!(pool.add(99), 1);
/// assert_eq!(pool[1], 99);
/// ```
pub struct IndexedPool<T, A: BackingAllocator = SystemBacking> {
    inner: BlockPool<T, A>,

    logical_size: usize,
}

impl<T> IndexedPool<T> {
    /// Creates an empty container with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an empty container whose blocks each hold `block_capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if a block of this many slots cannot be described by a valid memory layout.
    #[must_use]
    pub fn with_block_capacity(block_capacity: NonZero<usize>) -> Self {
        Self::builder().block_capacity(block_capacity).build()
    }

    /// Starts building a new [`IndexedPool`].
    pub fn builder() -> IndexedPoolBuilder<T> {
        IndexedPoolBuilder::new()
    }
}

impl<T, A: BackingAllocator> IndexedPool<T, A> {
    /// The number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// The number of values the caller has asked the container to hold.
    ///
    /// Incremented by [`add()`][Self::add], set by [`resize()`][Self::resize] and never
    /// decreased by removals.
    #[must_use]
    pub fn logical_size(&self) -> usize {
        self.logical_size
    }

    /// Whether the container holds no live values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The number of positions backed by storage, occupied or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// The number of values in each block.
    #[must_use]
    pub fn block_capacity(&self) -> NonZero<usize> {
        self.inner.block_capacity()
    }

    /// The number of blocks obtained so far.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.inner.block_count()
    }

    /// The pool that stores the values.
    #[must_use]
    pub fn as_block_pool(&self) -> &BlockPool<T, A> {
        &self.inner
    }

    /// Adds `value` in the first vacant slot and returns its position.
    ///
    /// # Panics
    ///
    /// Aborts if the backing allocator cannot provide memory for a new block.
    pub fn add(&mut self, value: T) -> usize {
        or_alloc_failure(self.try_add(value))
    }

    /// Adds `value` in the first vacant slot and returns its position.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing allocator cannot provide memory for a new block. The
    /// logical size is unchanged in that case.
    pub fn try_add(&mut self, value: T) -> Result<usize> {
        let position = self.inner.allocate(value)?;
        self.logical_size = self.logical_size.saturating_add(1);

        Ok(position)
    }

    /// Removes the value whose storage is at `ptr`.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` does not point into this container or the slot it points to is vacant.
    pub fn remove(&mut self, ptr: NonNull<T>) {
        let position = self.expect_position_of(ptr, "remove");
        self.inner.deallocate(position);
    }

    /// Removes the value at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position` is beyond the capacity or its slot is vacant.
    pub fn remove_at(&mut self, position: usize) {
        self.inner.deallocate(position);
    }

    /// Removes the value at position 0.
    ///
    /// # Panics
    ///
    /// Panics if position 0 is vacant or the container has no storage.
    pub fn remove_first(&mut self) {
        self.remove_at(0);
    }

    /// Removes the value most recently added, if it is still present.
    ///
    /// This is the value most recently handed a slot, which is not necessarily the one at the
    /// highest position because removed slots are reused.
    ///
    /// # Panics
    ///
    /// Panics if the most recently added value has already been removed, or nothing was ever
    /// added.
    pub fn remove_last(&mut self) {
        let Some(position) = self.inner.last_allocated() else {
            panic!(
                "remove_last() found no recently added value in pool of {}",
                type_name::<T>()
            );
        };

        self.inner.deallocate(position);
    }

    /// Sets the logical size to `size` and grows the storage to at least `size` positions.
    ///
    /// Slots are not initialized: new positions are vacant until values are added.
    ///
    /// # Panics
    ///
    /// Aborts if the backing allocator cannot provide the memory.
    pub fn resize(&mut self, size: usize) {
        or_alloc_failure(self.try_resize(size));
    }

    /// Sets the logical size to `size` and grows the storage to at least `size` positions.
    ///
    /// Storage is never shrunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing allocator cannot provide the memory. Blocks obtained
    /// before the failure are kept and the logical size is unchanged.
    pub fn try_resize(&mut self, size: usize) -> Result<()> {
        let required_blocks = size.div_ceil(self.block_capacity().get());
        let missing_blocks = required_blocks.saturating_sub(self.block_count());

        debug!(
            size,
            required_blocks,
            missing_blocks,
            item_type = type_name::<T>(),
            "resizing indexed pool"
        );

        self.inner.grow_by(missing_blocks)?;
        self.logical_size = size;

        Ok(())
    }

    /// A shared reference to the value at `position`, or `None` if the position is vacant or
    /// beyond the capacity.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&T> {
        self.inner.get(position)
    }

    /// An exclusive reference to the value at `position`, or `None` if the position is vacant or
    /// beyond the capacity.
    #[must_use]
    pub fn get_mut(&mut self, position: usize) -> Option<&mut T> {
        self.inner.get_mut(position)
    }

    /// Whether the slot at `position` has been removed or never filled.
    ///
    /// This walks the list of vacant slots.
    ///
    /// # Panics
    ///
    /// Panics if `position` is beyond the capacity.
    #[must_use]
    pub fn is_deleted(&self, position: usize) -> bool {
        assert!(
            position < self.capacity(),
            "is_deleted({position}) is beyond the {} positions of pool of {}",
            self.capacity(),
            type_name::<T>()
        );

        self.inner.is_free(position)
    }

    /// Whether the slot whose storage is at `ptr` has been removed or never filled.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` does not point into this container.
    #[must_use]
    pub fn is_deleted_ptr(&self, ptr: NonNull<T>) -> bool {
        let position = self.expect_position_of(ptr, "is_deleted_ptr");
        self.inner.is_free(position)
    }

    /// The position of the slot whose storage is at `ptr`, or `None` if the pointer does not
    /// point into this container.
    #[must_use]
    pub fn position_of(&self, ptr: NonNull<T>) -> Option<usize> {
        self.inner.slot_of(ptr)
    }

    /// Iterates over the live values together with their positions, in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.inner.iter()
    }

    fn expect_position_of(&self, ptr: NonNull<T>, operation: &str) -> usize {
        self.inner.slot_of(ptr).unwrap_or_else(|| {
            panic!(
                "{operation}() received a pointer {ptr:?} that does not belong to pool of {}",
                type_name::<T>()
            )
        })
    }
}

impl<T, A: BackingAllocator> From<BlockPool<T, A>> for IndexedPool<T, A> {
    /// Wraps an existing pool. Its live values count towards the logical size.
    fn from(inner: BlockPool<T, A>) -> Self {
        let logical_size = inner.len();

        Self {
            inner,
            logical_size,
        }
    }
}

impl<T, A: BackingAllocator> Index<usize> for IndexedPool<T, A> {
    type Output = T;

    fn index(&self, position: usize) -> &Self::Output {
        self.get(position).unwrap_or_else(|| {
            panic!(
                "position {position} is vacant or beyond the {} positions of pool of {}",
                self.capacity(),
                type_name::<T>()
            )
        })
    }
}

impl<T, A: BackingAllocator> IndexMut<usize> for IndexedPool<T, A> {
    fn index_mut(&mut self, position: usize) -> &mut Self::Output {
        let capacity = self.capacity();

        self.get_mut(position).unwrap_or_else(|| {
            panic!(
                "position {position} is vacant or beyond the {capacity} positions of pool of {}",
                type_name::<T>()
            )
        })
    }
}

impl<T> Default for IndexedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A> Clone for IndexedPool<T, A>
where
    T: Clone,
    A: BackingAllocator + Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            logical_size: self.logical_size,
        }
    }
}

impl<T, A: BackingAllocator> fmt::Debug for IndexedPool<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedPool")
            .field("inner", &self.inner)
            .field("logical_size", &self.logical_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use new_zealand::nz;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(IndexedPool<u32>: Send, Default, Clone);
    assert_not_impl_any!(IndexedPool<u32>: Sync);

    #[test]
    fn smoke_test() {
        let mut pool = IndexedPool::<i32>::with_block_capacity(nz!(4));

        assert_eq!(pool.add(10), 0);
        assert_eq!(pool.add(20), 1);
        assert_eq!(pool.add(30), 2);
        assert_eq!(pool.logical_size(), 3);

        pool.remove_at(1);
        assert!(pool.is_deleted(1));
        assert!(!pool.is_deleted(0));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.logical_size(), 3);

        assert_eq!(pool.add(99), 1);
        assert_eq!(pool.get(1), Some(&99));
        assert_eq!(pool[1], 99);
        assert_eq!(pool.logical_size(), 4);
    }

    #[test]
    fn positions_span_blocks() {
        let mut pool = IndexedPool::<usize>::with_block_capacity(nz!(3));

        for value in 0..7 {
            assert_eq!(pool.add(value * 10), value);
        }

        assert_eq!(pool.block_count(), 3);
        assert_eq!(pool[4], 40);

        pool.remove_at(4);
        assert_eq!(pool.get(4), None);
        assert_eq!(pool.get(5), Some(&50));
    }

    #[test]
    fn index_mut_writes_through() {
        let mut pool = IndexedPool::<String>::with_block_capacity(nz!(2));
        let position = pool.add("left".to_string());

        pool[position].push_str(" right");
        *pool.get_mut(position).unwrap() += "!";

        assert_eq!(pool[position], "left right!");
    }

    #[test]
    #[should_panic]
    fn index_vacant_panics() {
        let mut pool = IndexedPool::<i32>::with_block_capacity(nz!(4));
        _ = pool.add(1);

        let _value = pool[2];
    }

    #[test]
    #[should_panic]
    fn index_beyond_capacity_panics() {
        let pool = IndexedPool::<i32>::with_block_capacity(nz!(4));

        let _value = pool[0];
    }

    #[test]
    fn remove_by_pointer() {
        let mut pool = IndexedPool::<u64>::with_block_capacity(nz!(4));
        _ = pool.add(1);
        let position = pool.add(2);

        let ptr = NonNull::from(&pool[position]);
        assert_eq!(pool.position_of(ptr), Some(position));
        assert!(!pool.is_deleted_ptr(ptr));

        pool.remove(ptr);

        assert!(pool.is_deleted_ptr(ptr));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    #[should_panic]
    fn remove_foreign_pointer_panics() {
        let mut pool = IndexedPool::<u64>::with_block_capacity(nz!(4));
        _ = pool.add(1);

        let outsider = 1_u64;
        pool.remove(NonNull::from(&outsider));
    }

    #[test]
    fn remove_first_removes_position_zero() {
        let mut pool = IndexedPool::<u32>::with_block_capacity(nz!(4));
        _ = pool.add(1);
        _ = pool.add(2);

        pool.remove_first();

        assert!(pool.is_deleted(0));
        assert_eq!(pool.get(1), Some(&2));
    }

    #[test]
    fn remove_last_follows_most_recent_add() {
        let mut pool = IndexedPool::<u32>::with_block_capacity(nz!(4));
        _ = pool.add(1);
        _ = pool.add(2);
        _ = pool.add(3);

        pool.remove_at(0);
        // Reuses slot 0, which is now the most recently added value.
        _ = pool.add(4);

        pool.remove_last();

        assert!(pool.is_deleted(0));
        assert_eq!(pool.get(2), Some(&3));
    }

    #[test]
    #[should_panic]
    fn remove_last_twice_panics() {
        let mut pool = IndexedPool::<u32>::with_block_capacity(nz!(4));
        _ = pool.add(1);
        _ = pool.add(2);

        pool.remove_last();
        pool.remove_last();
    }

    #[test]
    #[should_panic]
    fn remove_last_on_fresh_pool_panics() {
        let mut pool = IndexedPool::<u32>::new();

        pool.remove_last();
    }

    #[test]
    fn resize_grows_storage_without_values() {
        let mut pool = IndexedPool::<u32>::with_block_capacity(nz!(4));

        pool.resize(9);

        assert_eq!(pool.logical_size(), 9);
        assert_eq!(pool.block_count(), 3);
        assert!(pool.is_empty());
        assert!(pool.is_deleted(8));
        assert_eq!(pool.get(8), None);
    }

    #[test]
    fn add_after_resize_starts_at_position_zero() {
        let mut pool = IndexedPool::<u32>::with_block_capacity(nz!(4));

        pool.resize(10);

        assert_eq!(pool.add(3), 0);
        assert_eq!(pool.add(1545), 1);
        assert_eq!(pool.get(1), Some(&1545));
        assert_eq!(pool[0], 3);

        for expected in 2..12 {
            assert_eq!(pool.add(0), expected);
        }

        assert_eq!(pool.block_count(), 3);
    }

    #[test]
    fn resize_on_block_boundary_does_not_overshoot() {
        let mut pool = IndexedPool::<u32>::with_block_capacity(nz!(4));

        pool.resize(8);
        assert_eq!(pool.block_count(), 2);

        pool.resize(0);
        assert_eq!(pool.logical_size(), 0);
        assert_eq!(pool.block_count(), 2);
    }

    #[test]
    fn removals_keep_logical_size() {
        let mut pool = IndexedPool::<u32>::with_block_capacity(nz!(4));
        _ = pool.add(1);
        _ = pool.add(2);

        pool.remove_at(0);
        pool.remove_at(1);

        assert_eq!(pool.len(), 0);
        assert_eq!(pool.logical_size(), 2);
    }

    #[test]
    #[should_panic]
    fn is_deleted_beyond_capacity_panics() {
        let pool = IndexedPool::<u32>::with_block_capacity(nz!(4));

        _ = pool.is_deleted(0);
    }

    #[test]
    fn iter_skips_holes() {
        let mut pool = IndexedPool::<char>::with_block_capacity(nz!(4));
        for value in ['a', 'b', 'c'] {
            _ = pool.add(value);
        }
        pool.remove_at(1);

        let items: Vec<_> = pool.iter().map(|(position, value)| (position, *value)).collect();

        assert_eq!(items, vec![(0, 'a'), (2, 'c')]);
    }

    #[test]
    fn clone_copies_values_and_logical_size() {
        let mut pool = IndexedPool::<String>::with_block_capacity(nz!(2));
        _ = pool.add("one".to_string());
        _ = pool.add("two".to_string());
        _ = pool.add("three".to_string());
        pool.remove_at(1);

        let copy = pool.clone();

        assert_eq!(copy.logical_size(), 3);
        assert_eq!(copy.len(), 2);
        assert_eq!(copy[2], "three");
        assert!(copy.is_deleted(1));
    }

    #[test]
    fn drop_tears_down_remaining_values() {
        struct Droppable {
            dropped: Rc<Cell<usize>>,
        }

        impl Drop for Droppable {
            fn drop(&mut self) {
                self.dropped.set(self.dropped.get() + 1);
            }
        }

        let dropped = Rc::new(Cell::new(0));

        {
            let mut pool = IndexedPool::<Droppable>::with_block_capacity(nz!(2));

            for _ in 0..3 {
                _ = pool.add(Droppable {
                    dropped: Rc::clone(&dropped),
                });
            }

            pool.remove_first();
            assert_eq!(dropped.get(), 1);
        }

        assert_eq!(dropped.get(), 3);
    }

    #[test]
    fn from_block_pool_counts_live_values() {
        let mut inner = BlockPool::<u8>::with_block_capacity(nz!(4));
        _ = inner.allocate_many([1, 2, 3]).unwrap();

        let pool = IndexedPool::from(inner);

        assert_eq!(pool.logical_size(), 3);
        assert_eq!(pool[2], 3);
    }
}
