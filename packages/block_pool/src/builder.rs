use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;

use crate::{
    AlignmentPolicy, BackingAllocator, BlockLayout, BlockPool, DEFAULT_BLOCK_CAPACITY, DropPolicy,
    IndexedPool, Result, SystemBacking, or_alloc_failure,
};

/// Builder for creating an instance of [`BlockPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`BlockPool::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use block_pool::{AlignmentPolicy, BlockPool, DropPolicy};
/// use new_zealand::nz;
///
/// let pool = BlockPool::<u32>::builder()
///     .block_capacity(nz!(256))
///     .alignment(AlignmentPolicy::Aligned)
///     .drop_policy(DropPolicy::MayDropItems)
///     .build();
///
/// assert_eq!(pool.block_capacity().get(), 256);
/// ```
///
/// [1]: BlockPool::new
#[must_use]
pub struct BlockPoolBuilder<T, A = SystemBacking> {
    block_capacity: NonZero<usize>,
    alignment: AlignmentPolicy,
    drop_policy: DropPolicy,
    initial_blocks: usize,
    backing: A,

    _item: PhantomData<T>,
}

impl<T, A> fmt::Debug for BlockPoolBuilder<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("backing_type", &format_args!("{}", type_name::<A>()))
            .field("block_capacity", &self.block_capacity)
            .field("alignment", &self.alignment)
            .field("drop_policy", &self.drop_policy)
            .field("initial_blocks", &self.initial_blocks)
            .finish_non_exhaustive()
    }
}

impl<T> BlockPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            alignment: AlignmentPolicy::default(),
            drop_policy: DropPolicy::default(),
            initial_blocks: 0,
            backing: SystemBacking,
            _item: PhantomData,
        }
    }
}

impl<T, A> BlockPoolBuilder<T, A> {
    /// Sets the number of slots in each block. Every block of the pool has this many slots.
    ///
    /// Defaults to [`DEFAULT_BLOCK_CAPACITY`].
    pub fn block_capacity(mut self, block_capacity: NonZero<usize>) -> Self {
        self.block_capacity = block_capacity;
        self
    }

    /// Sets how the first slot of each block is placed within the block's raw memory.
    pub fn alignment(mut self, alignment: AlignmentPolicy) -> Self {
        self.alignment = alignment;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat remaining values in the pool when the pool is dropped.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Sets the number of blocks to obtain eagerly when the pool is built.
    ///
    /// Defaults to zero, in which case the first block is obtained on first allocation.
    pub fn initial_blocks(mut self, count: usize) -> Self {
        self.initial_blocks = count;
        self
    }

    /// Sets the backing allocator the pool obtains its blocks from.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::{BlockPool, SystemBacking};
    ///
    /// let pool = BlockPool::<u8>::builder().backing(SystemBacking).build();
    /// ```
    pub fn backing<B: BackingAllocator>(self, backing: B) -> BlockPoolBuilder<T, B> {
        BlockPoolBuilder {
            block_capacity: self.block_capacity,
            alignment: self.alignment,
            drop_policy: self.drop_policy,
            initial_blocks: self.initial_blocks,
            backing,
            _item: PhantomData,
        }
    }
}

impl<T, A: BackingAllocator> BlockPoolBuilder<T, A> {
    /// Builds the pool with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a block of the configured capacity cannot be described by a valid
    /// memory layout or if the backing allocator fails to provide the initial blocks.
    pub fn try_build(self) -> Result<BlockPool<T, A>> {
        let layout = BlockLayout::calculate::<T>(self.block_capacity, self.alignment)?;

        let mut pool = BlockPool::new_inner(layout, self.drop_policy, self.backing);
        pool.grow_by(self.initial_blocks)?;

        Ok(pool)
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if a block of the configured capacity cannot be described by a valid memory
    /// layout. Aborts if the backing allocator fails to provide the initial blocks.
    #[must_use]
    pub fn build(self) -> BlockPool<T, A> {
        or_alloc_failure(self.try_build())
    }
}

/// Builder for creating an instance of [`IndexedPool`].
///
/// Offers the same settings as [`BlockPoolBuilder`], applied to the pool that backs the
/// indexed container.
///
/// # Examples
///
/// ```
/// use block_pool::IndexedPool;
/// use new_zealand::nz;
///
/// let pool = IndexedPool::<i32>::builder()
///     .block_capacity(nz!(4))
///     .initial_blocks(1)
///     .build();
///
/// assert_eq!(pool.capacity(), 4);
/// assert_eq!(pool.logical_size(), 0);
/// ```
#[must_use]
pub struct IndexedPoolBuilder<T, A = SystemBacking> {
    inner: BlockPoolBuilder<T, A>,
}

impl<T, A> fmt::Debug for IndexedPoolBuilder<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedPoolBuilder")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<T> IndexedPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: BlockPoolBuilder::new(),
        }
    }
}

impl<T, A> IndexedPoolBuilder<T, A> {
    /// Sets the number of slots in each block.
    ///
    /// Defaults to [`DEFAULT_BLOCK_CAPACITY`].
    pub fn block_capacity(self, block_capacity: NonZero<usize>) -> Self {
        Self {
            inner: self.inner.block_capacity(block_capacity),
        }
    }

    /// Sets how the first slot of each block is placed within the block's raw memory.
    pub fn alignment(self, alignment: AlignmentPolicy) -> Self {
        Self {
            inner: self.inner.alignment(alignment),
        }
    }

    /// Sets the [drop policy][DropPolicy] for the pool.
    pub fn drop_policy(self, policy: DropPolicy) -> Self {
        Self {
            inner: self.inner.drop_policy(policy),
        }
    }

    /// Sets the number of blocks to obtain eagerly when the pool is built.
    pub fn initial_blocks(self, count: usize) -> Self {
        Self {
            inner: self.inner.initial_blocks(count),
        }
    }

    /// Sets the backing allocator the pool obtains its blocks from.
    pub fn backing<B: BackingAllocator>(self, backing: B) -> IndexedPoolBuilder<T, B> {
        IndexedPoolBuilder {
            inner: self.inner.backing(backing),
        }
    }
}

impl<T, A: BackingAllocator> IndexedPoolBuilder<T, A> {
    /// Builds the pool with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a block of the configured capacity cannot be described by a valid
    /// memory layout or if the backing allocator fails to provide the initial blocks.
    pub fn try_build(self) -> Result<IndexedPool<T, A>> {
        self.inner.try_build().map(IndexedPool::from)
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if a block of the configured capacity cannot be described by a valid memory
    /// layout. Aborts if the backing allocator fails to provide the initial blocks.
    #[must_use]
    pub fn build(self) -> IndexedPool<T, A> {
        IndexedPool::from(self.inner.build())
    }
}
