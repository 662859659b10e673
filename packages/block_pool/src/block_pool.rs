use std::any::type_name;
use std::fmt;
use std::mem::MaybeUninit;
use std::num::NonZero;
use std::ptr::NonNull;
use std::thread;

use scopeguard::ScopeGuard;
use tracing::{debug, trace, warn};

use crate::{
    AlignmentPolicy, BackingAllocator, Block, BlockLayout, BlockPoolBuilder, DropPolicy, Entry,
    Result, SlotCoordinates, SystemBacking, or_alloc_failure,
};

/// The number of slots in each block when no block capacity is configured.
pub const DEFAULT_BLOCK_CAPACITY: NonZero<usize> = new_zealand::nz!(4096);

/// A fixed-block object pool with O(1) allocation and deallocation of individual slots.
///
/// Storage is obtained from a [`BackingAllocator`] in blocks of a fixed number of slots. Vacant
/// slots are threaded into an intrusive free list, with each vacant slot holding the position
/// of the next one, so allocating pops the head of the list and deallocating pushes onto it.
/// When the free list is empty, the pool grows by exactly one block. Blocks are never released
/// individually, only all together when the pool is dropped.
///
/// Each slot is addressed by a *position*: `block_index * block_capacity + index_in_block`.
/// Positions are stable for as long as the value remains allocated and may be reused after
/// the value is deallocated.
///
/// # Reuse order
///
/// The most recently deallocated slot is the first to be reused. When new blocks are added,
/// their slots are placed in front of any previously vacant slots, in ascending position order,
/// so the new blocks are filled first and from the lowest position upwards.
///
/// # Examples
///
/// ```
/// use block_pool::BlockPool;
///
/// let mut pool = BlockPool::<String>::new();
///
/// let alice = pool.allocate("Alice".to_string()).unwrap();
/// let bob = pool.allocate("Bob".to_string()).unwrap();
///
/// assert_eq!(pool.get(alice).map(String::as_str), Some("Alice"));
/// assert_eq!(pool.len(), 2);
///
/// pool.deallocate(bob);
/// assert!(pool.is_free(bob));
///
/// // The slot Bob occupied is the first to be reused.
/// let charlie = pool.allocate("Charlie".to_string()).unwrap();
/// assert_eq!(charlie, bob);
/// ```
///
/// # Thread safety
///
/// The pool is thread-mobile ([`Send`]) if `T` and the backing allocator are, but it is not
/// thread-safe ([`Sync`]). Wrap it in a mutex if it must be shared.
pub struct BlockPool<T, A: BackingAllocator = SystemBacking> {
    /// Append-only; the block at index `i` holds positions `i * block_capacity..`.
    blocks: Vec<Block<T>>,

    layout: BlockLayout,

    /// Head of the intrusive free list. `None` if every slot of every block is occupied.
    free_head: Option<usize>,

    /// Number of occupied slots.
    len: usize,

    /// The slot most recently handed out by `allocate()`, if it is still occupied.
    last_allocated: Option<usize>,

    drop_policy: DropPolicy,

    backing: A,
}

impl<T> BlockPool<T> {
    /// Creates an empty pool with the default configuration.
    ///
    /// No memory is allocated until the first value is stored.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::BlockPool;
    ///
    /// let pool = BlockPool::<u64>::new();
    ///
    /// assert!(pool.is_empty());
    /// assert_eq!(pool.capacity(), 0);
    /// assert_eq!(pool.block_capacity().get(), 4096);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an empty pool whose blocks each hold `block_capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if a block of this many slots cannot be described by a valid memory layout.
    #[must_use]
    pub fn with_block_capacity(block_capacity: NonZero<usize>) -> Self {
        Self::builder().block_capacity(block_capacity).build()
    }

    /// Starts building a new [`BlockPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::{AlignmentPolicy, BlockPool};
    /// use new_zealand::nz;
    ///
    /// let pool = BlockPool::<u32>::builder()
    ///     .block_capacity(nz!(64))
    ///     .alignment(AlignmentPolicy::Unadjusted)
    ///     .initial_blocks(2)
    ///     .build();
    ///
    /// assert_eq!(pool.capacity(), 128);
    /// ```
    pub fn builder() -> BlockPoolBuilder<T> {
        BlockPoolBuilder::new()
    }
}

impl<T, A: BackingAllocator> BlockPool<T, A> {
    pub(crate) fn new_inner(layout: BlockLayout, drop_policy: DropPolicy, backing: A) -> Self {
        Self {
            blocks: Vec::new(),
            layout,
            free_head: None,
            len: 0,
            last_allocated: None,
            drop_policy,
            backing,
        }
    }

    /// The number of live values in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the pool holds no live values.
    ///
    /// An empty pool may still be holding blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The total number of slots in all blocks, occupied or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.len()
            .checked_mul(self.layout.block_capacity().get())
            .expect("overflow here would mean the pool holds more slots than virtual memory can fit, which makes no sense - it would never grow that big")
    }

    /// The number of slots in each block.
    #[must_use]
    pub fn block_capacity(&self) -> NonZero<usize> {
        self.layout.block_capacity()
    }

    /// The number of blocks obtained from the backing allocator so far.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The number of vacant slots, all of which are on the free list.
    #[must_use]
    pub fn free_len(&self) -> usize {
        // Cannot underflow because every occupied slot belongs to some block.
        self.capacity().wrapping_sub(self.len)
    }

    /// The alignment every slot satisfies. This is at least the alignment of `T`.
    #[must_use]
    pub fn alignment(&self) -> usize {
        self.layout.slot_align()
    }

    /// How each block's first slot is placed within the memory obtained for the block.
    #[must_use]
    pub fn alignment_policy(&self) -> AlignmentPolicy {
        self.layout.policy()
    }

    /// What happens to live values when the pool is dropped.
    #[must_use]
    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    /// The position most recently returned by [`allocate()`][Self::allocate], if the value
    /// there has not been deallocated since.
    #[must_use]
    pub fn last_allocated(&self) -> Option<usize> {
        self.last_allocated
    }

    /// The backing allocator that provides the pool's memory.
    #[must_use]
    pub fn backing(&self) -> &A {
        &self.backing
    }

    /// Stores `value` in a vacant slot and returns the slot's position.
    ///
    /// The head of the free list is used if there is one; otherwise the pool first grows by
    /// one block. Construction of the value is delegated to the backing allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool needed to grow and the backing allocator could not provide
    /// the memory. The pool is left unchanged and `value` is dropped.
    pub fn allocate(&mut self, value: T) -> Result<usize> {
        let position = if let Some(position) = self.free_head {
            trace!(position, "reusing vacant slot");
            position
        } else {
            self.grow()?;
            self.free_head
                .expect("growing always adds at least one vacant slot")
        };

        let entry_ptr = self.entry_ptr(position);

        // SAFETY: The free list only links initialized entries of existing blocks and we hold
        // an exclusive reference to the pool.
        let next_free = match unsafe { entry_ptr.as_ref() } {
            Entry::Vacant { next_free } => *next_free,
            Entry::Occupied { .. } => panic!(
                "free list head {position} points to an occupied slot in pool of {}",
                type_name::<T>()
            ),
        };

        // SAFETY: The entry is vacant, we hold an exclusive reference to the pool and the pool
        // creates no lasting references to its entries.
        unsafe {
            occupy(&mut self.backing, entry_ptr, value, next_free);
        }

        self.free_head = next_free;
        self.len = self
            .len
            .checked_add(1)
            .expect("guarded by the capacity of virtual memory");
        self.last_allocated = Some(position);

        Ok(position)
    }

    /// Stores each of `values` in its own slot and returns the positions in the same order.
    ///
    /// The positions are not necessarily contiguous: recycled slots are taken from wherever
    /// the free list points.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing allocator could not provide memory for a new block.
    /// Values stored before the failure remain in the pool.
    pub fn allocate_many<I>(&mut self, values: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = T>,
    {
        values
            .into_iter()
            .map(|value| self.allocate(value))
            .collect()
    }

    /// Tears down the value at `position` and pushes the slot onto the head of the free list.
    ///
    /// The memory of the slot is not zeroed; it holds free list bookkeeping until reused.
    ///
    /// # Panics
    ///
    /// Panics if `position` is beyond the pool's capacity or the slot is vacant.
    pub fn deallocate(&mut self, position: usize) {
        let mut entry_ptr = self.entry_ptr(position);

        // SAFETY: The entry is initialized, in bounds, and we hold an exclusive reference to the
        // pool, so no other reference to it exists.
        let entry = unsafe { entry_ptr.as_mut() };

        if matches!(entry, Entry::Vacant { .. }) {
            panic!(
                "deallocate({position}) slot was vacant in pool of {}",
                type_name::<T>()
            );
        }

        let value_ptr = entry.value_ptr();

        let next_free = self.free_head;
        self.free_head = Some(position);
        self.len = self
            .len
            .checked_sub(1)
            .expect("we asserted above that the slot is occupied so len must be non-zero");

        if self.last_allocated == Some(position) {
            self.last_allocated = None;
        }

        // The slot becomes vacant even if the teardown of the value panics, as the value is
        // considered dropped either way.
        let _vacate = scopeguard::guard(entry_ptr, move |entry_ptr| {
            // SAFETY: The entry is in bounds and the value it held has been torn down, so
            // overwriting the entry cannot leak or double-drop anything.
            unsafe {
                entry_ptr.write(Entry::Vacant { next_free });
            }
        });

        // SAFETY: The slot holds a live value which nobody can use after this call because
        // the slot is now on the free list.
        unsafe {
            self.backing.destroy(value_ptr);
        }
    }

    /// Deallocates every slot in `positions`, in order.
    ///
    /// # Panics
    ///
    /// Panics if any position is beyond the pool's capacity or vacant, including positions
    /// repeated in the input.
    pub fn deallocate_many<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = usize>,
    {
        for position in positions {
            self.deallocate(position);
        }
    }

    /// Adds one block of [`block_capacity()`][Self::block_capacity] vacant slots.
    ///
    /// The new block's slots are linked in order and placed in front of any slots that were
    /// already vacant.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing allocator could not provide the memory.
    pub fn grow(&mut self) -> Result<()> {
        self.grow_by(1)
    }

    /// Adds `count` blocks.
    ///
    /// The slots of all new blocks are linked in ascending position order and placed in front of
    /// any slots that were already vacant, so values stored afterwards fill the new blocks from
    /// the lowest position upwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing allocator could not provide the memory. Blocks added
    /// before the failure remain in the pool and are linked into the free list.
    pub fn grow_by(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        let block_capacity = self.layout.block_capacity();
        let previous_head = self.free_head;
        let first_new_block = self.blocks.len();
        let first_new_position =
            SlotCoordinates::from_parts(first_new_block, 0).to_position(block_capacity);

        for remaining in (0..count).rev() {
            let block_index = self.blocks.len();

            // Each new block chains into the next one; the last one chains into the old list.
            let tail = if remaining == 0 {
                previous_head
            } else {
                Some(
                    SlotCoordinates::from_parts(
                        block_index
                            .checked_add(1)
                            .expect("guarded by the capacity of virtual memory"),
                        0,
                    )
                    .to_position(block_capacity),
                )
            };

            if let Err(error) = self.push_block(tail) {
                // Keep whatever blocks we did get, chained in front of the old list.
                if block_index > first_new_block {
                    self.relink_last_block(previous_head);
                    self.free_head = Some(first_new_position);
                }

                #[cfg(debug_assertions)]
                self.integrity_check();

                return Err(error);
            }
        }

        self.free_head = Some(first_new_position);

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(())
    }

    /// Obtains one block whose last slot links to `tail` and appends it, without touching the
    /// head of the free list.
    fn push_block(&mut self, tail: Option<usize>) -> Result<()> {
        let block_index = self.blocks.len();
        let first_position = SlotCoordinates::from_parts(block_index, 0)
            .to_position(self.layout.block_capacity());

        let block = Block::allocate(&mut self.backing, &self.layout, first_position, tail)
            .inspect_err(|error| {
                warn!(%error, block_index, item_type = type_name::<T>(), "failed to grow pool");
            })?;

        debug!(
            block_index,
            block_capacity = self.layout.block_capacity().get(),
            padding = block.padding(),
            bytes = self.layout.raw_layout().size(),
            item_type = type_name::<T>(),
            "grew pool by one block"
        );

        self.blocks.push(block);

        Ok(())
    }

    /// Points the last slot of the last block at `tail`. The slot must be vacant.
    fn relink_last_block(&mut self, tail: Option<usize>) {
        let last_index = self.layout.block_capacity().get().wrapping_sub(1);

        let entry = self
            .blocks
            .last_mut()
            .expect("only called after at least one block was added")
            .entry_mut(last_index);

        assert!(
            matches!(entry, Entry::Vacant { .. }),
            "last slot of a freshly added block is occupied in pool of {}",
            type_name::<T>()
        );

        *entry = Entry::Vacant { next_free: tail };
    }

    /// Whether the slot at `position` is on the free list.
    ///
    /// This walks the free list, so it takes time proportional to the number of vacant slots.
    #[must_use]
    pub fn is_free(&self, position: usize) -> bool {
        self.free_positions().any(|free| free == position)
    }

    /// A shared reference to the value at `position`, or `None` if the slot is vacant or
    /// beyond the pool's capacity.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&T> {
        let coordinates = SlotCoordinates::from_position(position, self.layout.block_capacity());

        match self
            .blocks
            .get(coordinates.block_index())?
            .entry(coordinates.index_in_block())
        {
            // SAFETY: Occupied entries always hold an initialized value.
            Entry::Occupied { value } => Some(unsafe { value.assume_init_ref() }),
            Entry::Vacant { .. } => None,
        }
    }

    /// An exclusive reference to the value at `position`, or `None` if the slot is vacant or
    /// beyond the pool's capacity.
    #[must_use]
    pub fn get_mut(&mut self, position: usize) -> Option<&mut T> {
        let coordinates = SlotCoordinates::from_position(position, self.layout.block_capacity());

        match self
            .blocks
            .get_mut(coordinates.block_index())?
            .entry_mut(coordinates.index_in_block())
        {
            // SAFETY: Occupied entries always hold an initialized value.
            Entry::Occupied { value } => Some(unsafe { value.assume_init_mut() }),
            Entry::Vacant { .. } => None,
        }
    }

    /// A pointer to the value at `position`, or `None` if the slot is vacant or beyond the
    /// pool's capacity.
    ///
    /// The pointer is valid for reads and writes until the value is deallocated or the pool is
    /// dropped. The pool creates no references to its values unless asked to, so the pointer may
    /// be used from unsafe code as long as no conflicting reference is obtained through the pool
    /// while it is in use.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<u32>::new();
    /// let position = pool.allocate(1).unwrap();
    ///
    /// let ptr = pool.ptr(position).unwrap();
    ///
    /// // SAFETY: The slot is occupied and no reference to it exists.
    /// unsafe {
    ///     ptr.write(2);
    /// }
    ///
    /// assert_eq!(pool.get(position), Some(&2));
    /// ```
    #[must_use]
    pub fn ptr(&self, position: usize) -> Option<NonNull<T>> {
        let coordinates = SlotCoordinates::from_position(position, self.layout.block_capacity());
        let entry_ptr = self
            .blocks
            .get(coordinates.block_index())?
            .entry_ptr(coordinates.index_in_block());

        // SAFETY: Every entry of every block is initialized and the pointer is in bounds. The
        // reference is only used to find the value address and does not outlive this scope.
        let Entry::Occupied { value } = (unsafe { entry_ptr.as_ref() }) else {
            return None;
        };

        // The address comes from the reference but the provenance from the block pointer, so
        // the result carries the write permission of the block allocation.
        let value_addr = NonNull::from(value).addr();
        Some(entry_ptr.with_addr(value_addr).cast::<T>())
    }

    /// The position of the slot whose storage contains the address of `ptr`.
    ///
    /// Returns `None` if the address does not belong to any block of this pool. This scans the
    /// address ranges of all blocks.
    #[must_use]
    pub fn slot_of(&self, ptr: NonNull<T>) -> Option<usize> {
        let addr = ptr.as_ptr().addr();

        self.blocks
            .iter()
            .enumerate()
            .find_map(|(block_index, block)| {
                block
                    .index_of_addr(addr, &self.layout)
                    .map(|index| SlotCoordinates::from_parts(block_index, index))
            })
            .map(|coordinates| coordinates.to_position(self.layout.block_capacity()))
    }

    /// Iterates over the live values together with their positions, in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        let block_capacity = self.layout.block_capacity();

        self.blocks
            .iter()
            .enumerate()
            .flat_map(move |(block_index, block)| {
                (0..block_capacity.get()).filter_map(move |index| match block.entry(index) {
                    Entry::Occupied { value } => Some((
                        SlotCoordinates::from_parts(block_index, index).to_position(block_capacity),
                        // SAFETY: Occupied entries always hold an initialized value.
                        unsafe { value.assume_init_ref() },
                    )),
                    Entry::Vacant { .. } => None,
                })
            })
    }

    fn free_positions(&self) -> impl Iterator<Item = usize> {
        let mut next = self.free_head;

        std::iter::from_fn(move || {
            let position = next?;

            next = match self.entry_at(position) {
                Entry::Vacant { next_free } => *next_free,
                Entry::Occupied { .. } => panic!(
                    "free list links to occupied slot {position} in pool of {}",
                    type_name::<T>()
                ),
            };

            Some(position)
        })
    }

    fn entry_at(&self, position: usize) -> &Entry<T> {
        let entry_ptr = self.entry_ptr(position);

        // SAFETY: Every entry of every block is initialized and the pointer is in bounds.
        unsafe { entry_ptr.as_ref() }
    }

    fn entry_ptr(&self, position: usize) -> NonNull<Entry<T>> {
        let coordinates = SlotCoordinates::from_position(position, self.layout.block_capacity());

        let Some(block) = self.blocks.get(coordinates.block_index()) else {
            panic!(
                "position {position} is beyond the {} slots of pool of {}",
                self.capacity(),
                type_name::<T>()
            );
        };

        block.entry_ptr(coordinates.index_in_block())
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    pub(crate) fn integrity_check(&self) {
        let capacity = self.capacity();
        let mut on_free_list = vec![false; capacity];
        let mut free_count: usize = 0;

        for position in self.free_positions() {
            let seen = on_free_list
                .get_mut(position)
                .expect("free_positions() only yields positions of existing blocks");

            assert!(
                !*seen,
                "slot {position} appears on the free list twice in pool of {}",
                type_name::<T>()
            );

            *seen = true;
            free_count = free_count
                .checked_add(1)
                .expect("bounded by the number of slots");
        }

        let occupied_count = capacity.wrapping_sub(free_count);

        assert!(
            self.len == occupied_count,
            "self.len {} does not match the observed occupied count {} in pool of {}",
            self.len,
            occupied_count,
            type_name::<T>()
        );

        for (position, _) in self.iter() {
            assert!(
                !on_free_list
                    .get(position)
                    .copied()
                    .expect("iter() only yields positions of existing blocks"),
                "occupied slot {position} is on the free list in pool of {}",
                type_name::<T>()
            );
        }
    }
}

/// Marks a vacant entry as occupied and has the backing allocator construct `value` in it.
///
/// If construction unwinds, the entry is restored to vacant with `next_free` as its link.
///
/// # Safety
///
/// The caller must ensure that `entry_ptr` points to an initialized vacant entry and that no
/// references to the entry exist.
unsafe fn occupy<T, A: BackingAllocator>(
    backing: &mut A,
    entry_ptr: NonNull<Entry<T>>,
    value: T,
    next_free: Option<usize>,
) {
    // SAFETY: The caller guarantees the pointer is valid and unaliased.
    unsafe {
        entry_ptr.write(Entry::Occupied {
            value: MaybeUninit::uninit(),
        });
    }

    let restore = scopeguard::guard(entry_ptr, move |entry_ptr| {
        // SAFETY: Construction did not complete, so the entry holds no value that could leak.
        unsafe {
            entry_ptr.write(Entry::Vacant { next_free });
        }
    });

    let mut entry_ptr = *restore;

    // SAFETY: We just wrote the entry and nobody else references it.
    let value_ptr = unsafe { entry_ptr.as_mut() }.value_ptr();

    // SAFETY: The value storage is valid for writes, aligned and holds no live value.
    unsafe {
        backing.construct(value_ptr, value);
    }

    ScopeGuard::into_inner(restore);
}

impl<T> Default for BlockPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: BackingAllocator> fmt::Debug for BlockPool<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("backing_type", &format_args!("{}", type_name::<A>()))
            .field("layout", &self.layout)
            .field("block_count", &self.blocks.len())
            .field("free_head", &self.free_head)
            .field("len", &self.len)
            .field("last_allocated", &self.last_allocated)
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

impl<T, A> Clone for BlockPool<T, A>
where
    T: Clone,
    A: BackingAllocator + Clone,
{
    /// Copies the pool value by value into new blocks of the same geometry.
    ///
    /// Every value keeps its position and the free list keeps its order, so positions obtained
    /// from the source pool are valid in the copy.
    ///
    /// # Panics
    ///
    /// Panics if the backing allocator cannot provide memory for the copy.
    fn clone(&self) -> Self {
        let mut copy = Self::new_inner(self.layout, self.drop_policy, self.backing.clone());
        copy.blocks.reserve_exact(self.blocks.len());

        for (block_index, source) in self.blocks.iter().enumerate() {
            let first_position = SlotCoordinates::from_parts(block_index, 0)
                .to_position(self.layout.block_capacity());

            let block = or_alloc_failure(Block::allocate(
                &mut copy.backing,
                &copy.layout,
                first_position,
                None,
            ));

            // We push before filling, so values copied so far are torn down if a clone panics.
            copy.blocks.push(block);
            let target = copy.blocks.last().expect("we just pushed a block");

            for index in 0..self.layout.block_capacity().get() {
                let entry_ptr = target.entry_ptr(index);

                match source.entry(index) {
                    Entry::Vacant { next_free } => {
                        // SAFETY: The entry is in bounds and vacant, so nothing is overwritten.
                        unsafe {
                            entry_ptr.write(Entry::Vacant {
                                next_free: *next_free,
                            });
                        }
                    }
                    Entry::Occupied { value } => {
                        // SAFETY: Occupied entries always hold an initialized value.
                        let value = unsafe { value.assume_init_ref() }.clone();

                        // SAFETY: Fresh blocks are all vacant and we hold no references into them.
                        unsafe {
                            occupy(&mut copy.backing, entry_ptr, value, None);
                        }

                        copy.len = copy
                            .len
                            .checked_add(1)
                            .expect("bounded by the length of the source pool");
                    }
                }
            }
        }

        copy.free_head = self.free_head;
        copy.last_allocated = self.last_allocated;

        #[cfg(debug_assertions)]
        copy.integrity_check();

        copy
    }
}

impl<T, A: BackingAllocator> Drop for BlockPool<T, A> {
    fn drop(&mut self) {
        let was_empty = self.is_empty();

        for block in &self.blocks {
            for index in 0..self.layout.block_capacity().get() {
                let mut entry_ptr = block.entry_ptr(index);

                // SAFETY: The entry is initialized and we are the only ones referencing it.
                let entry = unsafe { entry_ptr.as_mut() };

                if matches!(entry, Entry::Vacant { .. }) {
                    continue;
                }

                let value_ptr = entry.value_ptr();

                let _vacate = scopeguard::guard(entry_ptr, |entry_ptr| {
                    // SAFETY: The value has been torn down and the entry is in bounds.
                    // Intentionally anomalous link - we are dropping so do not expect any more usage.
                    unsafe {
                        entry_ptr.write(Entry::Vacant { next_free: None });
                    }
                });

                // SAFETY: The slot holds a live value that is never used again.
                unsafe {
                    self.backing.destroy(value_ptr);
                }
            }
        }

        for block in self.blocks.drain(..) {
            block.release(&mut self.backing, &self.layout);
        }

        // We do this check at the end so we clean up the memory first.
        //
        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the first panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread::panicking() {
            assert!(
                was_empty,
                "dropped a non-empty pool of {} with a policy that says it must be empty when dropped",
                type_name::<T>()
            );
        }
    }
}

// SAFETY: Yes, there are raw pointers involved here but nothing inherently non-thread-mobile
// about it, so as long as T and the backing allocator can move between threads, the pool can
// do so, too.
unsafe impl<T: Send, A: BackingAllocator + Send> Send for BlockPool<T, A> {}
