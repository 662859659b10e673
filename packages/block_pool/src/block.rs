use std::alloc::Layout;
use std::any::type_name;
use std::mem::MaybeUninit;
use std::num::NonZero;
use std::ptr::NonNull;

use crate::{AlignmentPolicy, BackingAllocator, Error, Result, padding_for};

/// One slot of a block. A vacant slot holds the position of the next vacant slot in the pool,
/// forming an intrusive free list; an occupied slot holds a live value.
///
/// The value is kept in `MaybeUninit` because construction and teardown are performed
/// explicitly through the backing allocator. An `Occupied` entry always holds an initialized
/// value, except for the brief window between being marked occupied and the backing allocator
/// writing the value, which is guarded against unwinding.
#[derive(Debug)]
pub(crate) enum Entry<T> {
    Occupied { value: MaybeUninit<T> },

    Vacant { next_free: Option<usize> },
}

impl<T> Entry<T> {
    /// Pointer to the value storage of an occupied entry.
    ///
    /// # Panics
    ///
    /// Panics if the entry is vacant.
    #[must_use]
    pub(crate) fn value_ptr(&mut self) -> NonNull<T> {
        match self {
            Self::Occupied { value } => NonNull::from(value).cast(),
            Self::Vacant { .. } => panic!(
                "requested value pointer of a vacant slot holding {}",
                type_name::<T>()
            ),
        }
    }
}

/// Size calculations shared by every block of a pool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct BlockLayout {
    block_capacity: NonZero<usize>,

    /// Distance between consecutive slots. Always a multiple of `slot_align`.
    slot_size: usize,

    slot_align: usize,

    /// What we ask of the backing allocator for each block, headroom included.
    raw_layout: Layout,

    policy: AlignmentPolicy,
}

impl BlockLayout {
    /// Calculates the layout of blocks holding `block_capacity` slots of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the block would not fit a valid [`Layout`].
    pub(crate) fn calculate<T>(
        block_capacity: NonZero<usize>,
        policy: AlignmentPolicy,
    ) -> Result<Self> {
        let slot = Layout::new::<Entry<T>>();

        // The aligned policy asks for byte-aligned memory and fixes up the start itself, which
        // consumes less than one slot. The second slot of headroom is kept for parity with the
        // unadjusted policy's terminating slot.
        let (headroom_slots, raw_align) = match policy {
            AlignmentPolicy::Aligned => (2_usize, 1_usize),
            AlignmentPolicy::Unadjusted => (1, slot.align()),
        };

        let overflow = || Error::CapacityOverflow {
            block_capacity: block_capacity.get(),
            slot_size: slot.size(),
        };

        let raw_size = block_capacity
            .get()
            .checked_add(headroom_slots)
            .and_then(|slots| slots.checked_mul(slot.size()))
            .ok_or_else(overflow)?;

        let raw_layout =
            Layout::from_size_align(raw_size, raw_align).map_err(|_layout_error| overflow())?;

        Ok(Self {
            block_capacity,
            slot_size: slot.size(),
            slot_align: slot.align(),
            raw_layout,
            policy,
        })
    }

    #[must_use]
    pub(crate) fn block_capacity(&self) -> NonZero<usize> {
        self.block_capacity
    }

    #[must_use]
    pub(crate) fn slot_align(&self) -> usize {
        self.slot_align
    }

    #[must_use]
    pub(crate) fn raw_layout(&self) -> Layout {
        self.raw_layout
    }

    #[must_use]
    pub(crate) fn policy(&self) -> AlignmentPolicy {
        self.policy
    }
}

/// A fixed-capacity run of slots obtained from the backing allocator as one allocation.
///
/// The block does not release its memory on drop because it does not own the backing
/// allocator. The owning pool must call [`release()`][Self::release].
#[derive(Debug)]
pub(crate) struct Block<T> {
    /// Start of the raw allocation, as returned by the backing allocator.
    raw_ptr: NonNull<u8>,

    /// First slot, at or after `raw_ptr` depending on the alignment policy.
    first_entry_ptr: NonNull<Entry<T>>,

    capacity: NonZero<usize>,
}

impl<T> Block<T> {
    /// Obtains a new block from the backing allocator and threads all of its slots into a
    /// free chain: the slot at `first_position + i` links to `first_position + i + 1` and the
    /// last slot links to `tail`.
    ///
    /// # Errors
    ///
    /// Returns the backing allocator's error if it cannot provide the memory.
    pub(crate) fn allocate(
        backing: &mut impl BackingAllocator,
        layout: &BlockLayout,
        first_position: usize,
        tail: Option<usize>,
    ) -> Result<Self> {
        let raw_ptr = backing.allocate(layout.raw_layout)?;

        let padding = match layout.policy {
            AlignmentPolicy::Aligned => padding_for(raw_ptr.as_ptr().addr(), layout.slot_align),
            AlignmentPolicy::Unadjusted => {
                debug_assert_eq!(
                    padding_for(raw_ptr.as_ptr().addr(), layout.slot_align),
                    0,
                    "backing allocator ignored the alignment of the requested layout"
                );
                0
            }
        };

        // SAFETY: The padding is less than the slot alignment, which never exceeds the slot
        // size, and we requested at least one slot of headroom beyond the block capacity.
        let first_entry_ptr = unsafe { raw_ptr.byte_add(padding) };

        #[expect(
            clippy::cast_ptr_alignment,
            reason = "the padding above moves the pointer to a multiple of the slot alignment"
        )]
        let first_entry_ptr = first_entry_ptr.cast::<Entry<T>>();

        let capacity = layout.block_capacity;
        let last_index = capacity.get().wrapping_sub(1);

        for index in 0..capacity.get() {
            let next_free = if index == last_index {
                tail
            } else {
                // Cannot overflow because that would imply the pool extends beyond virtual memory.
                Some(first_position.wrapping_add(index).wrapping_add(1))
            };

            // SAFETY: The index is within the capacity we allocated room for and the pointer
            // is aligned for `Entry<T>`, so it is valid for writes.
            unsafe {
                first_entry_ptr
                    .add(index)
                    .write(Entry::Vacant { next_free });
            }
        }

        Ok(Self {
            raw_ptr,
            first_entry_ptr,
            capacity,
        })
    }

    /// Returns the block's memory to the backing allocator.
    ///
    /// Values still present in the block are not torn down; the caller must do that first.
    pub(crate) fn release(self, backing: &mut impl BackingAllocator, layout: &BlockLayout) {
        // SAFETY: The pointer was returned by this backing allocator for this layout in
        // `allocate()` and we consume the block, so it cannot be released twice.
        unsafe {
            backing.deallocate(self.raw_ptr, layout.raw_layout);
        }
    }

    pub(crate) fn entry_ptr(&self, index: usize) -> NonNull<Entry<T>> {
        assert!(
            index < self.capacity.get(),
            "slot {index} out of bounds in block of {} slots holding {}",
            self.capacity,
            type_name::<T>()
        );

        // SAFETY: Guarded by the bounds check above, so the pointer stays inside the block.
        unsafe { self.first_entry_ptr.add(index) }
    }

    #[must_use]
    pub(crate) fn entry(&self, index: usize) -> &Entry<T> {
        let entry_ptr = self.entry_ptr(index);

        // SAFETY: Every entry was initialized in `allocate()` and the pointer is in bounds.
        unsafe { entry_ptr.as_ref() }
    }

    #[must_use]
    #[expect(clippy::needless_pass_by_ref_mut, reason = "false positive")]
    pub(crate) fn entry_mut(&mut self, index: usize) -> &mut Entry<T> {
        let mut entry_ptr = self.entry_ptr(index);

        // SAFETY: Every entry was initialized in `allocate()`, the pointer is in bounds and we
        // hold an exclusive reference to the block.
        unsafe { entry_ptr.as_mut() }
    }

    /// Address of the first slot.
    #[must_use]
    pub(crate) fn first_slot_addr(&self) -> usize {
        self.first_entry_ptr.as_ptr().addr()
    }

    /// Number of bytes skipped at the start of the raw allocation to align the first slot.
    #[must_use]
    pub(crate) fn padding(&self) -> usize {
        // Cannot underflow because the first slot is never before the raw allocation start.
        self.first_slot_addr()
            .wrapping_sub(self.raw_ptr.as_ptr().addr())
    }

    /// Index of the slot whose storage contains `addr`, if any slot of this block does.
    #[must_use]
    pub(crate) fn index_of_addr(&self, addr: usize, layout: &BlockLayout) -> Option<usize> {
        let offset = addr.checked_sub(self.first_slot_addr())?;

        // The slot size is never zero because every entry carries a discriminant.
        #[expect(
            clippy::integer_division,
            reason = "we want the slot containing the address, rounding down is intended"
        )]
        let index = offset / layout.slot_size;

        (index < self.capacity.get()).then_some(index)
    }
}
