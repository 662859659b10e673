/// Determines how a pool places the first slot of each block within the raw memory it obtains
/// from its backing allocator.
///
/// # Examples
///
/// ```
/// use block_pool::{AlignmentPolicy, BlockPool};
///
/// let pool = BlockPool::<u64>::builder()
///     .alignment(AlignmentPolicy::Unadjusted)
///     .build();
///
/// assert_eq!(pool.alignment_policy(), AlignmentPolicy::Unadjusted);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum AlignmentPolicy {
    /// Each block requests byte-aligned memory with two slots of headroom and the pool shifts
    /// the first slot forward to the next address that is a multiple of the slot alignment.
    ///
    /// The pool does not depend on the backing allocator honoring any alignment. This is
    /// the default.
    #[default]
    Aligned,

    /// Each block requests memory with one slot of headroom, declaring the slot alignment in
    /// the requested layout, and the first slot starts at the very beginning of the allocation.
    ///
    /// The backing allocator is trusted to honor the alignment of the requested layout.
    Unadjusted,
}

/// Number of bytes that must be skipped from `addr` to reach the next multiple of `align`.
///
/// `align` must be a power of two.
#[must_use]
pub(crate) fn padding_for(addr: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two(), "alignment {align} is not a power of two");

    // Cannot underflow because a power of two is at least 1.
    addr.wrapping_neg() & align.wrapping_sub(1)
}
