/// Determines what a pool does with values that are still live when the pool is dropped.
///
/// By default, the pool tears down any remaining values when it is dropped.
///
/// # Examples
///
/// ```
/// use block_pool::{BlockPool, DropPolicy};
///
/// let pool = BlockPool::<u32>::builder()
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// Live values are torn down when the pool is dropped. This is the default.
    #[default]
    MayDropItems,

    /// The pool will panic if it still contains live values when it is dropped.
    ///
    /// Useful when pointers to the values are handed out to unsafe code and every value is
    /// expected to be explicitly deallocated before the pool goes away.
    MustNotDropItems,
}
