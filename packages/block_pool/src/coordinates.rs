use std::num::NonZero;

use num_integer::Integer;

/// Location of a slot expressed as a block and an index within that block.
///
/// Every position in a pool maps to exactly one pair, using the same block capacity for all
/// blocks: `block_index = position / block_capacity` and
/// `index_in_block = position % block_capacity`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct SlotCoordinates {
    block_index: usize,
    index_in_block: usize,
}

impl SlotCoordinates {
    #[must_use]
    pub(crate) fn from_parts(block_index: usize, index_in_block: usize) -> Self {
        Self {
            block_index,
            index_in_block,
        }
    }

    #[must_use]
    pub(crate) fn from_position(position: usize, block_capacity: NonZero<usize>) -> Self {
        let (block_index, index_in_block) = position.div_rem(&block_capacity.get());

        Self {
            block_index,
            index_in_block,
        }
    }

    #[must_use]
    pub(crate) fn to_position(self, block_capacity: NonZero<usize>) -> usize {
        self.block_index
            .checked_mul(block_capacity.get())
            .and_then(|x| x.checked_add(self.index_in_block))
            .expect("position indicates a slot beyond the range of virtual memory - impossible to reach this point from a valid history")
    }

    #[must_use]
    pub(crate) fn block_index(self) -> usize {
        self.block_index
    }

    #[must_use]
    pub(crate) fn index_in_block(self) -> usize {
        self.index_in_block
    }
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn first_block_maps_directly() {
        let coordinates = SlotCoordinates::from_position(3, nz!(4));

        assert_eq!(coordinates.block_index(), 0);
        assert_eq!(coordinates.index_in_block(), 3);
    }

    #[test]
    fn later_blocks_use_remainder() {
        let coordinates = SlotCoordinates::from_position(9, nz!(4));

        assert_eq!(coordinates.block_index(), 2);
        assert_eq!(coordinates.index_in_block(), 1);
        assert_eq!(coordinates.to_position(nz!(4)), 9);
    }

    #[test]
    fn from_parts_matches_position() {
        let capacity = nz!(4096);

        for position in [0, 1, 4095, 4096, 4097, 10_000] {
            let coordinates = SlotCoordinates::from_position(position, capacity);
            let rebuilt =
                SlotCoordinates::from_parts(coordinates.block_index(), coordinates.index_in_block());

            assert_eq!(rebuilt, coordinates);
            assert_eq!(rebuilt.to_position(capacity), position);
        }
    }
}
