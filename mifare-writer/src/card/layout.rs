//! Sector layout of a MIFARE Classic card
//!
//! The card is split into sectors of four blocks. The last block of every
//! sector is the trailer holding the access keys and permission bits, so it
//! must never receive data.

/// Physical block number on the card
pub type BlockAddress = u32;

/// Blocks per sector
pub const BLOCKS_PER_SECTOR: BlockAddress = 4;

/// Manufacturer block (UID and vendor data, read-only)
pub const MANUFACTURER_BLOCK: BlockAddress = 0;

/// First block of the driver name
pub const DRIVER_BLOCK_1: BlockAddress = 1;

/// Second block of the driver name
pub const DRIVER_BLOCK_2: BlockAddress = 2;

/// First block available for general records; sector 0 is reserved
pub const FIRST_DATA_BLOCK: BlockAddress = 4;

/// Default start of the article area
pub const DEFAULT_START_BLOCK: BlockAddress = 8;

/// Card geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardLayout {
    /// Total number of blocks on the card
    pub blocks: BlockAddress,
}

impl CardLayout {
    /// MIFARE Classic Mini (320 bytes)
    pub const MINI: Self = Self { blocks: 20 };
    /// MIFARE Classic 1K
    pub const CLASSIC_1K: Self = Self { blocks: 64 };
    /// MIFARE Classic 4K, the largest Classic card
    pub const CLASSIC_4K: Self = Self { blocks: 256 };

    pub const fn new(blocks: BlockAddress) -> Self {
        Self { blocks }
    }

    /// Check if a block exists on this card
    pub fn contains(&self, block: BlockAddress) -> bool {
        block < self.blocks
    }

    /// Number of data blocks at or after `start` that can hold records
    pub fn writable_from(&self, start: BlockAddress) -> usize {
        (start..self.blocks).filter(|&b| !is_trailer(b)).count()
    }
}

impl Default for CardLayout {
    fn default() -> Self {
        Self::CLASSIC_1K
    }
}

/// Check if a block is a sector trailer
#[inline]
pub const fn is_trailer(block: BlockAddress) -> bool {
    block % BLOCKS_PER_SECTOR == BLOCKS_PER_SECTOR - 1
}

/// First block at or after `block` that is not a trailer
///
/// Only one step is ever needed since trailers never follow each other.
/// Returns None when `block` is the trailer at `BlockAddress::MAX`.
#[inline]
pub const fn next_writable(block: BlockAddress) -> Option<BlockAddress> {
    if is_trailer(block) {
        block.checked_add(1)
    } else {
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_trailers() {
        let trailers: Vec<_> = (0..16).filter(|&b| is_trailer(b)).collect();
        assert_eq!(trailers, vec![3, 7, 11, 15]);
    }

    #[test]
    fn test_next_writable() {
        assert_eq!(next_writable(0), Some(0));
        assert_eq!(next_writable(3), Some(4));
        assert_eq!(next_writable(8), Some(8));
        assert_eq!(next_writable(11), Some(12));
        assert_eq!(next_writable(63), Some(64));
    }

    #[test]
    fn test_next_writable_at_top_of_range() {
        assert!(is_trailer(BlockAddress::MAX));
        assert_eq!(next_writable(BlockAddress::MAX), None);
        assert_eq!(next_writable(BlockAddress::MAX - 1), Some(BlockAddress::MAX - 1));
    }

    #[test]
    fn test_layout_capacity() {
        let layout = CardLayout::CLASSIC_1K;
        assert!(layout.contains(63));
        assert!(!layout.contains(64));
        // blocks 8..64: 56 blocks, 14 of them trailers
        assert_eq!(layout.writable_from(DEFAULT_START_BLOCK), 42);
        assert_eq!(CardLayout::MINI.writable_from(FIRST_DATA_BLOCK), 12);
    }

    proptest! {
        #[test]
        fn prop_next_writable_is_smallest_data_block(block in any::<BlockAddress>()) {
            match next_writable(block) {
                Some(next) => {
                    prop_assert!(!is_trailer(next));
                    prop_assert!(next >= block);
                    prop_assert!((block..next).all(is_trailer));
                }
                None => prop_assert_eq!(block, BlockAddress::MAX),
            }
        }
    }
}
