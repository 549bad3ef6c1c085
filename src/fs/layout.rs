//! where every region of a volume lives
//!
//! | blocks | region |
//! |---|---|
//! | 0 | superblock |
//! | 1 | inode bitmap |
//! | 2..=5 | data bitmap |
//! | 6..=9 | user table |
//! | 10.. | inode table |
//! | after the inode table | data region |
use crate::{
    device::BLOCK_SIZE,
    error::{FsError, FsResult},
    utils::fs_size_calculator,
};

use super::INODE_SIZE;

pub const SUPERBLOCK_BLOCK: u32 = 0;
pub const INODE_BITMAP_START: u32 = 1;
pub const INODE_BITMAP_BLOCKS: u32 = 1;
pub const DATA_BITMAP_START: u32 = 2;
pub const DATA_BITMAP_BLOCKS: u32 = 4;
pub const USER_TABLE_START: u32 = 6;
pub const USER_TABLE_BLOCKS: u32 = 4;
pub const INODE_TABLE_START: u32 = 10;
pub const INODES_PER_BLOCK: u32 = BLOCK_SIZE / INODE_SIZE;
/// bits one bitmap block can track
pub const BITS_PER_BLOCK: u32 = BLOCK_SIZE * 8;
pub const MAX_INODES: u32 = INODE_BITMAP_BLOCKS * BITS_PER_BLOCK;
pub const MAX_DATA_BLOCKS: u32 = DATA_BITMAP_BLOCKS * BITS_PER_BLOCK;

/// geometry of one volume, derived from its block and inode counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub inode_table_start: u32,
    pub inode_table_blocks: u32,
    pub data_blocks_start: u32,
    /// one bit each in the data bitmap
    pub data_blocks: u32,
}

impl Layout {
    /// # Example
    /// ```
    /// use blockfs::fs::Layout;
    /// let layout = Layout::compute(2048, 64).unwrap();
    /// assert_eq!(layout.inode_table_blocks, 16);
    /// assert_eq!(layout.data_blocks_start, 26);
    /// assert_eq!(layout.data_blocks, 2048 - 26);
    /// ```
    pub fn compute(total_blocks: u32, total_inodes: u32) -> FsResult<Self> {
        // bit 0 is reserved, the root directory needs one more
        if total_inodes < 2 {
            return Err(FsError::InvalidParam(format!(
                "a volume needs at least 2 inodes, got {total_inodes}"
            )));
        }
        if total_inodes > MAX_INODES {
            return Err(FsError::InvalidParam(format!(
                "the inode bitmap tracks at most {MAX_INODES} inodes, got {total_inodes}"
            )));
        }
        let inode_table_blocks = fs_size_calculator::inode_table_blocks(total_inodes);
        let data_blocks_start = INODE_TABLE_START
            .checked_add(inode_table_blocks)
            .ok_or_else(|| FsError::InvalidParam("inode table too large".into()))?;
        // the reserved bit 0 block plus one block for the root directory
        if total_blocks < data_blocks_start.saturating_add(2) {
            return Err(FsError::InvalidParam(format!(
                "{total_blocks} blocks cannot hold {total_inodes} inodes and a root directory"
            )));
        }
        let data_blocks = total_blocks - data_blocks_start;
        if data_blocks > MAX_DATA_BLOCKS {
            return Err(FsError::InvalidParam(format!(
                "the data bitmap tracks at most {MAX_DATA_BLOCKS} blocks, got {data_blocks}"
            )));
        }
        Ok(Layout {
            total_blocks,
            total_inodes,
            inode_table_start: INODE_TABLE_START,
            inode_table_blocks,
            data_blocks_start,
            data_blocks,
        })
    }

    /// `(block, byte offset in block)` of inode `n`'s slot
    pub fn inode_location(&self, n: u32) -> (u32, usize) {
        (
            self.inode_table_start + n / INODES_PER_BLOCK,
            ((n % INODES_PER_BLOCK) * INODE_SIZE) as usize,
        )
    }

    /// absolute block number of data bitmap bit `bit`
    pub fn data_block(&self, bit: u32) -> u32 {
        self.data_blocks_start + bit
    }

    /// data bitmap bit of absolute block `block`, if it is in the data region
    pub fn data_bit(&self, block: u32) -> Option<u32> {
        (block >= self.data_blocks_start && block < self.total_blocks)
            .then(|| block - self.data_blocks_start)
    }
}
