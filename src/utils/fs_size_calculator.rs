//! This module contains functions to calculate the size of differennt fs components

use crate::{device::BLOCK_SIZE, fs::INODE_SIZE};

/// calculate how many blocks a bitmap of `element_count` bits needs
/// # Example
/// ```
/// use blockfs::utils::fs_size_calculator::bitmap_blocks;
/// assert_eq!(bitmap_blocks(1), 1);
/// assert_eq!(bitmap_blocks(8192), 1);
/// assert_eq!(bitmap_blocks(8193), 2);
/// ```
pub const fn bitmap_blocks(element_count: u32) -> u32 {
    bitmap_size(element_count).div_ceil(BLOCK_SIZE as u64) as u32
}

/// calculate needed bitmap size in bytes
/// # Example
/// ```
/// use blockfs::utils::fs_size_calculator::bitmap_size;
/// let inode_count = 100;
/// let bitmap_size = bitmap_size(inode_count);
/// assert_eq!(bitmap_size, 13);
/// ```
pub const fn bitmap_size(element_count: u32) -> u64 {
    element_count.div_ceil(8) as u64
}

/// calculate how many blocks the inode table spans
/// # Example
/// ```
/// use blockfs::utils::fs_size_calculator::inode_table_blocks;
/// // four 256 byte inodes share a 1 KiB block
/// assert_eq!(inode_table_blocks(1024), 256);
/// assert_eq!(inode_table_blocks(5), 2);
/// ```
pub const fn inode_table_blocks(inode_count: u32) -> u32 {
    (inode_count as u64 * INODE_SIZE as u64).div_ceil(BLOCK_SIZE as u64) as u32
}

/// how many whole blocks fit in `bytes`
/// # Example
/// ```
/// use blockfs::utils::fs_size_calculator::blocks_in;
/// assert_eq!(blocks_in(4096), 4);
/// assert_eq!(blocks_in(4097), 4);
/// ```
pub const fn blocks_in(bytes: u64) -> u64 {
    bytes / BLOCK_SIZE as u64
}
