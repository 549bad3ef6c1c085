//! create our filesystem
use std::path::Path;

use anyhow::{anyhow, Context};
use byte_unit::{Byte, ByteUnit};
use log::info;

use crate::{
    device::{BlockStore, BLOCK_SIZE},
    fs::{layout::INODE_TABLE_START, FileSystem, FormatOptions, Layout, SuperBlock},
    utils::fs_size_calculator,
};

/// smallest volume that holds `inode_count` inodes and a root directory
pub fn space_needed(inode_count: u32) -> u64 {
    // the reserved data block plus the root directory block
    let blocks = INODE_TABLE_START as u64
        + fs_size_calculator::inode_table_blocks(inode_count) as u64
        + 2;
    blocks * BLOCK_SIZE as u64
}

/// create a new filesystem, given the path of the image file and its size
/// # Params
/// - `image_file_path`: the path of the image file, which must not exist yet
/// - `file_size`: bytes of blocks, a multiple of the block size
/// - `inode_count`: the number of inodes
/// - `root_password`: the password of the `root` user
///
/// # Return
/// the superblock of the fresh filesystem
pub fn mkfs<P>(
    image_file_path: P,
    file_size: u64,
    inode_count: u32,
    root_password: &str,
) -> anyhow::Result<SuperBlock>
where
    P: AsRef<Path>,
{
    let path = image_file_path.as_ref();
    if path.exists() {
        return Err(anyhow!("{path:?} already exists, refusing to overwrite it"));
    }
    let space_needed = space_needed(inode_count);
    if file_size < space_needed {
        return Err(anyhow!(
            "File size must be at least {} for block size {} and inode count {}",
            Byte::from_bytes(space_needed as _).get_appropriate_unit(true),
            Byte::from_bytes(BLOCK_SIZE as _).get_adjusted_unit(ByteUnit::B),
            inode_count
        ));
    }
    if fs_size_calculator::blocks_in(file_size) * BLOCK_SIZE as u64 != file_size {
        return Err(anyhow!(
            "File size {file_size} is not a multiple of the block size {BLOCK_SIZE}"
        ));
    }
    let blocks = u32::try_from(fs_size_calculator::blocks_in(file_size))
        .context("volume has more blocks than a block number can address")?;
    Layout::compute(blocks, inode_count).context("unsupported volume geometry")?;

    let store = BlockStore::open(path, file_size)
        .with_context(|| format!("failed to create volume {path:?}"))?;
    let mut fs = FileSystem::new();
    let options = FormatOptions {
        total_inodes: inode_count,
        root_password: root_password.to_string(),
    };
    fs.format(store, &options)
        .with_context(|| format!("failed to format {path:?}"))?;
    let superblock = fs.statfs()?;
    let mut store = fs.unmount()?;
    store.close().context("failed to close the new volume")?;
    info!(
        "created {path:?}: {} blocks, {} inodes, {} free",
        superblock.total_blocks,
        superblock.total_inodes,
        Byte::from_bytes(superblock.free_blocks as u128 * BLOCK_SIZE as u128)
            .get_appropriate_unit(true)
    );
    Ok(superblock)
}
