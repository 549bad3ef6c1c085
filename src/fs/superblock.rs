use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    device::{BlockStore, BLOCK_SIZE},
    error::{FsError, FsResult},
    utils::{
        time_util::{self, *},
        traits::{DigestInSelf, SerializeAndDigest},
    },
};

use super::{layout::SUPERBLOCK_BLOCK, Layout, FS_MAGIC, FS_VERSION, MAX_MOUNT_COUNT, ROOT_INODE};

/// The superblock of this filesystem, stored in block 0
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    pub version: u32,
    /// data block size
    pub block_size: u32,
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub free_blocks: u32,
    pub free_inodes: u32,
    pub inode_table_start: u32,
    pub inode_table_blocks: u32,
    pub data_blocks_start: u32,
    pub root_inode: u32,
    pub mount_count: u32,
    pub max_mount_count: u32,
    pub created_at: TimeDurationStruct,
    pub last_mount_at: TimeDurationStruct,
    pub last_write_at: TimeDurationStruct,
    pub last_check_at: TimeDurationStruct,
    /// to verify the integrity of this superblock
    /// intend to use a fast secure hash function,like [blake3]
    pub digest: [u8; 32],
}

impl SuperBlock {
    /// a superblock for a fresh volume, every inode and data block still free
    pub fn new(layout: &Layout) -> Self {
        let now = time_util::now();
        Self {
            magic: FS_MAGIC,
            version: FS_VERSION,
            block_size: BLOCK_SIZE,
            total_blocks: layout.total_blocks,
            total_inodes: layout.total_inodes,
            free_blocks: layout.data_blocks,
            free_inodes: layout.total_inodes,
            inode_table_start: layout.inode_table_start,
            inode_table_blocks: layout.inode_table_blocks,
            data_blocks_start: layout.data_blocks_start,
            root_inode: ROOT_INODE,
            mount_count: 0,
            max_mount_count: MAX_MOUNT_COUNT,
            created_at: now,
            last_write_at: now,
            ..Default::default()
        }
    }

    /// the geometry this superblock describes, checked against a recomputed one
    pub fn layout(&self) -> FsResult<Layout> {
        let layout = Layout::compute(self.total_blocks, self.total_inodes)?;
        if layout.inode_table_start != self.inode_table_start
            || layout.inode_table_blocks != self.inode_table_blocks
            || layout.data_blocks_start != self.data_blocks_start
        {
            return Err(FsError::Corrupted(
                "superblock regions disagree with its inode count".into(),
            ));
        }
        Ok(layout)
    }
}

impl SuperBlock {
    pub fn update_last_mounted_at(&mut self) {
        self.mount_count += 1;
        self.last_mount_at = time_util::now();
        if self.mount_count > self.max_mount_count {
            warn!(
                "volume mounted {} times, more than the recommended {} without a check",
                self.mount_count, self.max_mount_count
            );
        }
    }

    pub fn update_last_write_at(&mut self) {
        self.last_write_at = time_util::now();
    }

    pub fn update_last_check_at(&mut self) {
        self.last_check_at = time_util::now();
    }
}

/// for reading and writing block 0
impl SuperBlock {
    /// read and validate the superblock: magic first, then the digest
    pub fn read_from(store: &mut BlockStore) -> FsResult<Self> {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        store.read_block(SUPERBLOCK_BLOCK, &mut buf)?;
        let (mut superblock, _): (SuperBlock, usize) =
            bincode::serde::decode_from_slice(&buf, bincode::config::legacy())?;
        if superblock.magic != FS_MAGIC {
            return Err(FsError::Corrupted(format!(
                "bad filesystem magic {:#x}",
                superblock.magic
            )));
        }
        if !superblock.verify_digest()? {
            return Err(FsError::Corrupted("superblock checksum mismatch".into()));
        }
        if superblock.version != FS_VERSION || superblock.block_size != BLOCK_SIZE {
            return Err(FsError::Corrupted(format!(
                "unsupported filesystem version {} with block size {}",
                superblock.version, superblock.block_size
            )));
        }
        Ok(superblock)
    }

    /// recompute the digest over the current values and write block 0
    pub fn write_to(&mut self, store: &mut BlockStore) -> FsResult<()> {
        let bytes = SerializeAndDigest::serialize(self)?;
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        buf[..bytes.len()].copy_from_slice(&bytes);
        store.write_block(SUPERBLOCK_BLOCK, &buf)?;
        Ok(())
    }
}

impl DigestInSelf for SuperBlock {
    fn digest_field(&mut self) -> &mut [u8; 32] {
        &mut self.digest
    }
}

impl SerializeAndDigest for SuperBlock {}
