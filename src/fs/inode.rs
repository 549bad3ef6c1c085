use serde::{Deserialize, Serialize};

use crate::{
    error::{FsError, FsResult},
    utils::{
        time_util::{self, TimeDurationStruct},
        traits::{DigestInSelf, SerializeAndDigest},
    },
};

use super::{filekind::FileKind, DIRECT_POINTERS, INODE_SIZE};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Inode {
    pub inode_number: u32,
    pub file_kind: FileKind,
    /// rwx bits for owner, group and other
    pub permissions: u16,
    pub owner_uid: u32,
    pub owner_gid: u32,
    pub link_count: u32,
    pub file_size: u64,
    /// data blocks currently referenced by `direct_blocks`
    pub block_count: u32,
    pub accessed_at: TimeDurationStruct,
    pub modified_at: TimeDurationStruct,
    pub changed_at: TimeDurationStruct,
    pub created_at: TimeDurationStruct,
    /// absolute block numbers, 0 means unallocated
    pub direct_blocks: [u32; DIRECT_POINTERS],
    // reserved for growth past the direct pointers, always 0 for now
    pub indirect_block: u32,
    pub double_indirect_block: u32,
    pub triple_indirect_block: u32,
    pub flags: u32,
    pub generation: u32,
    pub digest: [u8; 32],
}

/// This block is about digest and verify digest
impl DigestInSelf for Inode {
    fn digest_field(&mut self) -> &mut [u8; 32] {
        &mut self.digest
    }
}
// This block is about serialization and deserialization
impl SerializeAndDigest for Inode {}

impl Inode {
    pub fn new(
        inode_number: u32,
        file_kind: impl Into<FileKind>,
        permissions: u16,
        owner_uid: u32,
        owner_gid: u32,
    ) -> Self {
        let now = time_util::now();
        let file_kind = file_kind.into();
        Inode {
            inode_number,
            file_kind,
            permissions: permissions & 0o777,
            owner_uid,
            owner_gid,
            link_count: if file_kind == FileKind::Directory { 2 } else { 1 },
            accessed_at: now,
            modified_at: now,
            changed_at: now,
            created_at: now,
            // don't calculate digest now
            ..Inode::default()
        }
    }

    /// encode into an inode table slot
    pub fn to_slot(&mut self) -> FsResult<Vec<u8>> {
        let mut bytes = SerializeAndDigest::serialize(self)?;
        if bytes.len() > INODE_SIZE as usize {
            return Err(FsError::Corrupted(format!(
                "inode {} encodes to {} bytes, a slot holds {INODE_SIZE}",
                self.inode_number,
                bytes.len()
            )));
        }
        bytes.resize(INODE_SIZE as usize, 0);
        Ok(bytes)
    }

    /// decode an inode table slot and verify its digest
    pub fn from_slot(slot: &[u8]) -> FsResult<Self> {
        <Self as SerializeAndDigest>::deserialize(slot).map(|(inode, _)| inode)
    }
}

/// This block is about file metadata operations
impl Inode {
    pub fn is_regular_file(&self) -> bool {
        self.file_kind == FileKind::RegularFile
    }

    pub fn is_dir(&self) -> bool {
        self.file_kind == FileKind::Directory
    }

    pub fn update_modified_at(&mut self) {
        let now = time_util::now();
        self.changed_at = now;
        self.modified_at = now;
    }

    pub fn update_accessed_at(&mut self) {
        self.accessed_at = time_util::now();
    }

    pub fn update_changed_at(&mut self) {
        self.changed_at = time_util::now();
    }
}

/// This block is about the direct block pointers
impl Inode {
    /// all allocated data blocks
    pub fn direct_blocks(&self) -> Vec<u32> {
        self.direct_blocks
            .iter()
            .filter_map(|x| if *x != 0 { Some(*x) } else { None })
            .collect()
    }

    /// the block holding logical block `index`, if allocated
    pub fn block_at(&self, index: usize) -> Option<u32> {
        self.direct_blocks.get(index).copied().filter(|b| *b != 0)
    }

    pub fn add_block(&mut self, block: u32, index: usize) -> FsResult<()> {
        let slot = self.direct_blocks.get_mut(index).ok_or_else(|| {
            FsError::Unsupported(format!(
                "logical block {index} is past the {DIRECT_POINTERS} direct pointers"
            ))
        })?;
        if *slot == 0 {
            self.block_count += 1;
        }
        *slot = block;
        Ok(())
    }

    /// detach every block from logical index `from` on
    /// # Return
    /// the detached block numbers, for the caller to free
    pub fn release_blocks_from(&mut self, from: usize) -> Vec<u32> {
        let mut released = Vec::new();
        for slot in self.direct_blocks.iter_mut().skip(from) {
            if *slot != 0 {
                released.push(*slot);
                *slot = 0;
            }
        }
        self.block_count -= released.len() as u32;
        released
    }
}

impl Inode {
    /// Get the size of the inode in disk
    /// #Example
    /// ```
    /// use blockfs::fs::{Inode, INODE_SIZE};
    /// let size = Inode::inode_size_in_disk();
    /// assert!(size <= INODE_SIZE as usize);
    /// ```
    pub fn inode_size_in_disk() -> usize {
        let mut inode = Inode {
            direct_blocks: [u32::MAX; DIRECT_POINTERS],
            ..Inode::default()
        };
        SerializeAndDigest::serialize(&mut inode).map_or(usize::MAX, |bytes| bytes.len())
    }
}
