use serde::{Deserialize, Serialize};

use crate::utils::time_util::{self, TimeDurationStruct};

use super::{DeviceError, DeviceResult, BLOCK_SIZE, DISK_MAGIC, DISK_VERSION, HEADER_SIZE};

/// identifies a volume file, stored at offset 0 of the host file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VolumeHeader {
    pub magic: u32,
    pub version: u32,
    pub block_size: u32,
    pub total_blocks: u32,
    /// bytes available for blocks, the header region excluded
    pub byte_size: u64,
    pub created_at: TimeDurationStruct,
    pub last_access_at: TimeDurationStruct,
    /// covers the stable fields only, so touching `last_access_at` keeps it valid
    pub checksum: [u8; 32],
}

impl VolumeHeader {
    pub fn new(total_blocks: u32) -> Self {
        let now = time_util::now();
        let mut header = VolumeHeader {
            magic: DISK_MAGIC,
            version: DISK_VERSION,
            block_size: BLOCK_SIZE,
            total_blocks,
            byte_size: total_blocks as u64 * BLOCK_SIZE as u64,
            created_at: now,
            last_access_at: now,
            checksum: [0u8; 32],
        };
        header.checksum = header.stable_checksum();
        header
    }

    fn stable_checksum(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.magic.to_le_bytes());
        hasher.update(&self.version.to_le_bytes());
        hasher.update(&self.block_size.to_le_bytes());
        hasher.update(&self.total_blocks.to_le_bytes());
        hasher.update(&self.byte_size.to_le_bytes());
        *hasher.finalize().as_bytes()
    }

    /// check signature, format and checksum, in that order
    pub fn validate(&self) -> DeviceResult<()> {
        if self.magic != DISK_MAGIC {
            return Err(DeviceError::Corrupted(format!(
                "bad magic number {:#x}",
                self.magic
            )));
        }
        if self.version != DISK_VERSION {
            return Err(DeviceError::Corrupted(format!(
                "unsupported disk version {}",
                self.version
            )));
        }
        if self.block_size != BLOCK_SIZE {
            return Err(DeviceError::Corrupted(format!(
                "block size {} does not match {BLOCK_SIZE}",
                self.block_size
            )));
        }
        if self.checksum != self.stable_checksum() {
            return Err(DeviceError::Corrupted("header checksum mismatch".into()));
        }
        if self.byte_size != self.total_blocks as u64 * BLOCK_SIZE as u64 {
            return Err(DeviceError::Corrupted(format!(
                "byte size {} disagrees with {} blocks",
                self.byte_size, self.total_blocks
            )));
        }
        Ok(())
    }

    /// the smallest host file that can hold this volume
    pub fn file_len(&self) -> u64 {
        HEADER_SIZE + self.byte_size
    }

    pub fn touch(&mut self) {
        self.last_access_at = time_util::now();
    }

    pub fn encode(&self) -> DeviceResult<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::legacy())
            .map_err(|e| DeviceError::InvalidParam(format!("cannot encode header: {e}")))
    }

    pub fn decode(buf: &[u8]) -> DeviceResult<Self> {
        bincode::serde::decode_from_slice(buf, bincode::config::legacy())
            .map(|(header, _)| header)
            .map_err(|e| DeviceError::Corrupted(format!("unreadable header: {e}")))
    }
}
