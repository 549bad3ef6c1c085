use bitvec::prelude::*;
use log::debug;

use crate::{
    device::{BlockStore, BLOCK_SIZE},
    error::{FsError, FsResult},
    utils::fs_size_calculator,
};

/// An allocation bit-vector.
///
/// A set bit means the inode or data block is in use. Bit 0 is never handed
/// out by [Bitmap::allocate], the volume reserves it at format time.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    bits: BitVec<u8, Lsb0>,
    free_count: u32,
    /// where the next scan starts
    last_allocated: u32,
}

/// for construction and persistence
impl Bitmap {
    /// a zeroed bitmap of `total_bits` bits
    pub fn new(total_bits: u32) -> Self {
        Bitmap {
            bits: BitVec::repeat(false, total_bits as usize),
            free_count: total_bits,
            last_allocated: 0,
        }
    }

    /// rebuild a bitmap from its raw bytes, recounting the free bits
    pub fn from_bytes(bytes: &[u8], total_bits: u32) -> FsResult<Self> {
        let needed = fs_size_calculator::bitmap_size(total_bits) as usize;
        if bytes.len() < needed {
            return Err(FsError::Corrupted(format!(
                "{total_bits} bits need {needed} bytes, only {} given",
                bytes.len()
            )));
        }
        let mut bits = BitVec::<u8, Lsb0>::from_slice(&bytes[..needed]);
        bits.truncate(total_bits as usize);
        let free_count = bits.count_zeros() as u32;
        Ok(Bitmap {
            bits,
            free_count,
            last_allocated: 0,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    /// write the bitmap across `blocks` blocks starting at `start`
    ///
    /// Fails with [FsError::NoSpace] when the bitmap does not fit the region.
    pub fn persist(&self, store: &mut BlockStore, start: u32, blocks: u32) -> FsResult<()> {
        let bytes = self.as_bytes();
        let capacity = blocks as usize * BLOCK_SIZE as usize;
        if bytes.len() > capacity {
            return Err(FsError::NoSpace(format!(
                "bitmap of {} bits needs {} bytes, its region holds {capacity}",
                self.total_bits(),
                bytes.len()
            )));
        }
        let mut region = vec![0u8; capacity];
        region[..bytes.len()].copy_from_slice(bytes);
        store.write_blocks(start, &region)?;
        debug!("persisted {} bitmap bytes at block {start}", bytes.len());
        Ok(())
    }

    /// read a bitmap of `total_bits` bits back from its region
    pub fn load(store: &mut BlockStore, start: u32, blocks: u32, total_bits: u32) -> FsResult<Self> {
        let needed_blocks = fs_size_calculator::bitmap_blocks(total_bits);
        if needed_blocks > blocks {
            return Err(FsError::NoSpace(format!(
                "bitmap of {total_bits} bits cannot live in {blocks} blocks"
            )));
        }
        let mut region = vec![0u8; needed_blocks.max(1) as usize * BLOCK_SIZE as usize];
        store.read_blocks(start, &mut region)?;
        Self::from_bytes(&region, total_bits)
    }
}

/// for bit allocation
impl Bitmap {
    pub fn total_bits(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn free_count(&self) -> u32 {
        self.free_count
    }

    pub fn last_allocated(&self) -> u32 {
        self.last_allocated
    }

    /// number of clear bits, counted the slow way
    pub fn count_clear(&self) -> u32 {
        self.bits.count_zeros() as u32
    }

    pub fn is_set(&self, n: u32) -> bool {
        self.bits.get(n as usize).map_or(false, |bit| *bit)
    }

    /// mark bit `n` used without searching
    /// # Return
    /// `false` if the bit was already set or is out of range
    pub fn reserve(&mut self, n: u32) -> bool {
        if n >= self.total_bits() || self.is_set(n) {
            return false;
        }
        self.bits.set(n as usize, true);
        self.free_count -= 1;
        true
    }

    /// allocate the first clear bit at or after the hint, wrapping around
    /// # Return
    /// `None` when no bit other than the reserved bit 0 is clear
    pub fn allocate(&mut self) -> Option<u32> {
        let total = self.bits.len();
        if self.free_count == 0 || total < 2 {
            return None;
        }
        let start = (self.last_allocated as usize).clamp(1, total - 1);
        let found = self.bits[start..]
            .first_zero()
            .map(|i| i + start)
            .or_else(|| self.bits[1..start].first_zero().map(|i| i + 1))?;
        self.bits.set(found, true);
        self.free_count -= 1;
        self.last_allocated = found as u32;
        Some(found as u32)
    }

    /// clear bit `n`
    /// # Return
    /// `false` if it was already clear, which changes nothing
    pub fn free(&mut self, n: u32) -> bool {
        if n == 0 || !self.is_set(n) {
            return false;
        }
        self.bits.set(n as usize, false);
        self.free_count += 1;
        true
    }
}
