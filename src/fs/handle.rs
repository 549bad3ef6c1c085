//! open file handles
use enumflags2::{bitflags, BitFlags};

use crate::{
    error::{FsError, FsResult},
    utils::time_util::{self, TimeDurationStruct},
};

use super::MAX_OPEN_FILES;

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlag {
    Read = 0b0001,
    Write = 0b0010,
    /// every write starts at end of file
    Append = 0b0100,
    /// drop the contents when opening
    Truncate = 0b1000,
}

pub type OpenFlags = BitFlags<OpenFlag>;

impl OpenFlag {
    #[inline]
    pub fn read_write() -> OpenFlags {
        OpenFlag::Read | OpenFlag::Write
    }
}

/// index into the handle table
pub type Fd = u32;

/// one open file, shared by every descriptor `dup`ed from it
#[derive(Debug, Clone, PartialEq)]
pub struct FileHandle {
    pub inode_number: u32,
    pub flags: OpenFlags,
    /// byte offset of the next read or write
    pub position: u64,
    pub ref_count: u32,
    pub opened_at: TimeDurationStruct,
    pub opened_by: u32,
}

impl FileHandle {
    pub fn new(inode_number: u32, flags: OpenFlags, opened_by: u32) -> Self {
        FileHandle {
            inode_number,
            flags,
            position: 0,
            ref_count: 1,
            opened_at: time_util::now(),
            opened_by,
        }
    }

    #[inline]
    pub fn readable(&self) -> bool {
        self.flags.contains(OpenFlag::Read)
    }

    #[inline]
    pub fn writable(&self) -> bool {
        self.flags.contains(OpenFlag::Write)
    }
}

/// Fixed arena of [MAX_OPEN_FILES] handle slots.
///
/// A descriptor is the slot index, the lowest free slot is handed out first.
#[derive(Debug)]
pub struct HandleTable {
    slots: Vec<Option<FileHandle>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        HandleTable {
            slots: vec![None; MAX_OPEN_FILES],
        }
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: FileHandle) -> FsResult<Fd> {
        let (fd, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(FsError::TooManyOpen(MAX_OPEN_FILES))?;
        *slot = Some(handle);
        Ok(fd as Fd)
    }

    pub fn get(&self, fd: Fd) -> FsResult<&FileHandle> {
        self.slots
            .get(fd as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| FsError::InvalidParam(format!("fd {fd} is not open")))
    }

    pub fn get_mut(&mut self, fd: Fd) -> FsResult<&mut FileHandle> {
        self.slots
            .get_mut(fd as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| FsError::InvalidParam(format!("fd {fd} is not open")))
    }

    /// take one more reference on `fd`
    pub fn retain(&mut self, fd: Fd) -> FsResult<u32> {
        let handle = self.get_mut(fd)?;
        handle.ref_count += 1;
        Ok(handle.ref_count)
    }

    /// drop one reference, freeing the slot at zero
    /// # Return
    /// the handle if this was the last reference
    pub fn release(&mut self, fd: Fd) -> FsResult<Option<FileHandle>> {
        let handle = self.get_mut(fd)?;
        handle.ref_count = handle.ref_count.saturating_sub(1);
        if handle.ref_count > 0 {
            return Ok(None);
        }
        Ok(self.slots[fd as usize].take())
    }

    pub fn is_inode_open(&self, inode_number: u32) -> bool {
        self.iter().any(|(_, h)| h.inode_number == inode_number)
    }

    /// every live handle with its descriptor
    pub fn iter(&self) -> impl Iterator<Item = (Fd, &FileHandle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(fd, slot)| slot.as_ref().map(|h| (fd as Fd, h)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// forget every handle
    /// # Return
    /// how many were open
    pub fn clear(&mut self) -> usize {
        let open = self.len();
        self.slots.iter_mut().for_each(|slot| *slot = None);
        open
    }
}
