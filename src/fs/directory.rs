use bincode::{Decode, Encode};
use log::debug;

use crate::{
    device::BLOCK_SIZE,
    error::{FsError, FsResult},
};

use super::{FileKind, Inode, Volume, DIRECT_POINTERS, MAX_FILENAME_LEN};

/// every entry occupies a slot of this many bytes
pub const DIR_ENTRY_SIZE: usize = 64;
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE as usize / DIR_ENTRY_SIZE;

/// a `name -> inode` record inside a directory data block
///
/// Removing an entry only clears `valid`, the slot is reused by the next insert.
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_number: u32,
    pub entry_length: u16,
    name_len: u8,
    file_type: u8,
    pub valid: bool,
    name: [u8; MAX_FILENAME_LEN],
}

impl DirEntry {
    pub fn new(name: &str, inode_number: u32, kind: FileKind) -> FsResult<Self> {
        validate_name(name)?;
        let mut buf = [0u8; MAX_FILENAME_LEN];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Ok(DirEntry {
            inode_number,
            entry_length: DIR_ENTRY_SIZE as u16,
            name_len: name.len() as u8,
            file_type: kind.into(),
            valid: true,
            name: buf,
        })
    }

    pub fn name(&self) -> String {
        let len = (self.name_len as usize).min(MAX_FILENAME_LEN);
        String::from_utf8_lossy(&self.name[..len]).into_owned()
    }

    fn has_name(&self, name: &str) -> bool {
        self.name_len as usize == name.len() && &self.name[..name.len()] == name.as_bytes()
    }

    /// the file type cached at insertion time
    pub fn kind(&self) -> FileKind {
        self.file_type.into()
    }

    fn encode_into(&self, slot: &mut [u8]) -> FsResult<()> {
        slot.fill(0);
        bincode::encode_into_slice(self, slot, bincode::config::legacy())?;
        Ok(())
    }

    fn decode(slot: &[u8]) -> FsResult<Self> {
        let (entry, _) = bincode::decode_from_slice(slot, bincode::config::legacy())?;
        Ok(entry)
    }
}

/// a name may be stored in a directory entry
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() {
        return Err(FsError::InvalidParam("empty file name".into()));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(FsError::InvalidParam(format!(
            "file name {name:?} is longer than {MAX_FILENAME_LEN} bytes"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(FsError::InvalidParam(format!(
            "file name {name:?} contains a separator or NUL"
        )));
    }
    Ok(())
}

/// Name lookup inside one directory.
///
/// The inode and bitmap layers only talk to directories through this trait.
pub trait DirectoryIndex {
    /// the valid entry called `name`
    fn lookup(&self, volume: &mut Volume, name: &str) -> FsResult<Option<DirEntry>>;
    /// store `entry`, failing with [FsError::AlreadyExists] on a duplicate name
    fn insert(&self, volume: &mut Volume, entry: &DirEntry) -> FsResult<()>;
    /// tombstone the entry called `name` and return it
    fn remove(&self, volume: &mut Volume, name: &str) -> FsResult<DirEntry>;
    /// every valid entry, in slot order
    fn entries(&self, volume: &mut Volume) -> FsResult<Vec<DirEntry>>;
}

/// where an entry lives: (block, slot in block)
type SlotRef = (u32, usize);

/// One directory whose entries are found by a linear scan of its data blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatDirectory {
    pub inode_number: u32,
}

impl FlatDirectory {
    pub fn new(inode_number: u32) -> Self {
        FlatDirectory { inode_number }
    }

    fn inode(&self, volume: &mut Volume) -> FsResult<Inode> {
        let inode = volume.read_inode(self.inode_number)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory(format!(
                "inode {}",
                self.inode_number
            )));
        }
        Ok(inode)
    }

    /// visit every slot of every allocated directory block until `visit` says stop
    fn scan<F>(
        &self,
        volume: &mut Volume,
        dir: &Inode,
        mut visit: F,
    ) -> FsResult<Option<(SlotRef, DirEntry)>>
    where
        F: FnMut(SlotRef, &DirEntry) -> bool,
    {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        for block in dir.direct_blocks() {
            volume.read_block(block, &mut buf)?;
            for (slot, bytes) in buf.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
                let entry = DirEntry::decode(bytes)?;
                if visit((block, slot), &entry) {
                    return Ok(Some(((block, slot), entry)));
                }
            }
        }
        Ok(None)
    }

    fn write_slot(
        &self,
        volume: &mut Volume,
        (block, slot): SlotRef,
        entry: &DirEntry,
    ) -> FsResult<()> {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        volume.read_block(block, &mut buf)?;
        entry.encode_into(&mut buf[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE])?;
        volume.write_block(block, &buf)
    }

    /// give the directory one more data block at the first empty pointer
    fn grow(&self, volume: &mut Volume, dir: &mut Inode) -> FsResult<u32> {
        let index = (0..DIRECT_POINTERS)
            .find(|i| dir.block_at(*i).is_none())
            .ok_or_else(|| {
                FsError::NoSpace(format!(
                    "directory {} already uses all {DIRECT_POINTERS} blocks",
                    self.inode_number
                ))
            })?;
        let block = volume.allocate_data_block()?;
        dir.add_block(block, index)?;
        dir.file_size = dir.block_count as u64 * BLOCK_SIZE as u64;
        dir.update_modified_at();
        if let Err(e) = volume.write_inode(dir) {
            volume.free_data_block(block)?;
            return Err(e);
        }
        debug!("directory {} grew to block {block}", self.inode_number);
        Ok(block)
    }
}

impl DirectoryIndex for FlatDirectory {
    fn lookup(&self, volume: &mut Volume, name: &str) -> FsResult<Option<DirEntry>> {
        let dir = self.inode(volume)?;
        Ok(self
            .scan(volume, &dir, |_, entry| entry.valid && entry.has_name(name))?
            .map(|(_, entry)| entry))
    }

    fn insert(&self, volume: &mut Volume, entry: &DirEntry) -> FsResult<()> {
        let mut dir = self.inode(volume)?;
        let name = entry.name();
        let mut free_slot = None;
        let duplicate = self.scan(volume, &dir, |slot, e| {
            if e.valid {
                return e.has_name(&name);
            }
            free_slot.get_or_insert(slot);
            false
        })?;
        if duplicate.is_some() {
            return Err(FsError::AlreadyExists(name));
        }
        let slot = match free_slot {
            Some(slot) => slot,
            None => (self.grow(volume, &mut dir)?, 0),
        };
        self.write_slot(volume, slot, entry)?;
        debug!(
            "inserted {name:?} -> inode {} at block {} slot {}",
            entry.inode_number, slot.0, slot.1
        );
        Ok(())
    }

    fn remove(&self, volume: &mut Volume, name: &str) -> FsResult<DirEntry> {
        let mut dir = self.inode(volume)?;
        let (slot, entry) = self
            .scan(volume, &dir, |_, e| e.valid && e.has_name(name))?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let tombstone = DirEntry {
            valid: false,
            inode_number: 0,
            ..entry.clone()
        };
        self.write_slot(volume, slot, &tombstone)?;
        dir.update_modified_at();
        volume.write_inode(&mut dir)?;
        Ok(entry)
    }

    fn entries(&self, volume: &mut Volume) -> FsResult<Vec<DirEntry>> {
        let dir = self.inode(volume)?;
        let mut entries = Vec::new();
        self.scan(volume, &dir, |_, e| {
            if e.valid {
                entries.push(e.clone());
            }
            false
        })?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{device::BlockStore, fs::ROOT_INODE};
    use tempfile::{tempdir, TempDir};

    fn volume() -> (TempDir, Volume) {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("dir.img"), 256 * 1024).unwrap();
        let volume = Volume::format(store, 64).unwrap();
        (dir, volume)
    }

    #[test]
    fn test_entry_fits_its_slot() -> FsResult<()> {
        let entry = DirEntry::new(&"x".repeat(MAX_FILENAME_LEN), 9, FileKind::RegularFile)?;
        let mut slot = [0u8; DIR_ENTRY_SIZE];
        entry.encode_into(&mut slot)?;
        assert_eq!(DirEntry::decode(&slot)?, entry);
        assert_eq!(entry.kind(), FileKind::RegularFile);
        Ok(())
    }

    #[test]
    fn test_name_validation() {
        assert!(DirEntry::new("", 1, FileKind::RegularFile).is_err());
        assert!(DirEntry::new("a/b", 1, FileKind::RegularFile).is_err());
        assert!(DirEntry::new(&"y".repeat(MAX_FILENAME_LEN + 1), 1, FileKind::RegularFile).is_err());
        assert!(DirEntry::new("notes.txt", 1, FileKind::RegularFile).is_ok());
    }

    #[test]
    fn test_root_has_dot_entries() -> FsResult<()> {
        let (_dir, mut volume) = volume();
        let root = FlatDirectory::new(ROOT_INODE);
        let entries = root.entries(&mut volume)?;
        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![".", ".."]);
        assert!(entries.iter().all(|e| e.inode_number == ROOT_INODE));
        assert!(entries.iter().all(|e| e.kind() == FileKind::Directory));
        Ok(())
    }

    #[test]
    fn test_insert_lookup_remove_reuse() -> FsResult<()> {
        let (_dir, mut volume) = volume();
        let root = FlatDirectory::new(ROOT_INODE);
        root.insert(&mut volume, &DirEntry::new("a", 5, FileKind::RegularFile)?)?;
        root.insert(&mut volume, &DirEntry::new("b", 6, FileKind::RegularFile)?)?;
        assert_eq!(root.lookup(&mut volume, "a")?.map(|e| e.inode_number), Some(5));
        assert!(root.lookup(&mut volume, "c")?.is_none());
        assert!(matches!(
            root.insert(&mut volume, &DirEntry::new("a", 7, FileKind::RegularFile)?),
            Err(FsError::AlreadyExists(_))
        ));

        assert_eq!(root.remove(&mut volume, "a")?.inode_number, 5);
        assert!(root.lookup(&mut volume, "a")?.is_none());
        assert!(matches!(root.remove(&mut volume, "a"), Err(FsError::NotFound(_))));

        // the tombstoned slot is taken before anything later
        root.insert(&mut volume, &DirEntry::new("c", 8, FileKind::RegularFile)?)?;
        let names: Vec<_> = root.entries(&mut volume)?.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![".", "..", "c", "b"]);
        Ok(())
    }

    #[test]
    fn test_directory_grows_then_fills() -> FsResult<()> {
        let (_dir, mut volume) = volume();
        let root = FlatDirectory::new(ROOT_INODE);
        let capacity = DIRECT_POINTERS * ENTRIES_PER_BLOCK - 2;
        for i in 0..capacity {
            root.insert(&mut volume, &DirEntry::new(&format!("f{i}"), 2, FileKind::RegularFile)?)?;
        }
        let dir = volume.read_inode(ROOT_INODE)?;
        assert_eq!(dir.block_count, DIRECT_POINTERS as u32);
        assert_eq!(dir.file_size, DIRECT_POINTERS as u64 * BLOCK_SIZE as u64);

        let free_blocks = volume.superblock().free_blocks;
        assert!(matches!(
            root.insert(&mut volume, &DirEntry::new("one-too-many", 2, FileKind::RegularFile)?),
            Err(FsError::NoSpace(_))
        ));
        assert_eq!(volume.superblock().free_blocks, free_blocks);
        assert_eq!(root.entries(&mut volume)?.len(), capacity + 2);
        Ok(())
    }
}
