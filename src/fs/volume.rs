//! what a formatted volume looks like in memory
use log::{debug, info, warn};

use crate::{
    device::{BlockStore, BLOCK_SIZE},
    error::{FsError, FsResult},
};

use super::{
    layout::{DATA_BITMAP_BLOCKS, DATA_BITMAP_START, INODE_BITMAP_BLOCKS, INODE_BITMAP_START},
    Bitmap, DirEntry, DirectoryIndex, FileKind, FlatDirectory, Inode, Layout, SuperBlock,
    INODE_SIZE, ROOT_INODE,
};

/// A mounted volume: the block store plus the superblock and both bitmaps.
///
/// The metadata is cached here and written back by [Volume::persist_metadata].
#[derive(Debug)]
pub struct Volume {
    store: BlockStore,
    superblock: SuperBlock,
    layout: Layout,
    inode_bitmap: Bitmap,
    data_bitmap: Bitmap,
}

impl Volume {
    /// lay a fresh filesystem with `total_inodes` inodes over `store`
    ///
    /// The superblock goes first with every inode and block still free, then
    /// the root directory is created, the bitmaps are written and the
    /// superblock is rewritten with the final counts.
    pub fn format(mut store: BlockStore, total_inodes: u32) -> FsResult<Self> {
        let layout = Layout::compute(store.total_blocks(), total_inodes)?;
        let mut superblock = SuperBlock::new(&layout);
        superblock.write_to(&mut store)?;

        let mut inode_bitmap = Bitmap::new(layout.total_inodes);
        let mut data_bitmap = Bitmap::new(layout.data_blocks);
        inode_bitmap.reserve(0);
        data_bitmap.reserve(0);
        let mut volume = Volume {
            store,
            superblock,
            layout,
            inode_bitmap,
            data_bitmap,
        };
        volume.create_root()?;
        volume.persist_metadata()?;
        info!(
            "formatted {:?}: {} blocks, {} inodes, data starts at block {}",
            volume.store.path(),
            layout.total_blocks,
            layout.total_inodes,
            layout.data_blocks_start
        );
        Ok(volume)
    }

    /// attach to a formatted volume, validating its superblock and bitmaps
    pub fn mount(mut store: BlockStore) -> FsResult<Self> {
        let mut superblock = SuperBlock::read_from(&mut store)?;
        if superblock.total_blocks != store.total_blocks() {
            return Err(FsError::Corrupted(format!(
                "superblock describes {} blocks, the device has {}",
                superblock.total_blocks,
                store.total_blocks()
            )));
        }
        let layout = superblock.layout()?;
        let inode_bitmap = Bitmap::load(
            &mut store,
            INODE_BITMAP_START,
            INODE_BITMAP_BLOCKS,
            layout.total_inodes,
        )?;
        let data_bitmap = Bitmap::load(
            &mut store,
            DATA_BITMAP_START,
            DATA_BITMAP_BLOCKS,
            layout.data_blocks,
        )?;
        if superblock.free_inodes != inode_bitmap.free_count()
            || superblock.free_blocks != data_bitmap.free_count()
        {
            return Err(FsError::Corrupted(format!(
                "superblock counts {} free inodes and {} free blocks, the bitmaps {} and {}",
                superblock.free_inodes,
                superblock.free_blocks,
                inode_bitmap.free_count(),
                data_bitmap.free_count()
            )));
        }
        superblock.update_last_mounted_at();
        let mut volume = Volume {
            store,
            superblock,
            layout,
            inode_bitmap,
            data_bitmap,
        };
        match volume.read_inode(ROOT_INODE) {
            Ok(root) if root.is_dir() => {}
            Ok(_) => return Err(FsError::Corrupted("root inode is not a directory".into())),
            Err(e) => return Err(FsError::Corrupted(format!("root inode unreadable: {e}"))),
        }
        volume.superblock.write_to(&mut volume.store)?;
        info!(
            "mounted {:?} ({} of {} blocks free, mount #{})",
            volume.store.path(),
            volume.superblock.free_blocks,
            volume.layout.data_blocks,
            volume.superblock.mount_count
        );
        Ok(volume)
    }

    /// create root directory "/"
    fn create_root(&mut self) -> FsResult<()> {
        let index = self.allocate_inode()?;
        if index != ROOT_INODE {
            return Err(FsError::Corrupted(format!(
                "root inode index must be {ROOT_INODE}, not {index}"
            )));
        }
        let block = self.allocate_data_block()?;
        let mut root = Inode::new(ROOT_INODE, FileKind::Directory, 0o755, 0, 0);
        root.add_block(block, 0)?;
        root.file_size = BLOCK_SIZE as u64;
        self.write_inode(&mut root)?;

        let dir = FlatDirectory::new(ROOT_INODE);
        dir.insert(self, &DirEntry::new(".", ROOT_INODE, FileKind::Directory)?)?;
        dir.insert(self, &DirEntry::new("..", ROOT_INODE, FileKind::Directory)?)?;
        Ok(())
    }

    /// give the block store back, the caller persists first
    pub fn into_store(self) -> BlockStore {
        self.store
    }
}

/// get [SuperBlock], [Layout], the bitmaps and the [BlockStore] of this volume
impl Volume {
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub(crate) fn superblock_mut(&mut self) -> &mut SuperBlock {
        &mut self.superblock
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn inode_bitmap(&self) -> &Bitmap {
        &self.inode_bitmap
    }

    #[inline]
    pub fn data_bitmap(&self) -> &Bitmap {
        &self.data_bitmap
    }

    #[inline]
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    #[inline]
    pub(crate) fn store_mut(&mut self) -> &mut BlockStore {
        &mut self.store
    }
}

/// [Inode] operations
impl Volume {
    fn check_inode_number(&self, n: u32) -> FsResult<()> {
        if n == 0 || n >= self.layout.total_inodes {
            return Err(FsError::InvalidParam(format!(
                "inode {n} is outside 1..{}",
                self.layout.total_inodes
            )));
        }
        Ok(())
    }

    /// read and verify inode `n`, which must be allocated
    pub fn read_inode(&mut self, n: u32) -> FsResult<Inode> {
        self.check_inode_number(n)?;
        if !self.inode_bitmap.is_set(n) {
            return Err(FsError::NotFound(format!("inode {n}")));
        }
        let (block, offset) = self.layout.inode_location(n);
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        self.store.read_block(block, &mut buf)?;
        let inode = Inode::from_slot(&buf[offset..offset + INODE_SIZE as usize])?;
        if inode.inode_number != n {
            return Err(FsError::Corrupted(format!(
                "slot of inode {n} holds inode {}",
                inode.inode_number
            )));
        }
        Ok(inode)
    }

    /// write `inode` into its slot, refreshing its digest
    pub fn write_inode(&mut self, inode: &mut Inode) -> FsResult<()> {
        self.check_inode_number(inode.inode_number)?;
        let slot = inode.to_slot()?;
        self.write_inode_slot(inode.inode_number, &slot)
    }

    fn write_inode_slot(&mut self, n: u32, slot: &[u8]) -> FsResult<()> {
        let (block, offset) = self.layout.inode_location(n);
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        self.store.read_block(block, &mut buf)?;
        buf[offset..offset + INODE_SIZE as usize].copy_from_slice(slot);
        self.store.write_block(block, &buf)?;
        Ok(())
    }

    /// claim a free inode number
    pub fn allocate_inode(&mut self) -> FsResult<u32> {
        let n = self
            .inode_bitmap
            .allocate()
            .ok_or_else(|| FsError::NoSpace("no free inodes".into()))?;
        self.superblock.free_inodes = self.inode_bitmap.free_count();
        debug!("allocated inode {n}");
        Ok(n)
    }

    /// zero inode `n`'s slot and clear its bit
    /// # Return
    /// `false` if the inode was already free
    pub fn free_inode(&mut self, n: u32) -> FsResult<bool> {
        self.check_inode_number(n)?;
        if n == ROOT_INODE {
            return Err(FsError::InvalidParam("the root inode cannot be freed".into()));
        }
        if !self.inode_bitmap.is_set(n) {
            warn!("inode {n} is already free");
            return Ok(false);
        }
        self.write_inode_slot(n, &[0u8; INODE_SIZE as usize])?;
        self.inode_bitmap.free(n);
        self.superblock.free_inodes = self.inode_bitmap.free_count();
        debug!("freed inode {n}");
        Ok(true)
    }
}

/// data block operations
impl Volume {
    /// claim a free data block and zero it
    /// # Return
    /// the absolute block number
    pub fn allocate_data_block(&mut self) -> FsResult<u32> {
        let bit = self
            .data_bitmap
            .allocate()
            .ok_or_else(|| FsError::NoSpace("no free data blocks".into()))?;
        let block = self.layout.data_block(bit);
        if let Err(e) = self.store.zero_block(block) {
            self.data_bitmap.free(bit);
            return Err(e.into());
        }
        self.superblock.free_blocks = self.data_bitmap.free_count();
        debug!("allocated data block {block}");
        Ok(block)
    }

    /// release absolute block `block`
    /// # Return
    /// `false` if it was already free
    pub fn free_data_block(&mut self, block: u32) -> FsResult<bool> {
        let bit = match self.layout.data_bit(block) {
            Some(bit) if bit != 0 => bit,
            _ => {
                return Err(FsError::InvalidParam(format!(
                    "block {block} is not an allocatable data block"
                )))
            }
        };
        let freed = self.data_bitmap.free(bit);
        self.superblock.free_blocks = self.data_bitmap.free_count();
        if freed {
            debug!("freed data block {block}");
        } else {
            warn!("data block {block} is already free");
        }
        Ok(freed)
    }

    pub fn read_block(&mut self, block: u32, buf: &mut [u8]) -> FsResult<()> {
        Ok(self.store.read_block(block, buf)?)
    }

    pub fn write_block(&mut self, block: u32, data: &[u8]) -> FsResult<()> {
        Ok(self.store.write_block(block, data)?)
    }
}

/// persistence
impl Volume {
    /// write both bitmaps, then the superblock with counts taken from them
    pub fn persist_metadata(&mut self) -> FsResult<()> {
        self.inode_bitmap
            .persist(&mut self.store, INODE_BITMAP_START, INODE_BITMAP_BLOCKS)?;
        self.data_bitmap
            .persist(&mut self.store, DATA_BITMAP_START, DATA_BITMAP_BLOCKS)?;
        self.superblock.free_inodes = self.inode_bitmap.free_count();
        self.superblock.free_blocks = self.data_bitmap.free_count();
        self.superblock.update_last_write_at();
        self.superblock.write_to(&mut self.store)
    }

    /// persist the metadata and flush the block store
    pub fn sync(&mut self) -> FsResult<()> {
        self.persist_metadata()?;
        Ok(self.store.sync()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    const VOLUME_SIZE: u64 = 256 * 1024;

    fn format(inodes: u32) -> (TempDir, Volume) {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("volume.img"), VOLUME_SIZE).unwrap();
        let volume = Volume::format(store, inodes).unwrap();
        (dir, volume)
    }

    fn reopen(path: &Path) -> BlockStore {
        BlockStore::open(path, 0).unwrap()
    }

    #[test]
    fn test_root_after_format() -> FsResult<()> {
        let (_dir, mut volume) = format(64);
        let root = volume.read_inode(ROOT_INODE)?;
        assert!(root.is_dir());
        assert_eq!(root.permissions, 0o755);
        assert_eq!((root.owner_uid, root.owner_gid), (0, 0));
        assert_eq!(root.link_count, 2);
        assert_eq!(root.block_count, 1);
        assert_eq!(root.file_size, BLOCK_SIZE as u64);

        assert!(volume.inode_bitmap().is_set(0));
        assert!(volume.inode_bitmap().is_set(ROOT_INODE));
        assert!(volume.data_bitmap().is_set(0));
        assert!(volume.data_bitmap().is_set(1));
        let layout = *volume.layout();
        assert_eq!(root.block_at(0), Some(layout.data_block(1)));
        assert_eq!(volume.superblock().free_inodes, 62);
        assert_eq!(volume.superblock().free_blocks, layout.data_blocks - 2);

        let names: Vec<_> = FlatDirectory::new(ROOT_INODE)
            .entries(&mut volume)?
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, [".", ".."]);
        Ok(())
    }

    #[test]
    fn test_format_rejects_bad_geometry() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("tiny.img"), 16 * 1024).unwrap();
        assert!(matches!(
            Volume::format(store, 64),
            Err(FsError::InvalidParam(_))
        ));
    }

    #[test]
    fn test_inode_exhaustion() -> FsResult<()> {
        let (_dir, mut volume) = format(16);
        // bit 0 and the root are taken
        let mut allocated = Vec::new();
        for _ in 0..14 {
            allocated.push(volume.allocate_inode()?);
        }
        assert!(matches!(volume.allocate_inode(), Err(FsError::NoSpace(_))));
        assert_eq!(volume.superblock().free_inodes, 0);

        assert!(volume.free_inode(allocated[5])?);
        assert_eq!(volume.allocate_inode()?, allocated[5]);
        Ok(())
    }

    #[test]
    fn test_block_exhaustion() -> FsResult<()> {
        let (_dir, mut volume) = format(16);
        let expected = volume.layout().data_blocks - 2;
        let mut count = 0;
        while volume.allocate_data_block().is_ok() {
            count += 1;
        }
        assert_eq!(count, expected);
        assert_eq!(volume.superblock().free_blocks, 0);
        assert!(matches!(
            volume.allocate_data_block(),
            Err(FsError::NoSpace(_))
        ));
        Ok(())
    }

    #[test]
    fn test_allocated_blocks_are_zeroed() -> FsResult<()> {
        let (_dir, mut volume) = format(16);
        let block = volume.allocate_data_block()?;
        volume.write_block(block, &[0xaa; BLOCK_SIZE as usize])?;
        volume.free_data_block(block)?;
        // the scan wraps back to the same bit once everything after it is taken
        let mut again = volume.allocate_data_block()?;
        while again != block {
            again = volume.allocate_data_block()?;
        }
        let mut buf = vec![0xffu8; BLOCK_SIZE as usize];
        volume.read_block(block, &mut buf)?;
        assert!(buf.iter().all(|b| *b == 0));
        Ok(())
    }

    #[test]
    fn test_free_is_idempotent() -> FsResult<()> {
        let (_dir, mut volume) = format(16);
        let n = volume.allocate_inode()?;
        let free = volume.superblock().free_inodes;
        assert!(volume.free_inode(n)?);
        assert!(!volume.free_inode(n)?);
        assert_eq!(volume.superblock().free_inodes, free + 1);
        assert!(matches!(volume.read_inode(n), Err(FsError::NotFound(_))));
        assert!(matches!(
            volume.free_inode(ROOT_INODE),
            Err(FsError::InvalidParam(_))
        ));

        let block = volume.allocate_data_block()?;
        let free = volume.superblock().free_blocks;
        assert!(volume.free_data_block(block)?);
        assert!(!volume.free_data_block(block)?);
        assert_eq!(volume.superblock().free_blocks, free + 1);
        let start = volume.layout().data_blocks_start;
        assert!(matches!(
            volume.free_data_block(start),
            Err(FsError::InvalidParam(_))
        ));
        Ok(())
    }

    #[test]
    fn test_inode_numbers_are_checked() {
        let (_dir, mut volume) = format(16);
        assert!(matches!(volume.read_inode(0), Err(FsError::InvalidParam(_))));
        assert!(matches!(volume.read_inode(16), Err(FsError::InvalidParam(_))));
        assert!(matches!(volume.read_inode(2), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_remount_keeps_state() -> FsResult<()> {
        let (dir, mut volume) = format(32);
        let n = volume.allocate_inode()?;
        let mut inode = Inode::new(n, FileKind::RegularFile, 0o640, 1000, 1000);
        inode.file_size = 3;
        volume.write_inode(&mut inode)?;
        volume.sync()?;
        let free = (volume.superblock().free_inodes, volume.superblock().free_blocks);
        drop(volume.into_store());

        let mut volume = Volume::mount(reopen(&dir.path().join("volume.img")))?;
        assert_eq!(volume.read_inode(n)?, inode);
        assert_eq!(
            (volume.superblock().free_inodes, volume.superblock().free_blocks),
            free
        );
        assert_eq!(volume.superblock().mount_count, 1);
        Ok(())
    }

    #[test]
    fn test_mount_rejects_count_mismatch() -> FsResult<()> {
        let (dir, mut volume) = format(32);
        volume.superblock.free_blocks -= 1;
        volume.superblock.write_to(&mut volume.store)?;
        drop(volume.into_store());
        let err = Volume::mount(reopen(&dir.path().join("volume.img"))).unwrap_err();
        assert!(matches!(err, FsError::Corrupted(ref m) if m.contains("bitmaps")));
        Ok(())
    }

    #[test]
    fn test_mount_rejects_garbage() -> FsResult<()> {
        let (dir, volume) = format(32);
        let mut store = volume.into_store();
        store.zero_block(0)?;
        drop(store);
        assert!(matches!(
            Volume::mount(reopen(&dir.path().join("volume.img"))),
            Err(FsError::Corrupted(_))
        ));
        Ok(())
    }

    #[test]
    fn test_mount_rejects_broken_root() -> FsResult<()> {
        let (dir, mut volume) = format(32);
        let (block, _) = volume.layout().inode_location(ROOT_INODE);
        volume.store.zero_block(block)?;
        drop(volume.into_store());
        let err = Volume::mount(reopen(&dir.path().join("volume.img"))).unwrap_err();
        assert!(matches!(err, FsError::Corrupted(ref m) if m.contains("root")));
        Ok(())
    }
}
