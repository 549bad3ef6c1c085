//! open, read, write and seek through the handle table
use std::io::SeekFrom;

use log::{debug, info, warn};

use crate::{
    device::BLOCK_SIZE,
    error::{FsError, FsResult},
    user::{check_permission, Access},
};

use super::{
    Fd, FileHandle, FileSystem, Inode, OpenFlag, OpenFlags, Volume, MAX_FILE_SIZE,
};

const BLOCK_SIZE_U64: u64 = BLOCK_SIZE as u64;

/// logical blocks needed to hold `len` bytes
fn blocks_for(len: u64) -> usize {
    ((len + BLOCK_SIZE_U64 - 1) / BLOCK_SIZE_U64) as usize
}

fn check_file_size(end: u64) -> FsResult<()> {
    if end > MAX_FILE_SIZE {
        return Err(FsError::Unsupported(format!(
            "a file ends at {end} bytes, the direct pointers address {MAX_FILE_SIZE}"
        )));
    }
    Ok(())
}

/// the block holding logical block `index`, allocating a zeroed one if needed
fn block_for_write(volume: &mut Volume, inode: &mut Inode, index: usize) -> FsResult<u32> {
    if let Some(block) = inode.block_at(index) {
        return Ok(block);
    }
    let block = volume.allocate_data_block()?;
    if let Err(e) = inode.add_block(block, index) {
        volume.free_data_block(block)?;
        return Err(e);
    }
    Ok(block)
}

/// shrink or grow `inode` to `len` bytes, the caller writes the inode back
fn resize(volume: &mut Volume, inode: &mut Inode, len: u64) -> FsResult<()> {
    check_file_size(len)?;
    if len < inode.file_size {
        let keep = blocks_for(len);
        for block in inode.release_blocks_from(keep) {
            volume.free_data_block(block)?;
        }
        let tail = (len % BLOCK_SIZE_U64) as usize;
        // bytes past the end of file are always zero
        if let Some(block) = inode.block_at(keep.saturating_sub(1)).filter(|_| tail != 0) {
            let mut buf = vec![0u8; BLOCK_SIZE as usize];
            volume.read_block(block, &mut buf)?;
            buf[tail..].fill(0);
            volume.write_block(block, &buf)?;
        }
    } else {
        for index in 0..blocks_for(len) {
            block_for_write(volume, inode, index)?;
        }
    }
    inode.file_size = len;
    Ok(())
}

/// This block is about opening and closing files
impl FileSystem {
    /// open `path` for reading and writing
    pub fn open(&mut self, path: &str) -> FsResult<Fd> {
        self.open_with(path, OpenFlag::read_write())
    }

    /// open `path` with explicit flags
    ///
    /// Read permission is always required, [OpenFlag::Truncate] also needs
    /// write permission.
    pub fn open_with(&mut self, path: &str, flags: OpenFlags) -> FsResult<Fd> {
        info!("open() called with path: {path:?}, flags: {flags:?}");
        if !flags.intersects(OpenFlag::read_write()) {
            return Err(FsError::InvalidParam(
                "a handle must be opened for reading or writing".into(),
            ));
        }
        let index = self.resolve(path)?;
        let session = self.session;
        let mut inode = self.volume_mut()?.read_inode(index)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        if !check_permission(&session, &inode, Access::Read) {
            return Err(FsError::PermissionDenied(format!("read {path:?}")));
        }
        let truncate = flags.contains(OpenFlag::Truncate);
        if truncate && !check_permission(&session, &inode, Access::Write) {
            return Err(FsError::PermissionDenied(format!("truncate {path:?}")));
        }

        let fd = self
            .handles
            .insert(FileHandle::new(index, flags, session.uid))?;
        let volume = self.volume_mut()?;
        let opened = (|| -> FsResult<()> {
            if truncate {
                resize(volume, &mut inode, 0)?;
                inode.update_modified_at();
            }
            inode.update_accessed_at();
            volume.write_inode(&mut inode)?;
            volume.persist_metadata()
        })();
        if let Err(e) = opened {
            self.handles.release(fd)?;
            return Err(e);
        }
        debug!("fd {fd} -> inode {index}");
        Ok(fd)
    }

    /// drop one reference on `fd`
    pub fn close(&mut self, fd: Fd) -> FsResult<()> {
        info!("close() called with fd: {fd}");
        if let Some(handle) = self.handles.release(fd)? {
            debug!("fd {fd} of inode {} is free again", handle.inode_number);
        }
        Ok(())
    }

    /// share `fd` one more time
    /// # Return
    /// the new reference count
    pub fn dup(&mut self, fd: Fd) -> FsResult<u32> {
        self.handles.retain(fd)
    }

    /// every live handle with its descriptor
    pub fn open_handles(&self) -> Vec<(Fd, FileHandle)> {
        self.handles
            .iter()
            .map(|(fd, handle)| (fd, handle.clone()))
            .collect()
    }
}

/// This block is about reading and writing data
impl FileSystem {
    /// the inode behind `fd`, after checking the session may do `access`
    fn inode_for(&mut self, fd: Fd, access: Access) -> FsResult<Inode> {
        let handle = self.handles.get(fd)?;
        let (allowed, verb) = match access {
            Access::Write => (handle.writable(), "writing"),
            _ => (handle.readable(), "reading"),
        };
        if !allowed {
            return Err(FsError::InvalidParam(format!(
                "fd {fd} is not open for {verb}"
            )));
        }
        let index = handle.inode_number;
        let session = self.session;
        let inode = self.volume_mut()?.read_inode(index)?;
        if !check_permission(&session, &inode, access) {
            return Err(FsError::PermissionDenied(format!(
                "{verb} inode {index} as {session}"
            )));
        }
        Ok(inode)
    }

    /// read up to `max` bytes from the cursor, an empty buffer means end of file
    pub fn read(&mut self, fd: Fd, max: usize) -> FsResult<Vec<u8>> {
        info!("read() called with fd: {fd}, max: {max}");
        let mut inode = self.inode_for(fd, Access::Read)?;
        let position = self.handles.get(fd)?.position;
        let len = inode.file_size.saturating_sub(position).min(max as u64) as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| FsError::OutOfMemory(format!("{len} byte read buffer: {e}")))?;

        let volume = self.volume_mut()?;
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        let mut offset = position;
        while data.len() < len {
            let index = (offset / BLOCK_SIZE_U64) as usize;
            let in_block = (offset % BLOCK_SIZE_U64) as usize;
            let block = inode.block_at(index).ok_or_else(|| {
                FsError::Corrupted(format!(
                    "inode {} has no block for offset {offset}",
                    inode.inode_number
                ))
            })?;
            volume.read_block(block, &mut buf)?;
            let chunk = (BLOCK_SIZE as usize - in_block).min(len - data.len());
            data.extend_from_slice(&buf[in_block..in_block + chunk]);
            offset += chunk as u64;
        }
        inode.update_accessed_at();
        volume.write_inode(&mut inode)?;
        self.handles.get_mut(fd)?.position = offset;
        Ok(data)
    }

    /// write `data` at the cursor, or at end of file for an append handle
    /// # Return
    /// the bytes written, fewer than `data.len()` when the volume fills up
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> FsResult<usize> {
        info!("write() called with fd: {fd}, {} bytes", data.len());
        let mut inode = self.inode_for(fd, Access::Write)?;
        if data.is_empty() {
            return Ok(0);
        }
        let handle = self.handles.get(fd)?;
        let start = if handle.flags.contains(OpenFlag::Append) {
            inode.file_size
        } else {
            handle.position
        };
        let end = start
            .checked_add(data.len() as u64)
            .ok_or_else(|| FsError::InvalidParam("write end overflows".into()))?;
        check_file_size(end)?;

        let volume = self.volume_mut()?;
        let mut written = 0usize;
        let result = (|| -> FsResult<()> {
            // no holes: everything between the old end and the cursor is zero filled
            for index in blocks_for(inode.file_size)..(start / BLOCK_SIZE_U64) as usize {
                block_for_write(volume, &mut inode, index)?;
            }
            let mut buf = vec![0u8; BLOCK_SIZE as usize];
            while written < data.len() {
                let offset = start + written as u64;
                let index = (offset / BLOCK_SIZE_U64) as usize;
                let in_block = (offset % BLOCK_SIZE_U64) as usize;
                let chunk = (BLOCK_SIZE as usize - in_block).min(data.len() - written);
                let block = block_for_write(volume, &mut inode, index)?;
                if chunk < BLOCK_SIZE as usize {
                    volume.read_block(block, &mut buf)?;
                }
                buf[in_block..in_block + chunk].copy_from_slice(&data[written..written + chunk]);
                volume.write_block(block, &buf)?;
                written += chunk;
            }
            Ok(())
        })();

        // commit whatever made it to disk
        let reached = start + written as u64;
        if reached > inode.file_size {
            inode.file_size = reached;
        }
        if written > 0 {
            inode.update_modified_at();
        }
        volume.write_inode(&mut inode)?;
        volume.persist_metadata()?;
        self.handles.get_mut(fd)?.position = reached;

        match result {
            Ok(()) => Ok(written),
            Err(FsError::NoSpace(reason)) if written > 0 => {
                warn!("short write on fd {fd}: {written} of {} bytes, {reason}", data.len());
                Ok(written)
            }
            Err(e) => Err(e),
        }
    }

    /// move the cursor, positions past end of file are allowed
    pub fn seek(&mut self, fd: Fd, pos: SeekFrom) -> FsResult<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(n) => (0, n as i128),
            SeekFrom::End(n) => (self.size(fd)?, n as i128),
            SeekFrom::Current(n) => (self.handles.get(fd)?.position, n as i128),
        };
        let target = u64::try_from(base as i128 + offset).map_err(|_| {
            FsError::InvalidParam(format!("seek to {pos:?} from {base} is out of range"))
        })?;
        self.handles.get_mut(fd)?.position = target;
        Ok(target)
    }

    pub fn tell(&self, fd: Fd) -> FsResult<u64> {
        Ok(self.handles.get(fd)?.position)
    }

    /// current size of the file behind `fd`
    pub fn size(&mut self, fd: Fd) -> FsResult<u64> {
        let index = self.handles.get(fd)?.inode_number;
        Ok(self.volume_mut()?.read_inode(index)?.file_size)
    }

    /// cut or extend the file behind `fd` to `len` bytes
    pub fn truncate(&mut self, fd: Fd, len: u64) -> FsResult<()> {
        info!("truncate() called with fd: {fd}, len: {len}");
        let mut inode = self.inode_for(fd, Access::Write)?;
        let volume = self.volume_mut()?;
        let resized = resize(volume, &mut inode, len);
        if resized.is_ok() {
            inode.update_modified_at();
        }
        // blocks allocated before a failure stay attached to the inode
        volume.write_inode(&mut inode)?;
        volume.persist_metadata()?;
        resized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{filesystem::tests::formatted, filesystem::tests::remount, DIRECT_POINTERS};

    fn write_new(fs: &mut FileSystem, path: &str, data: &[u8]) -> FsResult<()> {
        fs.create(path)?;
        let fd = fs.open(path)?;
        assert_eq!(fs.write(fd, data)?, data.len());
        fs.close(fd)
    }

    fn read_all(fs: &mut FileSystem, path: &str) -> FsResult<Vec<u8>> {
        let fd = fs.open_with(path, OpenFlag::Read.into())?;
        let data = fs.read(fd, usize::MAX)?;
        fs.close(fd)?;
        Ok(data)
    }

    #[test]
    fn test_hello_round_trip() -> FsResult<()> {
        let (_dir, path, mut fs) = formatted(64);
        write_new(&mut fs, "/hello.txt", b"Hello, File System!")?;
        assert_eq!(read_all(&mut fs, "/hello.txt")?, b"Hello, File System!");
        remount(&mut fs, &path);
        assert_eq!(read_all(&mut fs, "hello.txt")?, b"Hello, File System!");
        Ok(())
    }

    #[test]
    fn test_exact_block_round_trip() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        let data: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
        write_new(&mut fs, "/block", &data)?;
        let inode = fs.stat("/block")?;
        assert_eq!(inode.file_size, 1024);
        assert_eq!(inode.block_count, 1);
        assert_eq!(read_all(&mut fs, "/block")?, data);
        Ok(())
    }

    #[test]
    fn test_two_block_round_trip() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        let data: Vec<u8> = (0..1500).map(|i| b'A' + (i % 26) as u8).collect();
        write_new(&mut fs, "/alphabet", &data)?;
        assert_eq!(fs.stat("/alphabet")?.block_count, 2);

        let fd = fs.open("/alphabet")?;
        // reads walk across the block boundary in small steps
        let mut collected = Vec::new();
        loop {
            let chunk = fs.read(fd, 100)?;
            if chunk.is_empty() {
                break;
            }
            collected.extend(chunk);
        }
        assert_eq!(collected, data);
        assert_eq!(fs.tell(fd)?, 1500);
        assert!(fs.read(fd, 10)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_overwrite_in_the_middle() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        write_new(&mut fs, "/f", &[b'a'; 2048])?;
        let fd = fs.open("/f")?;
        fs.seek(fd, SeekFrom::Start(1020))?;
        assert_eq!(fs.write(fd, b"XXXXXXXX")?, 8);
        assert_eq!(fs.tell(fd)?, 1028);
        assert_eq!(fs.size(fd)?, 2048);
        fs.seek(fd, SeekFrom::Start(1016))?;
        assert_eq!(fs.read(fd, 16)?, b"aaaaXXXXXXXXaaaa");
        Ok(())
    }

    #[test]
    fn test_permission_644_for_non_owner() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        fs.create_user("alice", "alice-pw", 0, 0)?;
        fs.create_user("mallory", "m-pw", 0, 2000)?;
        fs.login("alice", "alice-pw")?;
        write_new(&mut fs, "/notes", b"owned by alice")?;

        fs.login("mallory", "m-pw")?;
        let fd = fs.open("/notes")?;
        assert_eq!(fs.read(fd, 100)?, b"owned by alice");
        assert!(matches!(
            fs.write(fd, b"defaced"),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(matches!(
            fs.truncate(fd, 0),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(matches!(
            fs.open_with("/notes", OpenFlag::Read | OpenFlag::Truncate),
            Err(FsError::PermissionDenied(_))
        ));
        fs.close(fd)?;

        // the owner and root can do both
        for (user, password) in [("alice", "alice-pw"), ("root", "root123")] {
            fs.login(user, password)?;
            let fd = fs.open("/notes")?;
            fs.seek(fd, SeekFrom::End(0))?;
            assert_eq!(fs.write(fd, b"!")?, 1);
            fs.seek(fd, SeekFrom::Start(0))?;
            assert!(!fs.read(fd, 100)?.is_empty());
            fs.close(fd)?;
        }
        assert_eq!(read_all(&mut fs, "/notes")?, b"owned by alice!!");
        Ok(())
    }

    #[test]
    fn test_group_class_access() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        fs.create_user("alice", "pw", 0, 500)?;
        fs.create_user("bob", "pw", 0, 500)?;
        fs.create_user("eve", "pw", 0, 600)?;
        fs.login("alice", "pw")?;
        write_new(&mut fs, "/shared", b"team")?;
        fs.chmod("/shared", 0o660)?;

        fs.login("bob", "pw")?;
        let fd = fs.open("/shared")?;
        fs.seek(fd, SeekFrom::End(0))?;
        assert_eq!(fs.write(fd, b"work")?, 4);
        fs.close(fd)?;

        fs.login("eve", "pw")?;
        assert!(matches!(
            fs.open("/shared"),
            Err(FsError::PermissionDenied(_))
        ));
        Ok(())
    }

    #[test]
    fn test_anonymous_is_other() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        write_new(&mut fs, "/public", b"hi")?;
        fs.chmod("/public", 0o640)?;
        fs.logout()?;
        assert!(matches!(
            fs.open("/public"),
            Err(FsError::PermissionDenied(_))
        ));
        Ok(())
    }

    #[test]
    fn test_open_refusals() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        assert!(matches!(fs.open("/"), Err(FsError::IsADirectory(_))));
        assert!(matches!(fs.open("/missing"), Err(FsError::NotFound(_))));
        fs.create("/f")?;
        assert!(matches!(
            fs.open_with("/f", OpenFlag::Append.into()),
            Err(FsError::InvalidParam(_))
        ));
        Ok(())
    }

    #[test]
    fn test_too_many_open() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        fs.create("/f")?;
        let fds = (0..crate::fs::MAX_OPEN_FILES)
            .map(|_| fs.open("/f"))
            .collect::<FsResult<Vec<_>>>()?;
        assert!(matches!(fs.open("/f"), Err(FsError::TooManyOpen(_))));
        fs.close(fds[10])?;
        assert_eq!(fs.open("/f")?, fds[10]);
        Ok(())
    }

    #[test]
    fn test_close_twice_changes_nothing() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        fs.create("/f")?;
        let fd = fs.open("/f")?;
        let other = fs.open("/f")?;
        fs.close(fd)?;
        assert!(matches!(fs.close(fd), Err(FsError::InvalidParam(_))));
        assert!(matches!(fs.close(999), Err(FsError::InvalidParam(_))));
        assert_eq!(fs.open_handles().len(), 1);
        assert_eq!(fs.open_handles()[0].0, other);
        Ok(())
    }

    #[test]
    fn test_dup_keeps_handle_alive() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        write_new(&mut fs, "/f", b"abc")?;
        let fd = fs.open("/f")?;
        assert_eq!(fs.dup(fd)?, 2);
        fs.close(fd)?;
        assert_eq!(fs.read(fd, 3)?, b"abc");
        fs.close(fd)?;
        assert!(matches!(fs.read(fd, 3), Err(FsError::InvalidParam(_))));
        Ok(())
    }

    #[test]
    fn test_seek_rules() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        write_new(&mut fs, "/f", &[1u8; 100])?;
        let fd = fs.open("/f")?;
        assert_eq!(fs.seek(fd, SeekFrom::End(-10))?, 90);
        assert_eq!(fs.seek(fd, SeekFrom::Current(-90))?, 0);
        assert!(matches!(
            fs.seek(fd, SeekFrom::Current(-1)),
            Err(FsError::InvalidParam(_))
        ));
        assert_eq!(fs.tell(fd)?, 0);
        // past the end reads see end of file
        assert_eq!(fs.seek(fd, SeekFrom::Start(5000))?, 5000);
        assert!(fs.read(fd, 10)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_sparse_seek_fills_with_zeros() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        fs.create("/sparse")?;
        let fd = fs.open("/sparse")?;
        fs.seek(fd, SeekFrom::Start(3000))?;
        assert_eq!(fs.write(fd, b"end")?, 3);
        assert_eq!(fs.size(fd)?, 3003);
        assert_eq!(fs.stat("/sparse")?.block_count, 3);

        fs.seek(fd, SeekFrom::Start(0))?;
        let data = fs.read(fd, 4000)?;
        assert_eq!(data.len(), 3003);
        assert!(data[..3000].iter().all(|b| *b == 0));
        assert_eq!(&data[3000..], b"end");
        Ok(())
    }

    #[test]
    fn test_direct_pointer_limit() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        fs.create("/big")?;
        let fd = fs.open("/big")?;
        let full = vec![9u8; MAX_FILE_SIZE as usize];
        assert_eq!(fs.write(fd, &full)?, full.len());
        assert_eq!(fs.stat("/big")?.block_count, DIRECT_POINTERS as u32);

        let free = fs.statfs()?.free_blocks;
        assert!(matches!(fs.write(fd, b"x"), Err(FsError::Unsupported(_))));
        fs.seek(fd, SeekFrom::Start(100))?;
        assert!(matches!(
            fs.write(fd, &full),
            Err(FsError::Unsupported(_))
        ));
        assert_eq!(fs.statfs()?.free_blocks, free);
        assert_eq!(fs.size(fd)?, MAX_FILE_SIZE);
        Ok(())
    }

    #[test]
    fn test_short_write_when_volume_fills() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        // leave exactly two free data blocks
        let mut spare = Vec::new();
        while fs.statfs()?.free_blocks > 2 {
            spare.push(fs.volume_mut()?.allocate_data_block()?);
        }
        fs.create("/tight")?;
        let fd = fs.open("/tight")?;
        let data = vec![5u8; 3 * 1024];
        assert_eq!(fs.write(fd, &data)?, 2048);
        assert_eq!(fs.size(fd)?, 2048);
        assert_eq!(fs.statfs()?.free_blocks, 0);
        assert!(matches!(fs.write(fd, b"more"), Err(FsError::NoSpace(_))));
        assert_eq!(fs.size(fd)?, 2048);
        Ok(())
    }

    #[test]
    fn test_empty_write() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        fs.create("/f")?;
        let fd = fs.open("/f")?;
        assert_eq!(fs.write(fd, b"")?, 0);
        assert_eq!(fs.size(fd)?, 0);
        Ok(())
    }

    #[test]
    fn test_append_and_truncate_flags() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        write_new(&mut fs, "/log", b"one\n")?;
        let fd = fs.open_with("/log", OpenFlag::Write | OpenFlag::Append)?;
        fs.seek(fd, SeekFrom::Start(0))?;
        fs.write(fd, b"two\n")?;
        assert!(matches!(fs.read(fd, 10), Err(FsError::InvalidParam(_))));
        fs.close(fd)?;
        assert_eq!(read_all(&mut fs, "/log")?, b"one\ntwo\n");

        let free = fs.statfs()?.free_blocks;
        let fd = fs.open_with("/log", OpenFlag::Read | OpenFlag::Write | OpenFlag::Truncate)?;
        assert_eq!(fs.size(fd)?, 0);
        assert_eq!(fs.statfs()?.free_blocks, free + 1);
        assert_eq!(fs.write(fd, b"x")?, 1);
        Ok(())
    }

    #[test]
    fn test_truncate_shrink_and_grow() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        write_new(&mut fs, "/t", &[0xaau8; 2500])?;
        let fd = fs.open("/t")?;
        let free = fs.statfs()?.free_blocks;

        fs.truncate(fd, 1000)?;
        assert_eq!(fs.size(fd)?, 1000);
        assert_eq!(fs.stat("/t")?.block_count, 1);
        assert_eq!(fs.statfs()?.free_blocks, free + 2);

        // growing again exposes zeros, not the old bytes
        fs.truncate(fd, 2048)?;
        assert_eq!(fs.stat("/t")?.block_count, 2);
        fs.seek(fd, SeekFrom::Start(990))?;
        let data = fs.read(fd, 100)?;
        assert_eq!(&data[..10], &[0xaa; 10]);
        assert!(data[10..].iter().all(|b| *b == 0));

        assert!(matches!(
            fs.truncate(fd, MAX_FILE_SIZE + 1),
            Err(FsError::Unsupported(_))
        ));
        fs.truncate(fd, 0)?;
        assert_eq!(fs.stat("/t")?.block_count, 0);
        Ok(())
    }

    #[test]
    fn test_access_time_moves_on_read() -> FsResult<()> {
        let (_dir, _path, mut fs) = formatted(64);
        write_new(&mut fs, "/f", b"abc")?;
        let before = fs.stat("/f")?.accessed_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        read_all(&mut fs, "/f")?;
        let after = fs.stat("/f")?.accessed_at;
        assert!((after.sec, after.nsec) > (before.sec, before.nsec));
        Ok(())
    }
}
