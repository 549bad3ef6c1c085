use std::{
    collections::HashSet,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    ops::Range,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Instant,
};

use log::{debug, info, warn};
use memmap2::MmapMut;
use once_cell::sync::Lazy;

use super::{DeviceError, DeviceResult, DiskStats, VolumeHeader, BLOCK_SIZE, HEADER_SIZE};

const BLOCK_SIZE_USIZE: usize = BLOCK_SIZE as usize;

/// canonical paths of every volume file currently open in this process
static OPEN_VOLUMES: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(Default::default);

/// keeps a path registered in [OPEN_VOLUMES] for as long as it lives
#[derive(Debug)]
struct VolumeClaim(PathBuf);

impl VolumeClaim {
    fn acquire(path: PathBuf) -> DeviceResult<Self> {
        let mut open = OPEN_VOLUMES.lock().unwrap_or_else(|e| e.into_inner());
        if !open.insert(path.clone()) {
            return Err(DeviceError::AlreadyInitialized(path));
        }
        Ok(VolumeClaim(path))
    }
}

impl Drop for VolumeClaim {
    fn drop(&mut self) {
        let mut open = OPEN_VOLUMES.lock().unwrap_or_else(|e| e.into_inner());
        open.remove(&self.0);
    }
}

#[derive(Debug)]
struct Backing {
    mmap: MmapMut,
    header: VolumeHeader,
    // declared last so the mapping is gone before the path is released
    _file: File,
    _claim: VolumeClaim,
}

/// A host file seen as `total_blocks` blocks of [BLOCK_SIZE] bytes.
///
/// The file starts with a [VolumeHeader] region, block `n` lives at
/// `HEADER_SIZE + n * BLOCK_SIZE`.
#[derive(Debug)]
pub struct BlockStore {
    path: PathBuf,
    backing: Option<Backing>,
    total_blocks: u32,
    dirty: bool,
    stats: DiskStats,
}

impl BlockStore {
    /// open the volume at `path`, creating it with `size` bytes of blocks if absent
    ///
    /// `size` must be a positive multiple of [BLOCK_SIZE] when a file is created,
    /// an existing volume keeps the size recorded in its header.
    pub fn open<P>(path: P, size: u64) -> DeviceResult<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let existed = path.exists();
        let file = if existed {
            OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|source| DeviceError::Open {
                    path: path.to_path_buf(),
                    source,
                })?
        } else {
            Self::check_new_size(size)?;
            OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|source| DeviceError::Create {
                    path: path.to_path_buf(),
                    source,
                })?
        };
        let attached = Self::attach(path, file, existed, size);
        if attached.is_err() && !existed {
            // a half written volume would later read as corrupted
            if let Err(e) = std::fs::remove_file(path) {
                warn!("failed to remove the unfinished volume {path:?}: {e}");
            }
        }
        attached
    }

    /// claim, validate or create the header of, and map an opened file
    fn attach(path: &Path, mut file: File, existed: bool, size: u64) -> DeviceResult<Self> {
        let canonical = path.canonicalize().map_err(|source| DeviceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let claim = VolumeClaim::acquire(canonical)?;

        let header = if existed {
            let header = Self::load_header(&mut file)?;
            if size != 0 && size != header.byte_size {
                warn!(
                    "{path:?} already holds {} bytes of blocks, requested size {size} ignored",
                    header.byte_size
                );
            }
            header
        } else {
            Self::create_header(&mut file, (size / BLOCK_SIZE as u64) as u32)?
        };

        // Safety
        // the file stays open and claimed for as long as the mapping lives,
        // nothing else in this process maps it
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(DeviceError::Io)?;
        info!(
            "{} volume {path:?}: {} blocks of {BLOCK_SIZE} bytes",
            if existed { "opened" } else { "created" },
            header.total_blocks
        );
        let total_blocks = header.total_blocks;
        let mut store = BlockStore {
            path: path.to_path_buf(),
            backing: Some(Backing {
                mmap,
                header,
                _file: file,
                _claim: claim,
            }),
            total_blocks,
            dirty: false,
            stats: DiskStats::default(),
        };
        store.stats.touch();
        Ok(store)
    }

    fn check_new_size(size: u64) -> DeviceResult<()> {
        if size == 0 || size % BLOCK_SIZE as u64 != 0 {
            return Err(DeviceError::InvalidParam(format!(
                "disk size {size} must be a positive multiple of {BLOCK_SIZE}"
            )));
        }
        if size / BLOCK_SIZE as u64 > u32::MAX as u64 {
            return Err(DeviceError::InvalidParam(format!(
                "disk size {size} exceeds the addressable block count"
            )));
        }
        Ok(())
    }

    fn create_header(file: &mut File, total_blocks: u32) -> DeviceResult<VolumeHeader> {
        let header = VolumeHeader::new(total_blocks);
        // extending the file zero-fills every block
        file.set_len(header.file_len())
            .map_err(|e| DeviceError::classify(e, DeviceError::Write))?;
        file.seek(SeekFrom::Start(0)).map_err(DeviceError::Seek)?;
        file.write_all(&header.encode()?)
            .map_err(|e| DeviceError::classify(e, DeviceError::Write))?;
        Ok(header)
    }

    fn load_header(file: &mut File) -> DeviceResult<VolumeHeader> {
        let file_len = file.metadata().map_err(DeviceError::Io)?.len();
        if file_len < HEADER_SIZE {
            return Err(DeviceError::Corrupted(format!(
                "file is {file_len} bytes, shorter than the header"
            )));
        }
        let mut buf = vec![0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0)).map_err(DeviceError::Seek)?;
        file.read_exact(&mut buf).map_err(DeviceError::Read)?;
        let mut header = VolumeHeader::decode(&buf)?;
        header.validate()?;
        if file_len < header.file_len() {
            return Err(DeviceError::Corrupted(format!(
                "file is {file_len} bytes, header expects {}",
                header.file_len()
            )));
        }
        header.touch();
        file.seek(SeekFrom::Start(0)).map_err(DeviceError::Seek)?;
        file.write_all(&header.encode()?)
            .map_err(|e| DeviceError::classify(e, DeviceError::Write))?;
        Ok(header)
    }
}

/// single block primitives
impl BlockStore {
    fn backing(&self) -> DeviceResult<&Backing> {
        self.backing.as_ref().ok_or(DeviceError::NotInitialized)
    }

    fn backing_mut(&mut self) -> DeviceResult<&mut Backing> {
        self.backing.as_mut().ok_or(DeviceError::NotInitialized)
    }

    /// byte range of block `n` inside the mapping
    fn block_range(&self, n: u32, buf_len: usize) -> DeviceResult<Range<usize>> {
        self.backing()?;
        if !self.is_valid_block(n) {
            return Err(DeviceError::BlockRange {
                block: n as u64,
                total: self.total_blocks,
            });
        }
        if buf_len != BLOCK_SIZE_USIZE {
            return Err(DeviceError::InvalidParam(format!(
                "buffer of {buf_len} bytes, a block is {BLOCK_SIZE}"
            )));
        }
        let start = HEADER_SIZE as usize + n as usize * BLOCK_SIZE_USIZE;
        Ok(start..start + BLOCK_SIZE_USIZE)
    }

    /// read block `n` into `buf`, which must be exactly one block long
    pub fn read_block(&mut self, n: u32, buf: &mut [u8]) -> DeviceResult<()> {
        let started = Instant::now();
        let result = self
            .block_range(n, buf.len())
            .and_then(|range| {
                buf.copy_from_slice(&self.backing()?.mmap[range]);
                Ok(())
            });
        match result {
            Ok(()) => self.stats.record_read(BLOCK_SIZE as u64, started.elapsed()),
            Err(ref e) => {
                debug!("read of block {n} failed: {e}");
                self.stats.record_read_error();
            }
        }
        result
    }

    /// write exactly one block of `data` to block `n`
    pub fn write_block(&mut self, n: u32, data: &[u8]) -> DeviceResult<()> {
        let started = Instant::now();
        let result = self.block_range(n, data.len()).and_then(|range| {
            self.backing_mut()?.mmap[range].copy_from_slice(data);
            Ok(())
        });
        match result {
            Ok(()) => {
                self.dirty = true;
                self.stats.record_write(BLOCK_SIZE as u64, started.elapsed());
            }
            Err(ref e) => {
                debug!("write of block {n} failed: {e}");
                self.stats.record_write_error();
            }
        }
        result
    }

    /// flush every pending write to the host file
    pub fn sync(&mut self) -> DeviceResult<()> {
        self.backing()?
            .mmap
            .flush()
            .map_err(|e| DeviceError::classify(e, DeviceError::Io))?;
        self.dirty = false;
        self.stats.touch();
        debug!("synced {:?}", self.path);
        Ok(())
    }

    /// sync if dirty and release the file, any later call fails with
    /// [DeviceError::NotInitialized]
    pub fn close(&mut self) -> DeviceResult<()> {
        self.backing()?;
        if self.dirty {
            self.sync()?;
        }
        self.backing = None;
        info!("closed volume {:?}", self.path);
        Ok(())
    }
}

/// helpers built on the single block primitives
impl BlockStore {
    /// read `buf.len() / BLOCK_SIZE` consecutive blocks starting at `start`
    pub fn read_blocks(&mut self, start: u32, buf: &mut [u8]) -> DeviceResult<()> {
        if buf.is_empty() || buf.len() % BLOCK_SIZE_USIZE != 0 {
            return Err(DeviceError::InvalidParam(format!(
                "buffer of {} bytes is not a whole number of blocks",
                buf.len()
            )));
        }
        self.check_span(start, buf.len() / BLOCK_SIZE_USIZE)?;
        for (i, chunk) in buf.chunks_exact_mut(BLOCK_SIZE_USIZE).enumerate() {
            self.read_block(start + i as u32, chunk)?;
        }
        Ok(())
    }

    /// write `data.len() / BLOCK_SIZE` consecutive blocks starting at `start`
    pub fn write_blocks(&mut self, start: u32, data: &[u8]) -> DeviceResult<()> {
        if data.is_empty() || data.len() % BLOCK_SIZE_USIZE != 0 {
            return Err(DeviceError::InvalidParam(format!(
                "buffer of {} bytes is not a whole number of blocks",
                data.len()
            )));
        }
        // nothing is written unless every block of the span exists
        self.check_span(start, data.len() / BLOCK_SIZE_USIZE)?;
        for (i, chunk) in data.chunks_exact(BLOCK_SIZE_USIZE).enumerate() {
            self.write_block(start + i as u32, chunk)?;
        }
        Ok(())
    }

    /// `count` blocks from `start` all lie on the disk
    fn check_span(&self, start: u32, count: usize) -> DeviceResult<()> {
        self.backing()?;
        let end = start as u64 + count as u64;
        if end > self.total_blocks as u64 {
            return Err(DeviceError::BlockRange {
                block: end - 1,
                total: self.total_blocks,
            });
        }
        Ok(())
    }

    pub fn zero_block(&mut self, n: u32) -> DeviceResult<()> {
        self.write_block(n, &[0u8; BLOCK_SIZE_USIZE])
    }

    pub fn copy_block(&mut self, src: u32, dst: u32) -> DeviceResult<()> {
        let mut buf = [0u8; BLOCK_SIZE_USIZE];
        self.read_block(src, &mut buf)?;
        self.write_block(dst, &buf)
    }

    /// fill the whole disk with `pattern`
    pub fn fill(&mut self, pattern: u8) -> DeviceResult<()> {
        let block = [pattern; BLOCK_SIZE_USIZE];
        for n in 0..self.total_blocks {
            self.write_block(n, &block)?;
        }
        info!("filled {} blocks with {pattern:#04x}", self.total_blocks);
        Ok(())
    }
}

/// information about the disk
impl BlockStore {
    pub fn is_valid_block(&self, n: u32) -> bool {
        self.backing.is_some() && n < self.total_blocks
    }

    pub fn is_open(&self) -> bool {
        self.backing.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(total_blocks, block_size, byte_size)`
    pub fn info(&self) -> DeviceResult<(u32, u32, u64)> {
        let header = &self.backing()?.header;
        Ok((header.total_blocks, header.block_size, header.byte_size))
    }

    pub fn header(&self) -> DeviceResult<&VolumeHeader> {
        Ok(&self.backing()?.header)
    }

    pub fn stats(&self) -> &DiskStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DiskStats::default();
    }
}

impl Drop for BlockStore {
    fn drop(&mut self) {
        if self.backing.is_some() && self.dirty {
            if let Err(e) = self.sync() {
                warn!("failed to sync {:?} while dropping it: {e}", self.path);
            }
        }
    }
}
