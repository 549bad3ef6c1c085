use log::{info, warn};

use crate::{
    device::BlockStore,
    error::{FsError, FsResult},
    user::{Session, UserTable},
};

use super::{FlatDirectory, HandleTable, SuperBlock, Volume, DEFAULT_INODE_COUNT, ROOT_INODE};

/// knobs for [FileSystem::format]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub total_inodes: u32,
    pub root_password: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            total_inodes: DEFAULT_INODE_COUNT,
            root_password: "root123".into(),
        }
    }
}

/// Everything one mounted volume needs: the volume itself, its directory,
/// the open handles, the user table and whoever is logged in.
///
/// Contexts are independent, several can live in one process as long as
/// each one sits on its own volume file.
#[derive(Debug)]
pub struct FileSystem {
    pub(super) volume: Option<Volume>,
    pub(super) root: FlatDirectory,
    pub(super) handles: HandleTable,
    pub(super) users: UserTable,
    pub(super) session: Session,
}

impl Default for FileSystem {
    fn default() -> Self {
        FileSystem {
            volume: None,
            root: FlatDirectory::new(ROOT_INODE),
            handles: HandleTable::new(),
            users: UserTable::default(),
            session: Session::ANONYMOUS,
        }
    }
}

/// attaching and detaching volumes
impl FileSystem {
    /// an unmounted context
    pub fn new() -> Self {
        Self::default()
    }

    /// format `store` and mount the result, logged in as root
    pub fn format(&mut self, store: BlockStore, options: &FormatOptions) -> FsResult<()> {
        info!(
            "format() called on {:?} with {} inodes",
            store.path(),
            options.total_inodes
        );
        if self.volume.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        let mut volume = Volume::format(store, options.total_inodes)?;
        let mut users = UserTable::with_defaults(&options.root_password);
        users.persist(volume.store_mut())?;
        volume.sync()?;
        self.attach(volume, users);
        Ok(())
    }

    /// mount a formatted volume, logged in as root
    pub fn mount(&mut self, store: BlockStore) -> FsResult<()> {
        info!("mount() called on {:?}", store.path());
        if self.volume.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        let mut volume = Volume::mount(store)?;
        let users = UserTable::load(volume.store_mut())?;
        self.attach(volume, users);
        Ok(())
    }

    fn attach(&mut self, volume: Volume, users: UserTable) {
        self.volume = Some(volume);
        self.users = users;
        self.handles.clear();
        self.session = Session::ROOT;
    }

    /// close every handle, write the metadata back and hand out the block store
    pub fn unmount(&mut self) -> FsResult<BlockStore> {
        info!("unmount() called");
        let leftover = self.handles.len();
        if leftover > 0 {
            warn!("closing {leftover} handle(s) left open at unmount");
        }
        self.sync()?;
        let volume = self.volume.take().ok_or(FsError::NotMounted)?;
        self.handles.clear();
        self.users = UserTable::default();
        self.session = Session::ANONYMOUS;
        Ok(volume.into_store())
    }

    pub fn is_mounted(&self) -> bool {
        self.volume.is_some()
    }

    /// persist all metadata and flush the device
    pub fn sync(&mut self) -> FsResult<()> {
        let volume = self.volume.as_mut().ok_or(FsError::NotMounted)?;
        self.users.persist(volume.store_mut())?;
        volume.sync()
    }

    /// the superblock counters
    pub fn statfs(&self) -> FsResult<SuperBlock> {
        Ok(self.volume()?.superblock().clone())
    }

    pub fn volume(&self) -> FsResult<&Volume> {
        self.volume.as_ref().ok_or(FsError::NotMounted)
    }

    pub(crate) fn volume_mut(&mut self) -> FsResult<&mut Volume> {
        self.volume.as_mut().ok_or(FsError::NotMounted)
    }

    /// write back the superblock and bitmaps after a mutation
    pub(crate) fn persist_metadata(&mut self) -> FsResult<()> {
        self.volume_mut()?.persist_metadata()
    }

    pub(crate) fn persist_users(&mut self) -> FsResult<()> {
        let volume = self.volume.as_mut().ok_or(FsError::NotMounted)?;
        self.users.persist(volume.store_mut())
    }
}
