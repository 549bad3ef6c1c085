//! paths, creation and removal in the flat namespace
use log::{info, warn};

use crate::error::{FsError, FsResult};

use super::{
    validate_name, DirEntry, DirectoryIndex, FileKind, FileSystem, Inode, ROOT_INODE,
};

/// what a path names
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Target {
    Root,
    Entry(String),
}

/// `/name` or `name`, or `/` for the root directory
pub(super) fn parse_path(path: &str) -> FsResult<Target> {
    if path.is_empty() {
        return Err(FsError::InvalidParam("empty path".into()));
    }
    if path == "/" {
        return Ok(Target::Root);
    }
    let name = path.strip_prefix('/').unwrap_or(path);
    if name.contains('/') {
        return Err(FsError::InvalidParam(format!(
            "{path:?} has more than one level, only a flat namespace exists"
        )));
    }
    validate_name(name)?;
    Ok(Target::Entry(name.to_string()))
}

impl FileSystem {
    /// the inode number `path` names
    pub(super) fn resolve(&mut self, path: &str) -> FsResult<u32> {
        let name = match parse_path(path)? {
            Target::Root => return Ok(ROOT_INODE),
            Target::Entry(name) => name,
        };
        let root = self.root;
        root.lookup(self.volume_mut()?, &name)?
            .map(|entry| entry.inode_number)
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    /// create an empty regular file owned by the current user
    /// # Return
    /// the new inode number
    pub fn create(&mut self, path: &str) -> FsResult<u32> {
        info!("create() called with path: {path:?}");
        let name = match parse_path(path)? {
            Target::Root => return Err(FsError::AlreadyExists(path.to_string())),
            Target::Entry(name) => name,
        };
        let (root, session) = (self.root, self.session);
        let volume = self.volume_mut()?;
        if root.lookup(volume, &name)?.is_some() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        let index = volume.allocate_inode()?;
        let mut inode = Inode::new(
            index,
            FileKind::RegularFile,
            0o644,
            session.uid,
            session.gid,
        );
        let linked = DirEntry::new(&name, index, FileKind::RegularFile).and_then(|entry| {
            volume.write_inode(&mut inode)?;
            root.insert(volume, &entry)
        });
        if let Err(e) = linked {
            // give the inode back before reporting
            if let Err(undo) = volume.free_inode(index) {
                warn!("failed to release inode {index} after a failed create: {undo}");
            }
            volume.persist_metadata()?;
            return Err(e);
        }
        self.persist_metadata()?;
        Ok(index)
    }

    /// remove a regular file and release its inode and blocks
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        info!("unlink() called with path: {path:?}");
        let name = match parse_path(path)? {
            Target::Root => return Err(FsError::IsADirectory(path.to_string())),
            Target::Entry(name) if name == "." || name == ".." => {
                return Err(FsError::IsADirectory(path.to_string()))
            }
            Target::Entry(name) => name,
        };
        let (root, session) = (self.root, self.session);
        let volume = self.volume_mut()?;
        let entry = root
            .lookup(volume, &name)?
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        let inode = volume.read_inode(entry.inode_number)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        if !session.is_root() && session.uid != inode.owner_uid {
            return Err(FsError::PermissionDenied(format!(
                "{path:?} belongs to uid {}",
                inode.owner_uid
            )));
        }
        if self.handles.is_inode_open(entry.inode_number) {
            return Err(FsError::Busy(path.to_string()));
        }

        let volume = self.volume_mut()?;
        root.remove(volume, &name)?;
        for block in inode.direct_blocks() {
            volume.free_data_block(block)?;
        }
        volume.free_inode(entry.inode_number)?;
        self.persist_metadata()
    }

    pub fn stat(&mut self, path: &str) -> FsResult<Inode> {
        let index = self.resolve(path)?;
        self.volume_mut()?.read_inode(index)
    }

    /// every valid entry of the directory, "." and ".." included
    pub fn list_dir(&mut self) -> FsResult<Vec<DirEntry>> {
        let root = self.root;
        root.entries(self.volume_mut()?)
    }

    /// change the permission bits, allowed for root and the owner
    pub fn chmod(&mut self, path: &str, mode: u16) -> FsResult<()> {
        info!("chmod() called with {path:?}, {mode:o}");
        let index = self.resolve(path)?;
        let session = self.session;
        let volume = self.volume_mut()?;
        let mut inode = volume.read_inode(index)?;
        if !session.is_root() && session.uid != inode.owner_uid {
            return Err(FsError::PermissionDenied(format!(
                "only root or the owner may chmod {path:?}"
            )));
        }
        inode.permissions = mode & 0o777;
        inode.update_changed_at();
        volume.write_inode(&mut inode)
    }

    /// change the owner, allowed for root only
    pub fn chown(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        info!("chown() called with {path:?} {uid:?} {gid:?}");
        if !self.session.is_root() {
            return Err(FsError::PermissionDenied(format!(
                "only root may chown {path:?}"
            )));
        }
        let index = self.resolve(path)?;
        let volume = self.volume_mut()?;
        let mut inode = volume.read_inode(index)?;
        inode.owner_uid = uid;
        inode.owner_gid = gid;
        inode.update_changed_at();
        volume.write_inode(&mut inode)
    }
}
