//! the introspection dump
use std::{fmt, path::PathBuf};

use byte_unit::Byte;

use crate::{
    device::{DiskStats, BLOCK_SIZE},
    error::FsResult,
    user::{permissions_to_string, Session},
};

use super::{Fd, FileHandle, FileSystem, SuperBlock};

/// a snapshot of one mounted filesystem
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub volume_path: PathBuf,
    pub superblock: SuperBlock,
    pub device: DiskStats,
    pub open_handles: Vec<(Fd, FileHandle)>,
    pub session: Session,
    pub username: Option<String>,
}

fn human(bytes: u64) -> String {
    Byte::from_bytes(bytes as _)
        .get_appropriate_unit(true)
        .to_string()
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sb = &self.superblock;
        let data_blocks = sb.total_blocks - sb.data_blocks_start;
        writeln!(f, "volume {}", self.volume_path.display())?;
        writeln!(
            f,
            "  blocks: {} total, {} for data, {} free ({} free)",
            sb.total_blocks,
            data_blocks,
            sb.free_blocks,
            human(sb.free_blocks as u64 * BLOCK_SIZE as u64)
        )?;
        writeln!(
            f,
            "  inodes: {} total, {} free",
            sb.total_inodes, sb.free_inodes
        )?;
        writeln!(
            f,
            "  inode table at {} ({} blocks), data at {}",
            sb.inode_table_start, sb.inode_table_blocks, sb.data_blocks_start
        )?;
        writeln!(
            f,
            "  mounted {} times, created {}, last mount {}, last write {}, last check {}",
            sb.mount_count, sb.created_at, sb.last_mount_at, sb.last_write_at, sb.last_check_at
        )?;
        writeln!(f, "device")?;
        writeln!(
            f,
            "  {} reads ({}), {} writes ({})",
            self.device.total_reads,
            human(self.device.bytes_read),
            self.device.total_writes,
            human(self.device.bytes_written)
        )?;
        writeln!(f, "  {}", self.device)?;
        writeln!(f, "open files: {}", self.open_handles.len())?;
        for (fd, handle) in &self.open_handles {
            writeln!(
                f,
                "  fd {fd}: inode {} flags {:?} pos {} refs {} uid {}",
                handle.inode_number,
                handle.flags,
                handle.position,
                handle.ref_count,
                handle.opened_by
            )?;
        }
        write!(
            f,
            "session: {} ({})",
            self.username.as_deref().unwrap_or("?"),
            self.session
        )
    }
}

impl FileSystem {
    pub fn status(&self) -> FsResult<StatusReport> {
        let volume = self.volume()?;
        Ok(StatusReport {
            volume_path: volume.store().path().to_path_buf(),
            superblock: volume.superblock().clone(),
            device: volume.store().stats().clone(),
            open_handles: self.open_handles(),
            session: self.session,
            username: self.current_user().map(|u| u.username.clone()),
        })
    }

    /// `ls -l` style lines for every directory entry
    pub fn list_long(&mut self) -> FsResult<Vec<String>> {
        let entries = self.list_dir()?;
        let volume = self.volume_mut()?;
        entries
            .iter()
            .map(|entry| {
                let inode = volume.read_inode(entry.inode_number)?;
                Ok(format!(
                    "{}{} {:>5} {:>5} {:>8} {:>4} {}",
                    inode.file_kind,
                    permissions_to_string(inode.permissions),
                    inode.owner_uid,
                    inode.owner_gid,
                    inode.file_size,
                    inode.inode_number,
                    entry.name()
                ))
            })
            .collect()
    }
}
