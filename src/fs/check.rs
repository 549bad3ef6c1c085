//! fsck style consistency walk
use std::collections::HashMap;

use log::{info, warn};

use crate::error::FsResult;

use super::{DirectoryIndex, FileSystem, ROOT_INODE};

/// what [FileSystem::check] found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub inodes_checked: u32,
    pub blocks_referenced: u32,
    pub entries_checked: u32,
    /// one line per inconsistency
    pub problems: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    fn problem(&mut self, message: String) {
        warn!("check: {message}");
        self.problems.push(message);
    }
}

impl FileSystem {
    /// walk the superblock, bitmaps, directory, inodes and handles and
    /// report every disagreement between them
    pub fn check(&mut self) -> FsResult<CheckReport> {
        info!("check() called");
        let root = self.root;
        let open: Vec<u32> = self.handles.iter().map(|(_, h)| h.inode_number).collect();
        let volume = self.volume_mut()?;
        let mut report = CheckReport::default();

        let sb = volume.superblock();
        if sb.free_inodes != volume.inode_bitmap().count_clear() {
            report.problem(format!(
                "superblock counts {} free inodes, the bitmap {}",
                sb.free_inodes,
                volume.inode_bitmap().count_clear()
            ));
        }
        if sb.free_blocks != volume.data_bitmap().count_clear() {
            report.problem(format!(
                "superblock counts {} free blocks, the bitmap {}",
                sb.free_blocks,
                volume.data_bitmap().count_clear()
            ));
        }

        // inode -> where it was reached from
        let mut reachable = vec![(ROOT_INODE, "/".to_string())];
        match volume.read_inode(ROOT_INODE) {
            Ok(inode) if inode.is_dir() => {}
            Ok(_) => report.problem("root inode is not a directory".into()),
            Err(e) => report.problem(format!("root inode unreadable: {e}")),
        }
        for entry in root.entries(volume)? {
            report.entries_checked += 1;
            let name = entry.name();
            if name == "." || name == ".." {
                if entry.inode_number != ROOT_INODE {
                    report.problem(format!("{name:?} points at inode {}", entry.inode_number));
                }
                continue;
            }
            match volume.read_inode(entry.inode_number) {
                Ok(inode) if inode.file_kind != entry.kind() => report.problem(format!(
                    "{name:?} is cached as {} but inode {} is {}",
                    entry.kind(),
                    entry.inode_number,
                    inode.file_kind
                )),
                Ok(_) => reachable.push((entry.inode_number, name)),
                Err(e) => report.problem(format!(
                    "{name:?} points at inode {}: {e}",
                    entry.inode_number
                )),
            }
        }

        let layout = *volume.layout();
        let mut owners: HashMap<u32, u32> = HashMap::new();
        for (index, name) in &reachable {
            let Ok(inode) = volume.read_inode(*index) else {
                continue;
            };
            report.inodes_checked += 1;
            for block in inode.direct_blocks() {
                match layout.data_bit(block) {
                    Some(bit) if bit != 0 && volume.data_bitmap().is_set(bit) => {}
                    _ => report.problem(format!(
                        "{name:?} uses block {block} which is not allocated"
                    )),
                }
                if let Some(other) = owners.insert(block, *index) {
                    report.problem(format!(
                        "block {block} is used by inodes {other} and {index}"
                    ));
                }
            }
        }
        report.blocks_referenced = owners.len() as u32;

        for n in 1..layout.total_inodes {
            if volume.inode_bitmap().is_set(n) && !reachable.iter().any(|(i, _)| *i == n) {
                report.problem(format!("inode {n} is allocated but unreachable"));
            }
        }
        for bit in 1..layout.data_blocks {
            let block = layout.data_block(bit);
            if volume.data_bitmap().is_set(bit) && !owners.contains_key(&block) {
                report.problem(format!("block {block} is allocated but unused"));
            }
        }
        for index in open {
            if !volume.inode_bitmap().is_set(index) {
                report.problem(format!("an open handle refers to free inode {index}"));
            }
        }

        volume.superblock_mut().update_last_check_at();
        volume.persist_metadata()?;
        info!(
            "check finished: {} inodes, {} blocks, {} problem(s)",
            report.inodes_checked,
            report.blocks_referenced,
            report.problems.len()
        );
        Ok(report)
    }
}
