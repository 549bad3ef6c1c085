use std::fmt;

use serde::{Deserialize, Serialize};

/// an enum to describe the type of a file
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// an regular file
    RegularFile,
    /// a directory
    Directory,
    /// a symbolic link, declared for the on-disk format only
    SymbolicLink,
    /// Unknown
    #[default]
    Unknown,
}

/// the cached type byte stored in directory entries
impl From<FileKind> for u8 {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::Unknown => 0,
            FileKind::RegularFile => 1,
            FileKind::Directory => 2,
            FileKind::SymbolicLink => 7,
        }
    }
}

impl From<u8> for FileKind {
    fn from(value: u8) -> Self {
        match value {
            1 => FileKind::RegularFile,
            2 => FileKind::Directory,
            7 => FileKind::SymbolicLink,
            _ => FileKind::Unknown,
        }
    }
}

/// the first column of `ls -l`
impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            FileKind::RegularFile => '-',
            FileKind::Directory => 'd',
            FileKind::SymbolicLink => 'l',
            FileKind::Unknown => '?',
        };
        write!(f, "{c}")
    }
}
