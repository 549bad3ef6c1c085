//! our custom filesystem
pub mod bitmap;
pub mod directory;
pub mod filekind;
pub mod handle;
pub mod inode;
pub mod layout;
pub mod superblock;
pub mod volume;

mod check;
mod file_ops;
mod filesystem;
mod namespace;
mod status;
mod user_ops;

pub use bitmap::*;
pub use check::*;
pub use directory::*;
pub use filekind::*;
pub use filesystem::*;
pub use handle::*;
pub use inode::*;
pub use layout::*;
pub use status::*;
pub use superblock::*;
pub use volume::*;

/// "SFS!"
pub const FS_MAGIC: u32 = 0x5346_5321;
pub const FS_VERSION: u32 = 1;
pub const ROOT_INODE: u32 = 1;
/// every inode owns a slot of this many bytes in the inode table
pub const INODE_SIZE: u32 = 256;
pub const DIRECT_POINTERS: usize = 12;
/// longest file name a directory entry can embed
pub const MAX_FILENAME_LEN: usize = 55;
pub const MAX_OPEN_FILES: usize = 64;
pub const MAX_MOUNT_COUNT: u32 = 100;
pub const DEFAULT_INODE_COUNT: u32 = 1024;
/// largest file the direct pointers can address
pub const MAX_FILE_SIZE: u64 = DIRECT_POINTERS as u64 * crate::device::BLOCK_SIZE as u64;
