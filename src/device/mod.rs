//! a virtual disk: one host file seen as an array of fixed-size blocks
mod block_store;
mod error;
mod header;
mod stats;

pub use block_store::*;
pub use error::*;
pub use header::*;
pub use stats::*;

/// size of every block in bytes
pub const BLOCK_SIZE: u32 = 1024;
/// "DSK!"
pub const DISK_MAGIC: u32 = 0x4453_4B21;
pub const DISK_VERSION: u32 = 1;
/// the header occupies a block-sized region in front of block 0
pub const HEADER_SIZE: u64 = BLOCK_SIZE as u64;
