//! A simulated block device with a small Unix style filesystem on top:
//! one flat directory, fixed direct block pointers and a user table
//! gating every read and write.
pub mod cli_interface;
pub mod device;
pub mod error;
pub mod fs;
pub mod mkfs;
pub mod user;
pub mod utils;
