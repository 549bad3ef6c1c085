//! helpers shared by every on-disk structure
pub mod digest;
pub mod fs_size_calculator;
pub mod time_util;
pub mod traits;
