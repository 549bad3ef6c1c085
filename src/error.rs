//! filesystem level errors
use thiserror::Error;

use crate::device::DeviceError;

pub type FsResult<T> = Result<T, FsError>;

/// Everything a filesystem operation can fail with.
///
/// Device failures never leak out directly, they are wrapped in [FsError::Io].
#[derive(Debug, Error)]
pub enum FsError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("out of memory: {0}")]
    OutOfMemory(String),
    #[error("no space left: {0}")]
    NoSpace(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("too many open files (limit is {0})")]
    TooManyOpen(usize),
    #[error("device I/O failed: {0}")]
    Io(#[from] DeviceError),
    #[error("corrupted structure: {0}")]
    Corrupted(String),
    #[error("no volume is mounted")]
    NotMounted,
    #[error("a volume is already mounted")]
    AlreadyMounted,
    #[error("file is busy: {0}")]
    Busy(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("wrong password for user {0}")]
    WrongPassword(String),
    #[error("no user is logged in")]
    NotLoggedIn,
}

impl FsError {
    /// the closest `errno` for callers speaking the POSIX dialect
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::InvalidParam(_) => libc::EINVAL,
            FsError::OutOfMemory(_) => libc::ENOMEM,
            FsError::NoSpace(_) => libc::ENOSPC,
            FsError::NotFound(_) | FsError::UserNotFound(_) => libc::ENOENT,
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::PermissionDenied(_) | FsError::WrongPassword(_) => libc::EACCES,
            FsError::TooManyOpen(_) => libc::EMFILE,
            FsError::Io(_) | FsError::Corrupted(_) => libc::EIO,
            FsError::NotMounted => libc::ENODEV,
            FsError::AlreadyMounted | FsError::Busy(_) => libc::EBUSY,
            FsError::Unsupported(_) => libc::EFBIG,
            FsError::NotLoggedIn => libc::EPERM,
        }
    }
}

impl From<bincode::error::EncodeError> for FsError {
    fn from(e: bincode::error::EncodeError) -> Self {
        FsError::Corrupted(format!("encode failed: {e}"))
    }
}

impl From<bincode::error::DecodeError> for FsError {
    fn from(e: bincode::error::DecodeError) -> Self {
        FsError::Corrupted(format!("decode failed: {e}"))
    }
}
