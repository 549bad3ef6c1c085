use std::{io, path::PathBuf};

use thiserror::Error;

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("failed to open disk file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create disk file {path:?}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read from disk file")]
    Read(#[source] io::Error),
    #[error("failed to write to disk file")]
    Write(#[source] io::Error),
    #[error("failed to seek in disk file")]
    Seek(#[source] io::Error),
    #[error("block {block} out of range, disk has {total} blocks")]
    BlockRange { block: u64, total: u32 },
    #[error("disk is not initialized")]
    NotInitialized,
    #[error("disk {0:?} is already open")]
    AlreadyInitialized(PathBuf),
    #[error("host storage is full")]
    DiskFull(#[source] io::Error),
    #[error("general I/O error")]
    Io(#[source] io::Error),
    #[error("disk data corrupted: {0}")]
    Corrupted(String),
}

impl DeviceError {
    /// route `ENOSPC` to [DeviceError::DiskFull], everything else to `otherwise`
    pub(crate) fn classify(err: io::Error, otherwise: fn(io::Error) -> DeviceError) -> Self {
        if err.raw_os_error() == Some(libc::ENOSPC) {
            DeviceError::DiskFull(err)
        } else {
            otherwise(err)
        }
    }
}
