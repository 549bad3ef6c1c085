//! what each subcommand does once its arguments and passwords are known
use std::path::Path;

use anyhow::Context;
use log::info;

use crate::{
    device::BlockStore,
    error::FsError,
    fs::{FileSystem, OpenFlag},
};

/// someone to act as instead of root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// mount the volume at `image`, logged in as `credentials` if given
pub fn mount<P: AsRef<Path>>(
    image: P,
    credentials: Option<&Credentials>,
) -> anyhow::Result<FileSystem> {
    let image = image.as_ref();
    let store =
        BlockStore::open(image, 0).with_context(|| format!("failed to open volume {image:?}"))?;
    let mut fs = FileSystem::new();
    fs.mount(store)
        .with_context(|| format!("failed to mount {image:?}"))?;
    if let Some(Credentials { username, password }) = credentials {
        fs.login(username, password)
            .with_context(|| format!("failed to log in as {username}"))?;
    }
    Ok(fs)
}

/// unmount and flush, reporting the first error
fn finish(mut fs: FileSystem) -> anyhow::Result<()> {
    let mut store = fs.unmount().context("failed to unmount")?;
    store.close().context("failed to close the volume")?;
    Ok(())
}

pub fn status<P: AsRef<Path>>(image: P) -> anyhow::Result<String> {
    let fs = mount(image, None)?;
    let report = fs.status()?.to_string();
    finish(fs)?;
    Ok(report)
}

pub fn ls<P: AsRef<Path>>(image: P) -> anyhow::Result<Vec<String>> {
    let mut fs = mount(image, None)?;
    let lines = fs.list_long()?;
    finish(fs)?;
    Ok(lines)
}

/// store `data` as `name`, replacing an existing file of that name
/// # Return
/// the bytes written
pub fn put<P: AsRef<Path>>(
    image: P,
    name: &str,
    data: &[u8],
    credentials: Option<&Credentials>,
) -> anyhow::Result<usize> {
    let mut fs = mount(image, credentials)?;
    let fd = match fs.create(name) {
        Ok(_) => fs.open_with(name, OpenFlag::read_write())?,
        Err(FsError::AlreadyExists(_)) => {
            fs.open_with(name, OpenFlag::Read | OpenFlag::Write | OpenFlag::Truncate)?
        }
        Err(e) => return Err(e).with_context(|| format!("failed to create {name:?}")),
    };
    let mut written = 0;
    while written < data.len() {
        match fs.write(fd, &data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) => {
                fs.close(fd)?;
                finish(fs)?;
                return Err(e).with_context(|| format!("failed to write {name:?}"));
            }
        }
    }
    fs.close(fd)?;
    finish(fs)?;
    info!("stored {written} bytes as {name:?}");
    Ok(written)
}

/// the whole contents of `name`
pub fn cat<P: AsRef<Path>>(
    image: P,
    name: &str,
    credentials: Option<&Credentials>,
) -> anyhow::Result<Vec<u8>> {
    let mut fs = mount(image, credentials)?;
    let fd = fs
        .open_with(name, OpenFlag::Read.into())
        .with_context(|| format!("failed to open {name:?}"))?;
    let data = fs.read(fd, usize::MAX)?;
    fs.close(fd)?;
    finish(fs)?;
    Ok(data)
}

/// change the password of `username`, `old_password` is ignored when acting as root
pub fn passwd<P: AsRef<Path>>(
    image: P,
    username: &str,
    old_password: &str,
    new_password: &str,
    credentials: Option<&Credentials>,
) -> anyhow::Result<()> {
    let mut fs = mount(image, credentials)?;
    let changed = fs
        .change_password(username, old_password, new_password)
        .with_context(|| format!("failed to change the password of {username}"));
    finish(fs)?;
    changed
}
