//! The [`FileSystem`] capability trait.
//!
//! This is the exact set of operations a repository reader needs from a
//! filesystem. It is implemented once by [`MemoryFs`](crate::MemoryFs) and
//! consumed generically (`&dyn FileSystem`) by `twig-git`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{VfsError, VfsResult};

/// Kind of filesystem entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata returned by [`FileSystem::stat`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub kind: EntryKind,
    /// Byte length for files, zero for directories.
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Directory-style access to a flat content store.
///
/// Paths may be given in any form; implementations normalize them before
/// use. Only `read`, `stat` and `readlink` can fail, and only with
/// [`VfsError::NotFound`]. Everything else is best-effort.
pub trait FileSystem: Send + Sync {
    /// Read the raw bytes stored at `path`.
    ///
    /// Fails with `NotFound` when no content is stored there, including when
    /// the path names a directory.
    fn read(&self, path: &str) -> VfsResult<Bytes>;

    /// Read `path` decoded as UTF-8 text.
    ///
    /// Invalid sequences are replaced with U+FFFD rather than failing.
    fn read_to_string(&self, path: &str) -> VfsResult<String> {
        let data = self.read(path)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Store `data` at `path`, replacing any previous content and recording
    /// every ancestor directory.
    fn write(&self, path: &str, data: Bytes) -> VfsResult<()>;

    /// Names of the direct children of `path`, sorted.
    ///
    /// A missing or empty directory yields an empty list.
    fn list(&self, path: &str) -> Vec<String>;

    /// Describe the entry at `path`.
    fn stat(&self, path: &str) -> VfsResult<Metadata>;

    /// Record `path` (and its ancestors) as a directory.
    fn mkdir(&self, path: &str);

    /// Drop the content stored at `path`, if any.
    fn remove_file(&self, path: &str);

    /// Move the content at `from` to `to`. No-op if `from` holds no content.
    fn rename(&self, from: &str, to: &str);

    /// Links are not supported; accepted and ignored.
    fn symlink(&self, _target: &str, _path: &str) -> VfsResult<()> {
        Ok(())
    }

    /// Links are not supported; there is never a link to read.
    fn readlink(&self, path: &str) -> VfsResult<String> {
        Err(VfsError::not_found(path))
    }

    /// Permissions are not modelled; accepted and ignored.
    fn chmod(&self, _path: &str, _mode: u32) -> VfsResult<()> {
        Ok(())
    }

    /// Whether anything (file or directory) exists at `path`.
    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }
}
