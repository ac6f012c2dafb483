//! In-memory filesystem backed by sorted maps.
//!
//! [`MemoryFs`] stores file content in a `BTreeMap` keyed by normalized
//! path. Because keys sharing a prefix are contiguous in a sorted map,
//! directory listings and "has any descendant" checks are range scans
//! rather than full scans.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{VfsError, VfsResult};
use crate::path::{ancestors, child_prefix, normalize};
use crate::traits::{EntryKind, FileSystem, Metadata};

#[derive(Clone, Debug)]
struct FileRecord {
    data: Bytes,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

#[derive(Debug)]
struct FsState {
    files: BTreeMap<String, FileRecord>,
    /// Known directories and when they were first recorded.
    dirs: BTreeMap<String, DateTime<Utc>>,
}

impl FsState {
    fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert("/".to_string(), Utc::now());
        Self {
            files: BTreeMap::new(),
            dirs,
        }
    }

    /// Record `dir` and all of its ancestors. Existing records keep their
    /// original timestamp.
    fn record_dir(&mut self, dir: &str) {
        let now = Utc::now();
        self.dirs.entry(dir.to_string()).or_insert(now);
        for ancestor in ancestors(dir) {
            self.dirs.entry(ancestor.to_string()).or_insert(now);
        }
    }

    fn record_parents(&mut self, path: &str) {
        if let Some(parent) = crate::path::parent(path) {
            self.record_dir(parent);
        }
    }

    /// Returns `false` without storing anything when `path` is the root,
    /// which is always a directory.
    fn store(&mut self, path: &str, data: Bytes) -> bool {
        if path == "/" {
            debug!("refusing to store a file at the root");
            return false;
        }
        self.record_parents(path);
        let now = Utc::now();
        match self.files.get_mut(path) {
            Some(record) => {
                record.data = data;
                record.modified = now;
            }
            None => {
                self.files.insert(
                    path.to_string(),
                    FileRecord {
                        data,
                        created: now,
                        modified: now,
                    },
                );
            }
        }
        true
    }

    fn has_descendants(&self, dir: &str) -> bool {
        let prefix = child_prefix(dir);
        let starts = |key: &String| key.starts_with(&prefix) && key.len() > prefix.len();
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| starts(k))
            || self
                .dirs
                .range(prefix.clone()..)
                .find(|(k, _)| k.as_str() != dir)
                .is_some_and(|(k, _)| starts(k))
    }

    fn children(&self, dir: &str) -> BTreeSet<String> {
        let prefix = child_prefix(dir);
        let mut names = BTreeSet::new();
        let mut add = |key: &str| {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if let Some(name) = rest.split('/').next().filter(|n| !n.is_empty()) {
                    names.insert(name.to_string());
                }
            }
        };
        for key in self
            .files
            .range(prefix.clone()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(&prefix))
        {
            add(key.as_str());
        }
        for key in self
            .dirs
            .range(prefix.clone()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(&prefix))
        {
            add(key.as_str());
        }
        names
    }
}

/// In-memory, `BTreeMap`-based filesystem.
///
/// All state lives behind a `RwLock` so the [`FileSystem`] methods can take
/// `&self`; `stat` needs to write when it infers a directory. Data is lost
/// when the filesystem is dropped or [`clear`](Self::clear)ed.
pub struct MemoryFs {
    state: RwLock<FsState>,
}

impl MemoryFs {
    /// Create an empty filesystem containing only the root directory.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FsState::new()),
        }
    }

    /// Drop every file and directory, leaving only the root.
    pub fn clear(&self) {
        *self.write_state() = FsState::new();
    }

    /// Store `data` at `path`, creating parent directories.
    ///
    /// Returns `false` if `path` normalizes to the root; nothing is written.
    pub fn store(&self, path: &str, data: Bytes) -> bool {
        let path = normalize(path);
        self.write_state().store(&path, data)
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.read_state().files.len()
    }

    /// Returns `true` if no files are stored.
    pub fn is_empty(&self) -> bool {
        self.read_state().files.is_empty()
    }

    /// Total bytes across all stored files.
    pub fn total_bytes(&self) -> u64 {
        self.read_state()
            .files
            .values()
            .map(|f| f.data.len() as u64)
            .sum()
    }

    /// Every stored file path, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        self.read_state().files.keys().cloned().collect()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, FsState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, FsState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFs {
    fn read(&self, path: &str) -> VfsResult<Bytes> {
        let path = normalize(path);
        self.read_state()
            .files
            .get(&path)
            .map(|f| f.data.clone())
            .ok_or(VfsError::NotFound { path })
    }

    fn write(&self, path: &str, data: Bytes) -> VfsResult<()> {
        self.store(path, data);
        Ok(())
    }

    fn list(&self, path: &str) -> Vec<String> {
        let path = normalize(path);
        self.read_state().children(&path).into_iter().collect()
    }

    fn stat(&self, path: &str) -> VfsResult<Metadata> {
        let path = normalize(path);
        {
            let state = self.read_state();
            if let Some(file) = state.files.get(&path) {
                return Ok(Metadata {
                    kind: EntryKind::File,
                    size: file.data.len() as u64,
                    created: file.created,
                    modified: file.modified,
                });
            }
            if let Some(&recorded) = state.dirs.get(&path) {
                return Ok(dir_metadata(recorded));
            }
            if !state.has_descendants(&path) {
                return Err(VfsError::NotFound { path });
            }
        }

        // Implied by a descendant: remember it so `list` on the parent agrees.
        debug!(path = %path, "recording implied directory");
        let mut state = self.write_state();
        state.record_dir(&path);
        let recorded = state.dirs.get(&path).copied().unwrap_or_else(Utc::now);
        Ok(dir_metadata(recorded))
    }

    fn mkdir(&self, path: &str) {
        let path = normalize(path);
        self.write_state().record_dir(&path);
    }

    fn remove_file(&self, path: &str) {
        let path = normalize(path);
        self.write_state().files.remove(&path);
    }

    fn rename(&self, from: &str, to: &str) {
        let from = normalize(from);
        let to = normalize(to);
        if to == "/" {
            return;
        }
        let mut state = self.write_state();
        if let Some(record) = state.files.remove(&from) {
            state.store(&to, record.data);
        }
    }
}

fn dir_metadata(recorded: DateTime<Utc>) -> Metadata {
    Metadata {
        kind: EntryKind::Directory,
        size: 0,
        created: recorded,
        modified: recorded,
    }
}

impl std::fmt::Debug for MemoryFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("MemoryFs")
            .field("file_count", &state.files.len())
            .field("dir_count", &state.dirs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fs_with(paths: &[(&str, &str)]) -> MemoryFs {
        let fs = MemoryFs::new();
        for (path, content) in paths {
            fs.write(path, Bytes::copy_from_slice(content.as_bytes()))
                .unwrap();
        }
        fs
    }

    // -----------------------------------------------------------------------
    // read / write
    // -----------------------------------------------------------------------

    #[test]
    fn write_then_read() {
        let fs = fs_with(&[("/a/b.txt", "hello")]);
        assert_eq!(fs.read("/a/b.txt").unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(fs.read_to_string("/a/b.txt").unwrap(), "hello");
    }

    #[test]
    fn read_normalizes_path() {
        let fs = fs_with(&[("a//b.txt", "x")]);
        assert!(fs.read("/a/b.txt").is_ok());
        assert!(fs.read("a/./b.txt").is_ok());
        assert!(fs.read("/a/b.txt/").is_ok());
    }

    #[test]
    fn read_missing_is_not_found() {
        let fs = MemoryFs::new();
        let err = fs.read("/nope").unwrap_err();
        assert_eq!(err.code(), "ENOENT");
        assert_eq!(err.path(), "/nope");
    }

    #[test]
    fn read_empty_path_is_not_found() {
        let fs = fs_with(&[("/a.txt", "x")]);
        assert!(fs.read("").unwrap_err().is_not_found());
    }

    #[test]
    fn read_directory_is_not_found() {
        let fs = fs_with(&[("/a/b.txt", "x")]);
        assert!(fs.read("/a").unwrap_err().is_not_found());
    }

    #[test]
    fn rewrite_replaces_content() {
        let fs = fs_with(&[("/f", "one")]);
        fs.write("/f", Bytes::from_static(b"two")).unwrap();
        assert_eq!(fs.read_to_string("/f").unwrap(), "two");
        assert_eq!(fs.file_count(), 1);
    }

    #[test]
    fn rewrite_keeps_created_timestamp() {
        let fs = fs_with(&[("/f", "one")]);
        let before = fs.stat("/f").unwrap();
        fs.write("/f", Bytes::from_static(b"one")).unwrap();
        let after = fs.stat("/f").unwrap();
        assert_eq!(before.created, after.created);
        assert!(after.modified >= before.modified);
        assert_eq!(after.size, 3);
    }

    #[test]
    fn read_to_string_is_lossy() {
        let fs = MemoryFs::new();
        fs.write("/bin", Bytes::from_static(&[0x66, 0xff, 0x00])).unwrap();
        let text = fs.read_to_string("/bin").unwrap();
        assert!(text.starts_with('f'));
        assert!(text.contains('\u{fffd}'));
        assert!(text.contains('\0'));
    }

    // -----------------------------------------------------------------------
    // list
    // -----------------------------------------------------------------------

    #[test]
    fn list_direct_children_only() {
        let fs = fs_with(&[("/a/b.txt", "1"), ("/a/c.txt", "2")]);
        assert_eq!(fs.list("/"), vec!["a"]);
        assert_eq!(fs.list("/a"), vec!["b.txt", "c.txt"]);
    }

    #[test]
    fn list_includes_nested_dirs_once() {
        let fs = fs_with(&[("/a/x/1", "1"), ("/a/x/2", "2"), ("/a/y", "3")]);
        assert_eq!(fs.list("/a"), vec!["x", "y"]);
    }

    #[test]
    fn list_does_not_match_sibling_prefix() {
        let fs = fs_with(&[("/ab/c", "1"), ("/a/d", "2")]);
        assert_eq!(fs.list("/a"), vec!["d"]);
    }

    #[test]
    fn list_missing_is_empty() {
        let fs = MemoryFs::new();
        assert!(fs.list("/missing").is_empty());
        assert!(fs.list("").is_empty());
    }

    #[test]
    fn list_sees_empty_mkdir() {
        let fs = MemoryFs::new();
        fs.mkdir("/refs/tags");
        assert_eq!(fs.list("/"), vec!["refs"]);
        assert_eq!(fs.list("/refs"), vec!["tags"]);
        assert!(fs.list("/refs/tags").is_empty());
    }

    #[test]
    fn list_tracks_writes_without_staleness() {
        let fs = fs_with(&[("/d/a", "1")]);
        assert_eq!(fs.list("/d"), vec!["a"]);
        fs.write("/d/b", Bytes::from_static(b"2")).unwrap();
        assert_eq!(fs.list("/d"), vec!["a", "b"]);
        fs.remove_file("/d/a");
        assert_eq!(fs.list("/d"), vec!["b"]);
    }

    // -----------------------------------------------------------------------
    // stat
    // -----------------------------------------------------------------------

    #[test]
    fn stat_file() {
        let fs = fs_with(&[("/a/b.txt", "hello")]);
        let meta = fs.stat("/a/b.txt").unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.size, 5);
    }

    #[test]
    fn stat_directory() {
        let fs = fs_with(&[("/a/b/c.txt", "x")]);
        for dir in ["/", "/a", "/a/b"] {
            let meta = fs.stat(dir).unwrap();
            assert!(meta.is_dir(), "{dir} should be a directory");
            assert_eq!(meta.size, 0);
        }
    }

    #[test]
    fn stat_missing_is_not_found() {
        let fs = fs_with(&[("/a/b.txt", "x")]);
        assert!(fs.stat("/a/c").unwrap_err().is_not_found());
        assert!(fs.stat("/a/b.txt/x").unwrap_err().is_not_found());
    }

    #[test]
    fn stat_infers_and_records_directory() {
        // Remove the recorded ancestors so only the file implies them.
        let fs = fs_with(&[("/x/y/z.txt", "1")]);
        {
            let mut state = fs.write_state();
            state.dirs.remove("/x");
            state.dirs.remove("/x/y");
        }
        assert!(fs.list("/").contains(&"x".to_string()));
        assert!(fs.stat("/x/y").unwrap().is_dir());
        assert!(fs.read_state().dirs.contains_key("/x/y"));
        assert!(fs.read_state().dirs.contains_key("/x"));
    }

    #[test]
    fn root_always_exists() {
        let fs = MemoryFs::new();
        assert!(fs.stat("/").unwrap().is_dir());
        fs.clear();
        assert!(fs.stat("/").unwrap().is_dir());
    }

    #[test]
    fn root_cannot_become_a_file() {
        let fs = MemoryFs::new();
        fs.write("/a.txt", Bytes::from_static(b"x")).unwrap();
        fs.write("/", Bytes::from_static(b"root")).unwrap();
        assert!(!fs.store("//", Bytes::from_static(b"root")));
        fs.rename("/a.txt", "/");

        assert!(fs.stat("/").unwrap().is_dir());
        assert_eq!(fs.list("/"), vec!["a.txt"]);
        assert_eq!(fs.read("/a.txt").unwrap(), Bytes::from_static(b"x"));
        assert_eq!(fs.file_paths(), vec!["/a.txt"]);
    }

    // -----------------------------------------------------------------------
    // mkdir / remove / rename / links
    // -----------------------------------------------------------------------

    #[test]
    fn mkdir_is_idempotent() {
        let fs = MemoryFs::new();
        fs.mkdir("/objects/pack");
        let first = fs.stat("/objects/pack").unwrap();
        fs.mkdir("/objects/pack");
        let second = fs.stat("/objects/pack").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs.list("/objects"), vec!["pack"]);
    }

    #[test]
    fn removed_file_leaves_directory() {
        let fs = fs_with(&[("/a/b.txt", "x")]);
        fs.remove_file("/a/b.txt");
        assert!(fs.read("/a/b.txt").is_err());
        assert!(fs.stat("/a").unwrap().is_dir());
        fs.remove_file("/never-existed");
    }

    #[test]
    fn rename_moves_content() {
        let fs = fs_with(&[("/refs/heads/main.lock", "abc")]);
        fs.rename("/refs/heads/main.lock", "/refs/heads/main");
        assert!(fs.read("/refs/heads/main.lock").is_err());
        assert_eq!(fs.read_to_string("/refs/heads/main").unwrap(), "abc");
    }

    #[test]
    fn rename_into_new_directory_records_it() {
        let fs = fs_with(&[("/a", "abc")]);
        fs.rename("/a", "/deep/dir/b");
        assert_eq!(fs.list("/deep"), vec!["dir"]);
    }

    #[test]
    fn rename_missing_is_noop() {
        let fs = fs_with(&[("/b", "keep")]);
        fs.rename("/a", "/b");
        assert_eq!(fs.read_to_string("/b").unwrap(), "keep");
    }

    #[test]
    fn links_and_permissions() {
        let fs = fs_with(&[("/a", "x")]);
        assert!(fs.symlink("/a", "/link").is_ok());
        assert!(fs.readlink("/link").unwrap_err().is_not_found());
        assert!(fs.chmod("/a", 0o755).is_ok());
        assert!(fs.read("/link").is_err());
    }

    #[test]
    fn clear_drops_everything() {
        let fs = fs_with(&[("/a/b", "1"), ("/c", "2")]);
        fs.mkdir("/d");
        fs.clear();
        assert!(fs.is_empty());
        assert!(fs.list("/").is_empty());
        assert!(fs.read("/c").is_err());
    }

    #[test]
    fn accounting() {
        let fs = fs_with(&[("/a", "12"), ("/b/c", "345")]);
        assert_eq!(fs.file_count(), 2);
        assert_eq!(fs.total_bytes(), 5);
        assert_eq!(fs.file_paths(), vec!["/a", "/b/c"]);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9_.-]{1,6}".prop_filter("dot segments", |s| s != "." && s != "..")
    }

    fn rel_path() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(segment(), 1..5)
    }

    proptest! {
        #[test]
        fn write_read_roundtrip(segs in rel_path(), data in prop::collection::vec(any::<u8>(), 0..64)) {
            let fs = MemoryFs::new();
            let path = format!("/{}", segs.join("/"));
            fs.write(&path, Bytes::from(data.clone())).unwrap();
            prop_assert_eq!(fs.read(&path).unwrap().to_vec(), data);
        }

        #[test]
        fn ancestors_are_discoverable(segs in rel_path()) {
            let fs = MemoryFs::new();
            let path = format!("/{}", segs.join("/"));
            fs.write(&path, Bytes::from_static(b"x")).unwrap();
            for depth in 0..segs.len() {
                let parent = if depth == 0 {
                    "/".to_string()
                } else {
                    format!("/{}", segs[..depth].join("/"))
                };
                let listing = fs.list(&parent);
                prop_assert!(listing.contains(&segs[depth]));
                prop_assert!(fs.stat(&parent).unwrap().is_dir());
            }
        }
    }
}
