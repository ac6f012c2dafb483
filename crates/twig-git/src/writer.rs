//! Writing git repositories into a [`FileSystem`].
//!
//! Used to build fixtures: everything written here is a real git layout
//! that the reader (and git itself) can open.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use sha1::{Digest, Sha1};
use tracing::debug;
use twig_types::object::OID_LEN;
use twig_types::ObjectId;
use twig_vfs::path::join;
use twig_vfs::FileSystem;

use crate::delta::encode_delta;
use crate::error::ReaderResult;
use crate::loose;
use crate::object::{Commit, ObjectKind, RawObject, Tree, TreeEntry};
use crate::pack::{PackIndex, OFS_DELTA, REF_DELTA};
use crate::refs::{self, RefStore, HEADS_PREFIX};

const DEFAULT_BRANCH: &str = "main";
const IDENT: &str = "twig <twig@localhost> 0 +0000";
const CONFIG: &str = "[core]\n\trepositoryformatversion = 0\n\tfilemode = false\n";

/// Writes objects and refs into one git directory.
pub struct RepoWriter<'a> {
    fs: &'a dyn FileSystem,
    git_dir: String,
}

impl<'a> RepoWriter<'a> {
    /// Create `<dir>/.git` with `HEAD` pointing at `main`.
    pub fn init(fs: &'a dyn FileSystem, dir: &str) -> ReaderResult<Self> {
        Self::init_bare(fs, &join(dir, ".git"))
    }

    /// Create a bare repository directly in `git_dir`.
    pub fn init_bare(fs: &'a dyn FileSystem, git_dir: &str) -> ReaderResult<Self> {
        let writer = Self::open(fs, git_dir);
        for sub in ["objects/info", "objects/pack", "refs/heads", "refs/tags"] {
            fs.mkdir(&join(git_dir, sub));
        }
        writer.put("config", CONFIG.as_bytes())?;
        writer.set_head(DEFAULT_BRANCH)?;
        debug!(git_dir = %writer.git_dir, "initialized repository");
        Ok(writer)
    }

    /// Write into an existing git directory.
    pub fn open(fs: &'a dyn FileSystem, git_dir: &str) -> Self {
        Self {
            fs,
            git_dir: join(git_dir, ""),
        }
    }

    pub fn git_dir(&self) -> &str {
        &self.git_dir
    }

    fn put(&self, relative: &str, data: &[u8]) -> ReaderResult<()> {
        self.fs
            .write(&join(&self.git_dir, relative), Bytes::copy_from_slice(data))?;
        Ok(())
    }

    /// Store an object in the loose store and return its id.
    pub fn write_object(&self, object: &RawObject) -> ReaderResult<ObjectId> {
        let id = object.id();
        let path = loose::object_path(&join(&self.git_dir, "objects"), &id);
        if !self.fs.exists(&path) {
            self.fs.write(&path, Bytes::from(loose::encode(object)?))?;
        }
        Ok(id)
    }

    pub fn write_blob(&self, data: &[u8]) -> ReaderResult<ObjectId> {
        self.write_object(&RawObject::new(ObjectKind::Blob, data.to_vec()))
    }

    pub fn write_tree(&self, tree: &Tree) -> ReaderResult<ObjectId> {
        self.write_object(&tree.to_raw())
    }

    /// Write blobs and nested trees for `files` (slash-separated relative
    /// paths) and return the root tree id.
    pub fn write_tree_from_files(&self, files: &[(&str, &[u8])]) -> ReaderResult<ObjectId> {
        self.write_dir(files.to_vec())
    }

    fn write_dir(&self, files: Vec<(&str, &[u8])>) -> ReaderResult<ObjectId> {
        let mut entries = Vec::new();
        let mut subdirs: BTreeMap<&str, Vec<(&str, &[u8])>> = BTreeMap::new();
        for (path, data) in files {
            match path.split_once('/') {
                Some((dir, rest)) => subdirs.entry(dir).or_default().push((rest, data)),
                None => entries.push(TreeEntry::file(path, self.write_blob(data)?)),
            }
        }
        for (dir, children) in subdirs {
            entries.push(TreeEntry::dir(dir, self.write_dir(children)?));
        }
        self.write_tree(&Tree::new(entries))
    }

    pub fn write_commit(
        &self,
        tree: &ObjectId,
        parents: &[ObjectId],
        message: &str,
    ) -> ReaderResult<ObjectId> {
        let mut commit = Commit::new(*tree, parents.to_vec(), format!("{message}\n"));
        commit.author = Some(IDENT.to_string());
        commit.committer = Some(IDENT.to_string());
        self.write_object(&commit.to_raw())
    }

    /// Commit `files` as the complete snapshot of `branch`.
    ///
    /// The branch's current tip, if any, becomes the parent.
    pub fn commit_files(
        &self,
        branch: &str,
        files: &[(&str, &[u8])],
        message: &str,
    ) -> ReaderResult<ObjectId> {
        let tree = self.write_tree_from_files(files)?;
        let parent = RefStore::open(self.fs, &self.git_dir)?.peel(&format!("{HEADS_PREFIX}{branch}"))?;
        let parents: Vec<ObjectId> = parent.into_iter().collect();
        let commit = self.write_commit(&tree, &parents, message)?;
        self.set_branch(branch, &commit)?;
        Ok(commit)
    }

    /// Write an annotated tag object and point `refs/tags/<name>` at it.
    pub fn write_tag(
        &self,
        name: &str,
        target: &ObjectId,
        kind: ObjectKind,
        message: &str,
    ) -> ReaderResult<ObjectId> {
        let body = format!("object {target}\ntype {kind}\ntag {name}\ntagger {IDENT}\n\n{message}\n");
        let id = self.write_object(&RawObject::new(ObjectKind::Tag, body.into_bytes()))?;
        self.set_ref(&format!("refs/tags/{name}"), &id)?;
        Ok(id)
    }

    /// Point `refs/heads/<name>` at `id`.
    pub fn set_branch(&self, name: &str, id: &ObjectId) -> ReaderResult<()> {
        self.set_ref(&format!("{HEADS_PREFIX}{name}"), id)
    }

    /// Write a loose ref.
    pub fn set_ref(&self, name: &str, id: &ObjectId) -> ReaderResult<()> {
        refs::validate_ref_name(name)?;
        self.put(name, format!("{id}\n").as_bytes())
    }

    /// Make `HEAD` a symbolic ref to `refs/heads/<branch>`.
    pub fn set_head(&self, branch: &str) -> ReaderResult<()> {
        let target = format!("{HEADS_PREFIX}{branch}");
        refs::validate_ref_name(&target)?;
        self.put("HEAD", format!("ref: {target}\n").as_bytes())
    }

    /// Replace `packed-refs` with `refs` (full ref names).
    pub fn write_packed_refs(&self, entries: &BTreeMap<String, ObjectId>) -> ReaderResult<()> {
        for name in entries.keys() {
            refs::validate_ref_name(name)?;
        }
        self.put("packed-refs", refs::encode_packed_refs(entries).as_bytes())
    }

    /// Write a pack and its index under `objects/pack`. Returns the pack path.
    pub fn write_pack(&self, builder: PackBuilder) -> ReaderResult<String> {
        let (pack, idx) = builder.build();
        let checksum = hex::encode(&pack[pack.len() - OID_LEN..]);
        let stem = format!("objects/pack/pack-{checksum}");
        self.put(&format!("{stem}.idx"), &idx)?;
        self.put(&format!("{stem}.pack"), &pack)?;
        Ok(join(&self.git_dir, &format!("{stem}.pack")))
    }
}

enum Stored {
    Full,
    /// Delta against an earlier entry of this pack.
    OfsDelta(ObjectId),
    RefDelta(ObjectId),
}

struct PendingEntry {
    id: ObjectId,
    kind: ObjectKind,
    stored: Stored,
    /// Full payload, or the delta for delta entries.
    payload: Vec<u8>,
}

/// Assembles a version 2 pack and its index in memory.
#[derive(Default)]
pub struct PackBuilder {
    entries: Vec<PendingEntry>,
}

impl PackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.entries.iter().any(|e| e.id == *id)
    }

    /// Add an object stored whole.
    pub fn add(&mut self, object: &RawObject) {
        self.entries.push(PendingEntry {
            id: object.id(),
            kind: object.kind,
            stored: Stored::Full,
            payload: object.data.to_vec(),
        });
    }

    /// Add `target` as an `OFS_DELTA` against `base`.
    ///
    /// Falls back to a `REF_DELTA` when `base` has not been added yet,
    /// since offsets can only point backwards.
    pub fn add_ofs_delta(&mut self, base: &RawObject, target: &RawObject) {
        let base_id = base.id();
        let stored = if self.contains(&base_id) {
            Stored::OfsDelta(base_id)
        } else {
            Stored::RefDelta(base_id)
        };
        self.push_delta(base, target, stored);
    }

    /// Add `target` as a `REF_DELTA` against `base`, which may live elsewhere.
    pub fn add_ref_delta(&mut self, base: &RawObject, target: &RawObject) {
        self.push_delta(base, target, Stored::RefDelta(base.id()));
    }

    fn push_delta(&mut self, base: &RawObject, target: &RawObject, stored: Stored) {
        self.entries.push(PendingEntry {
            id: target.id(),
            kind: target.kind,
            stored,
            payload: encode_delta(&base.data, &target.data),
        });
    }

    /// Produce `(pack, idx)` file contents.
    pub fn build(self) -> (Vec<u8>, Vec<u8>) {
        let mut pack = Vec::new();
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        let mut offsets: HashMap<ObjectId, u64> = HashMap::new();
        let mut index_entries = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let offset = pack.len() as u64;
            let mut raw = Vec::new();
            let type_code = match entry.stored {
                Stored::Full => entry.kind.pack_type(),
                Stored::OfsDelta(_) => OFS_DELTA,
                Stored::RefDelta(_) => REF_DELTA,
            };
            encode_entry_header(&mut raw, type_code, entry.payload.len());
            match &entry.stored {
                Stored::Full => {}
                Stored::OfsDelta(base) => {
                    let base_offset = offsets.get(base).copied().unwrap_or(offset);
                    encode_ofs_distance(&mut raw, offset - base_offset);
                }
                Stored::RefDelta(base) => raw.extend_from_slice(base.as_bytes()),
            }
            // Compressing into a Vec cannot fail.
            raw.extend(loose::deflate(&entry.payload).unwrap_or_default());

            index_entries.push((entry.id, crc32fast::hash(&raw), offset));
            offsets.insert(entry.id, offset);
            pack.extend_from_slice(&raw);
        }

        let mut checksum = [0u8; OID_LEN];
        checksum.copy_from_slice(&Sha1::digest(&pack));
        pack.extend_from_slice(&checksum);
        let idx = PackIndex::build(index_entries, checksum).to_bytes();
        (pack, idx)
    }
}

pub(crate) fn encode_entry_header(out: &mut Vec<u8>, type_code: u8, size: usize) {
    let mut byte = (type_code << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    while rest != 0 {
        out.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    out.push(byte);
}

// Big-endian base-128 with an implicit +1 per continuation byte.
fn encode_ofs_distance(out: &mut Vec<u8>, mut distance: u64) {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance != 0 {
        distance -= 1;
        bytes.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes.reverse();
    out.extend_from_slice(&bytes);
}

impl std::fmt::Debug for RepoWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoWriter")
            .field("git_dir", &self.git_dir)
            .finish_non_exhaustive()
    }
}
