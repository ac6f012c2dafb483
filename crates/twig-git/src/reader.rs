use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use twig_types::ObjectId;
use twig_vfs::path::join;
use twig_vfs::FileSystem;

use crate::error::{ReaderError, ReaderResult};
use crate::loose;
use crate::object::{Commit, ObjectKind, RawObject, Tag, Tree};
use crate::pack::{PackFile, PackIndex};
use crate::refs::RefStore;
use crate::traits::{RepoContext, RepositoryReader};

/// Default name of the git directory inside a working tree.
pub const DEFAULT_GIT_DIR: &str = ".git";

/// Tags pointing at tags pointing at ... give up after this many hops.
const MAX_PEEL_DEPTH: usize = 16;

/// [`RepositoryReader`] for git repositories stored in a [`FileSystem`].
///
/// The reader holds no per-repository state; everything loaded is kept in
/// the [`ReaderCache`](crate::ReaderCache) carried by each [`RepoContext`].
#[derive(Clone, Debug)]
pub struct GitReader {
    git_dir: String,
}

impl GitReader {
    pub fn new() -> Self {
        Self::with_git_dir(DEFAULT_GIT_DIR)
    }

    /// Use a git directory name other than `.git`.
    pub fn with_git_dir(git_dir: impl Into<String>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    /// Find the git directory for `dir`.
    ///
    /// Tries `<dir>/<git_dir>` (a directory, or a `gitdir:` pointer file),
    /// then `<dir>` itself as a bare repository.
    pub fn locate(&self, fs: &dyn FileSystem, dir: &str) -> ReaderResult<String> {
        let nested = join(dir, &self.git_dir);
        let found = match fs.stat(&nested) {
            Ok(meta) if meta.is_dir() => Some(nested),
            Ok(_) => Some(follow_gitdir_file(fs, dir, &nested)?),
            Err(_) if is_git_dir(fs, dir) => Some(join(dir, "")),
            Err(_) => None,
        };
        let git_dir = found
            .filter(|candidate| is_git_dir(fs, candidate))
            .ok_or_else(|| ReaderError::NotARepository(dir.to_string()))?;
        check_object_format(fs, &git_dir)?;
        Ok(git_dir)
    }

    /// Read any object by id, consulting the cache, loose objects, then packs.
    pub fn read_object(&self, ctx: &RepoContext<'_>, id: &ObjectId) -> ReaderResult<RawObject> {
        if let Some(object) = ctx.cache.get(id) {
            debug!(id = %id.short_hex(), "cache hit");
            return Ok(object);
        }
        let git_dir = self.locate(ctx.fs, ctx.dir)?;
        let objects_dir = join(&git_dir, "objects");
        let object = self.read_uncached(ctx, &objects_dir, id)?;
        ctx.cache.insert(*id, object.clone());
        Ok(object)
    }

    fn read_uncached(
        &self,
        ctx: &RepoContext<'_>,
        objects_dir: &str,
        id: &ObjectId,
    ) -> ReaderResult<RawObject> {
        match ctx.fs.read(&loose::object_path(objects_dir, id)) {
            Ok(compressed) => {
                let inflated = loose::inflate(&compressed)
                    .map_err(|e| ReaderError::corrupt(*id, format!("inflate failed: {e}")))?;
                let object = loose::parse(id, &inflated)?;
                if object.id() != *id {
                    return Err(ReaderError::corrupt(*id, "content does not match its id"));
                }
                return Ok(object);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let packs = self.packs(ctx, objects_dir);
        for pack in packs.iter() {
            if let Some(object) = pack.read_object(id, |base| self.read_object(ctx, base))? {
                debug!(id = %id.short_hex(), pack = pack.path(), "read packed object");
                return Ok(object);
            }
        }
        Err(ReaderError::ObjectNotFound(*id))
    }

    /// Packs under `objects_dir/pack`, loaded once per cache.
    fn packs(&self, ctx: &RepoContext<'_>, objects_dir: &str) -> Arc<Vec<PackFile>> {
        if let Some(packs) = ctx.cache.packs(objects_dir) {
            return packs;
        }
        let pack_dir = join(objects_dir, "pack");
        let mut packs = Vec::new();
        for name in ctx.fs.list(&pack_dir) {
            let Some(stem) = name.strip_suffix(".idx") else {
                continue;
            };
            let idx_path = join(&pack_dir, &name);
            let pack_path = join(&pack_dir, &format!("{stem}.pack"));
            match load_pack(ctx.fs, &idx_path, &pack_path) {
                Ok(pack) => packs.push(pack),
                Err(e) => warn!(pack = %pack_path, error = %e, "skipping unreadable pack"),
            }
        }
        debug!(dir = objects_dir, count = packs.len(), "loaded packs");
        ctx.cache.store_packs(objects_dir, packs)
    }

    /// Follow annotated tags until a non-tag object is reached.
    fn peel(&self, ctx: &RepoContext<'_>, id: &ObjectId) -> ReaderResult<(ObjectId, RawObject)> {
        let mut current = *id;
        for _ in 0..MAX_PEEL_DEPTH {
            let object = self.read_object(ctx, &current)?;
            if object.kind != ObjectKind::Tag {
                return Ok((current, object));
            }
            current = Tag::parse(&current, &object.data)?.object;
        }
        Err(ReaderError::corrupt(*id, "tag chain too deep"))
    }
}

impl Default for GitReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryReader for GitReader {
    fn list_branches(&self, ctx: &RepoContext<'_>) -> ReaderResult<Vec<String>> {
        let git_dir = self.locate(ctx.fs, ctx.dir)?;
        Ok(RefStore::open(ctx.fs, &git_dir)?.branches())
    }

    fn resolve_ref(&self, ctx: &RepoContext<'_>, reference: &str) -> ReaderResult<ObjectId> {
        let git_dir = self.locate(ctx.fs, ctx.dir)?;
        RefStore::open(ctx.fs, &git_dir)?.resolve(reference)
    }

    fn read_commit(&self, ctx: &RepoContext<'_>, id: &ObjectId) -> ReaderResult<Commit> {
        let (peeled, object) = self.peel(ctx, id)?;
        object.expect_kind(&peeled, ObjectKind::Commit)?;
        Commit::parse(&peeled, &object.data)
    }

    fn read_tree(&self, ctx: &RepoContext<'_>, id: &ObjectId) -> ReaderResult<Tree> {
        let (mut peeled, mut object) = self.peel(ctx, id)?;
        if object.kind == ObjectKind::Commit {
            peeled = Commit::parse(&peeled, &object.data)?.tree;
            object = self.read_object(ctx, &peeled)?;
        }
        object.expect_kind(&peeled, ObjectKind::Tree)?;
        Tree::parse(&peeled, &object.data)
    }

    fn read_blob(&self, ctx: &RepoContext<'_>, id: &ObjectId) -> ReaderResult<Bytes> {
        let object = self.read_object(ctx, id)?;
        object.expect_kind(id, ObjectKind::Blob)?;
        Ok(object.data)
    }
}

fn is_git_dir(fs: &dyn FileSystem, dir: &str) -> bool {
    let has_head = fs.stat(&join(dir, "HEAD")).is_ok_and(|m| m.is_file());
    let has_objects = fs.stat(&join(dir, "objects")).is_ok_and(|m| m.is_dir());
    has_head && has_objects
}

/// Resolve a `.git` file of the form `gitdir: <path>` (worktrees, submodules).
fn follow_gitdir_file(fs: &dyn FileSystem, dir: &str, file: &str) -> ReaderResult<String> {
    let content = fs.read_to_string(file)?;
    let target = content
        .trim()
        .strip_prefix("gitdir:")
        .map(str::trim)
        .ok_or_else(|| ReaderError::NotARepository(dir.to_string()))?;
    Ok(if target.starts_with('/') {
        join(target, "")
    } else {
        join(dir, target)
    })
}

/// Reject repositories whose config selects an object format other than SHA-1.
fn check_object_format(fs: &dyn FileSystem, git_dir: &str) -> ReaderResult<()> {
    let Ok(config) = fs.read_to_string(&join(git_dir, "config")) else {
        return Ok(());
    };
    for line in config.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("objectformat") {
            let format = value.trim().to_ascii_lowercase();
            if format != "sha1" {
                return Err(ReaderError::Unsupported(format!("object format {format}")));
            }
        }
    }
    Ok(())
}

fn load_pack(fs: &dyn FileSystem, idx_path: &str, pack_path: &str) -> ReaderResult<PackFile> {
    let index = PackIndex::parse(idx_path, &fs.read(idx_path)?)?;
    PackFile::open(pack_path, fs.read(pack_path)?, index)
}
