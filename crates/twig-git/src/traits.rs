use std::fmt;

use bytes::Bytes;
use twig_types::ObjectId;
use twig_vfs::FileSystem;

use crate::cache::ReaderCache;
use crate::error::ReaderResult;
use crate::object::{Commit, Tree};

/// Everything a reader call needs to know about the loaded repository.
///
/// A context bundles the filesystem, the directory the repository was
/// loaded into, and the cache created for that load. The same cache must
/// be passed to every call within one load and replaced on the next.
#[derive(Clone, Copy)]
pub struct RepoContext<'a> {
    pub fs: &'a dyn FileSystem,
    /// Working-tree directory (or bare repository directory) inside `fs`.
    pub dir: &'a str,
    pub cache: &'a ReaderCache,
}

impl<'a> RepoContext<'a> {
    pub fn new(fs: &'a dyn FileSystem, dir: &'a str, cache: &'a ReaderCache) -> Self {
        Self { fs, dir, cache }
    }
}

impl fmt::Debug for RepoContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoContext")
            .field("dir", &self.dir)
            .field("cache", self.cache)
            .finish_non_exhaustive()
    }
}

/// Read access to a version-controlled repository.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable; reading the same id twice yields equal values.
/// - Nothing is written through `ctx.fs`.
/// - A missing object, ref or file is an error, never an empty value.
pub trait RepositoryReader: Send + Sync {
    /// Local branch names, without the `refs/heads/` prefix.
    fn list_branches(&self, ctx: &RepoContext<'_>) -> ReaderResult<Vec<String>>;

    /// Resolve a branch, tag, ref name or object id to an object id.
    fn resolve_ref(&self, ctx: &RepoContext<'_>, reference: &str) -> ReaderResult<ObjectId>;

    /// Read a commit. Annotated tags are peeled to the commit they name.
    fn read_commit(&self, ctx: &RepoContext<'_>, id: &ObjectId) -> ReaderResult<Commit>;

    /// Read a tree. Commit and tag ids are peeled to their tree.
    fn read_tree(&self, ctx: &RepoContext<'_>, id: &ObjectId) -> ReaderResult<Tree>;

    /// Read a blob's content.
    fn read_blob(&self, ctx: &RepoContext<'_>, id: &ObjectId) -> ReaderResult<Bytes>;
}
