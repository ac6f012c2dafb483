//! Git repository reader for twig.
//!
//! Reads commits, trees, blobs and refs out of a git directory that lives
//! inside a [`FileSystem`](twig_vfs::FileSystem) rather than on disk. This is
//! the repository-reader capability the diff engine consumes through the
//! [`RepositoryReader`] trait.
//!
//! # Supported layout
//!
//! - Loose objects (`objects/xx/…`, zlib)
//! - Pack files with version 2 indexes, including `OFS_DELTA` and
//!   `REF_DELTA` entries
//! - Loose refs, `packed-refs`, and symbolic refs
//! - Non-bare (`<dir>/.git`) and bare (`<dir>` itself) repositories
//!
//! Only the SHA-1 object format is supported.
//!
//! # Modules
//!
//! - [`traits`] -- [`RepositoryReader`] and the per-load [`RepoContext`]
//! - [`reader`] -- [`GitReader`], the git implementation
//! - [`cache`] -- [`ReaderCache`], memoized objects and pack indexes
//! - [`object`] -- Commit/tree/tag parsing and encoding
//! - [`pack`] -- Pack index and pack entry decoding
//! - [`writer`] -- [`RepoWriter`] and [`PackBuilder`] for producing repositories

pub mod cache;
pub mod delta;
pub mod error;
pub mod loose;
pub mod object;
pub mod pack;
pub mod reader;
pub mod refs;
pub mod traits;
pub mod writer;

pub use cache::{CacheStats, ReaderCache};
pub use error::{ReaderError, ReaderResult};
pub use object::{Commit, EntryKind, ObjectKind, RawObject, Tag, Tree, TreeEntry};
pub use reader::GitReader;
pub use traits::{RepoContext, RepositoryReader};
pub use writer::{PackBuilder, RepoWriter};
