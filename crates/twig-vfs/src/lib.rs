//! In-memory virtual filesystem for twig.
//!
//! Uploaded repository files never touch a real disk. This crate keeps them
//! in a path-to-bytes map and presents that map through a directory-style
//! read/write/list/stat interface, which is what the repository reader in
//! `twig-git` consumes.
//!
//! # Design Rules
//!
//! 1. File content is the only authoritative state. Directory membership is
//!    derived by prefix-scanning a sorted index, never kept as a separate list.
//! 2. Recorded directories (from `mkdir`, `write`, or `stat` inference) are a
//!    cache of known containers; every ancestor of a stored path is one.
//! 3. The root `/` always exists and cannot be removed.
//! 4. All paths are normalized: leading slash, no duplicate or trailing slash.
//!
//! # Modules
//!
//! - [`traits`] -- The [`FileSystem`] capability trait
//! - [`memory`] -- [`MemoryFs`], the `BTreeMap`-backed implementation
//! - [`ingest`] -- Populating a [`MemoryFs`] from an uploaded folder
//! - [`path`] -- Path normalization helpers
//! - [`error`] -- [`VfsError`]

pub mod error;
pub mod ingest;
pub mod memory;
pub mod path;
pub mod traits;

pub use error::{VfsError, VfsResult};
pub use ingest::{ingest, IngestReport, UploadedFile};
pub use memory::MemoryFs;
pub use traits::{EntryKind, FileSystem, Metadata};
