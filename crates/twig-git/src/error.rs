use thiserror::Error;
use twig_types::{ObjectId, TypeError};
use twig_vfs::VfsError;

use crate::object::ObjectKind;

/// Errors from reading a repository.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Neither `<dir>/<git_dir>` nor `<dir>` looks like a git directory.
    #[error("not a git repository: {0}")]
    NotARepository(String),

    /// The object is in neither the loose store nor any pack.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// No ref by this name exists.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// A ref name that git would refuse to create.
    #[error("invalid ref name {name:?}: {reason}")]
    InvalidRefName { name: String, reason: String },

    /// A ref file exists but does not hold an id or a symbolic target.
    #[error("corrupt ref {name}: {reason}")]
    CorruptRef { name: String, reason: String },

    /// Symbolic refs nested deeper than the resolution limit.
    #[error("symbolic ref chain too deep at {0}")]
    SymrefLoop(String),

    /// The object had an unexpected kind (e.g., expected tree, got blob).
    #[error("unexpected object kind for {id}: expected {expected}, got {actual}")]
    UnexpectedKind {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// The object data is malformed or cannot be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// A pack or pack index is malformed.
    #[error("corrupt pack {path} at offset {offset}: {reason}")]
    CorruptPack {
        path: String,
        offset: u64,
        reason: String,
    },

    /// Repository feature this reader does not implement.
    #[error("unsupported repository format: {0}")]
    Unsupported(String),

    #[error("invalid object id: {0}")]
    InvalidId(#[from] TypeError),

    #[error("filesystem error: {0}")]
    Vfs(#[from] VfsError),

    /// Compression stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    pub(crate) fn corrupt(id: ObjectId, reason: impl Into<String>) -> Self {
        Self::CorruptObject {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt_pack(path: &str, offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptPack {
            path: path.to_string(),
            offset,
            reason: reason.into(),
        }
    }
}

/// Result alias for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;
