//! Error types for the diff crate.

use twig_git::ReaderError;
use twig_types::ObjectId;

/// Structural failures that abort a whole comparison.
///
/// Per-path problems never surface here; the affected path is left out of
/// the result instead.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A branch name did not resolve to an object id.
    #[error("cannot resolve {reference:?}: {source}")]
    ResolveRef {
        reference: String,
        #[source]
        source: ReaderError,
    },

    /// A resolved id could not be read as a commit.
    #[error("cannot read commit {id}: {source}")]
    ReadCommit {
        id: ObjectId,
        #[source]
        source: ReaderError,
    },
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
