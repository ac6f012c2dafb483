//! Foundation types for twig.
//!
//! Every other twig crate depends on `twig-types`. It carries the content
//! identifier shared by the repository reader and the diff engine, plus the
//! structured diff results handed to the presentation layer.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (SHA-1 of the canonical object encoding)
//! - [`FileStatus`] -- How a path changed between two snapshots
//! - [`Hunk`] -- One contiguous block of a unified diff
//! - [`FileDiffResult`] -- All hunks for one changed path

pub mod diff;
pub mod error;
pub mod object;

pub use diff::{FileDiffResult, FileStatus, Hunk};
pub use error::TypeError;
pub use object::ObjectId;
