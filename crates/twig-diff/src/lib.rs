//! Branch comparison for twig.
//!
//! Given two refs in a loaded repository, works out which paths differ and
//! produces line-level hunks for each changed text file.
//!
//! # Pipeline
//!
//! `resolve refs -> read commits -> walk both trees -> reconcile -> diff each path`
//!
//! Structural failures (a ref that does not resolve, a commit that cannot
//! be read) fail the whole comparison with a [`DiffError`]. Content-level
//! failures (one tree side unreadable, one blob missing, binary content)
//! only drop the affected paths and are reported through `tracing`.
//!
//! # Key Types
//!
//! - [`TreeIndex`] -- Flat path -> blob id mapping for one commit
//! - [`TreeDiff`] / [`TreeChange`] -- Path-level changes between two indexes
//! - [`TextDiffer`] / [`SimilarDiffer`] -- Unified patch creation and parsing
//! - [`generate_diff`] -- The full comparison

pub mod config;
pub mod differ;
pub mod engine;
pub mod error;
pub mod patch;
pub mod tree_diff;
pub mod walker;

pub use config::DiffConfig;
pub use differ::{SimilarDiffer, TextDiffer};
pub use engine::generate_diff;
pub use error::{DiffError, DiffResult};
pub use patch::{parse_patch, FilePatch, HunkRange};
pub use tree_diff::{reconcile, TreeChange, TreeDiff};
pub use walker::{walk_tree, TreeIndex};
