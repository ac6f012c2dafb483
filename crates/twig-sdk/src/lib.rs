//! High-level API for twig.
//!
//! [`Twig`] is the entry point for a presentation layer: hand it the files
//! of an uploaded folder, ask for the branch list, and compare two branches.
//! Everything runs in memory; nothing touches the host filesystem.
//!
//! ```
//! use twig_sdk::{Twig, UploadedFile};
//!
//! let mut twig = Twig::new();
//! // An upload with no files is accepted and changes nothing.
//! twig.load_repository(Vec::<UploadedFile>::new()).unwrap();
//! assert!(!twig.is_loaded());
//! assert!(twig.list_branches().is_empty());
//! ```

pub mod config;
pub mod error;
pub mod repository;

pub use config::TwigConfig;
pub use error::{ConfigError, LoadError};
pub use repository::Twig;

// Re-export key types
pub use twig_diff::{DiffConfig, DiffError, DiffResult};
pub use twig_git::CacheStats;
pub use twig_types::{FileDiffResult, FileStatus, Hunk, ObjectId};
pub use twig_vfs::{FileSystem, MemoryFs, UploadedFile};
