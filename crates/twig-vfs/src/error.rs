use thiserror::Error;

/// Errors from virtual filesystem operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VfsError {
    /// No stored content and no implied directory at this path.
    #[error("ENOENT: no such file or directory, '{path}'")]
    NotFound { path: String },
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// POSIX-style error code, as a reader probing for optional files expects.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ENOENT",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The path the failed operation was given.
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path } => path,
        }
    }
}

/// Result alias for filesystem operations.
pub type VfsResult<T> = Result<T, VfsError>;
