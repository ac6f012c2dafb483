use thiserror::Error;
use twig_git::ReaderError;

/// Why an upload could not be loaded as a repository.
///
/// Loading clears the previous repository before it starts, so after a
/// `LoadError` nothing is loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The upload contains no git directory.
    #[error("no git repository found in upload (looked in {0})")]
    NotARepository(String),

    /// A git directory was found but could not be read.
    #[error("repository is unreadable: {0}")]
    Unreadable(#[source] ReaderError),
}

impl From<ReaderError> for LoadError {
    fn from(err: ReaderError) -> Self {
        match err {
            ReaderError::NotARepository(dir) => Self::NotARepository(dir),
            other => Self::Unreadable(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
