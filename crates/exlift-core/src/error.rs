//! exlift error types

use thiserror::Error;

/// The main error type for exlift operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying image file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is neither a VHD container nor a raw exFAT image
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// VHD disk type other than fixed (2) or dynamic (3)
    #[error("Unsupported VHD disk type: {0}")]
    UnsupportedDiskType(u32),

    /// Boot sector signature mismatch
    #[error("Not an exFAT volume: {0}")]
    NotExFat(String),

    /// Zero or reserved starting cluster where a data chain was expected
    #[error("Invalid start cluster: {0}")]
    InvalidCluster(u32),

    /// A path segment failed to resolve
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// The path names a directory where a file was expected
    #[error("Is a directory: {0}")]
    IsDirectory(String),

    /// The path names a file where a directory was expected
    #[error("Not a directory: {0}")]
    NotADirectory(String),
}

/// Result type alias for exlift operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid container error
    pub fn invalid_container(msg: impl Into<String>) -> Self {
        Error::InvalidContainer(msg.into())
    }

    /// Create a not-exFAT error
    pub fn not_exfat(msg: impl Into<String>) -> Self {
        Error::NotExFat(msg.into())
    }

    /// Create a path-not-found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Error::PathNotFound(path.into())
    }

    /// Create an is-a-directory error
    pub fn is_directory(path: impl Into<String>) -> Self {
        Error::IsDirectory(path.into())
    }

    /// Create a not-a-directory error
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Error::NotADirectory(path.into())
    }
}
