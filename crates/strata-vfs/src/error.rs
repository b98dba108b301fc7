//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
///
/// Every backend and wrapper reports failures with these kinds. Composed
/// filesystems pass the innermost error through unchanged.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory does not exist.
    #[error("does not exist: {0}")]
    NotExist(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A path segment that must be a directory is not one.
    #[error("it's not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// The final path segment is not a usable name (e.g. empty).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Path is malformed or escapes the root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Mutation attempted through a read-only filesystem.
    #[error("filesystem is read-only")]
    ReadOnlyViolation,

    /// Operation on a handle that was already closed.
    #[error("file already closed")]
    UseAfterClose,

    /// Stored payload could not be decoded.
    #[error("corrupt content: {0}")]
    ContentCorruption(String),

    /// Requested feature is not supported by this backend.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Unmount refused because another filesystem is mounted below.
    #[error("filesystem mounted below {0}")]
    MountedBelow(String),

    /// Handle was not opened with the access the operation needs.
    #[error("bad file descriptor: {0}")]
    BadDescriptor(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Host I/O error (disk backend).
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl VfsError {
    /// Create a NotExist error.
    pub fn not_exist(path: impl Into<String>) -> Self {
        Self::NotExist(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create an InvalidName error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a ContentCorruption error.
    pub fn content_corruption(msg: impl Into<String>) -> Self {
        Self::ContentCorruption(msg.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a MountedBelow error.
    pub fn mounted_below(path: impl Into<String>) -> Self {
        Self::MountedBelow(path.into())
    }

    /// Create a BadDescriptor error.
    pub fn bad_descriptor(msg: impl Into<String>) -> Self {
        Self::BadDescriptor(msg.into())
    }

    /// Map a host I/O error onto the taxonomy, naming `path` in the message.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_exist(path),
            io::ErrorKind::AlreadyExists => Self::already_exists(path),
            io::ErrorKind::NotADirectory => Self::not_a_directory(path),
            io::ErrorKind::IsADirectory => Self::is_a_directory(path),
            io::ErrorKind::DirectoryNotEmpty => Self::directory_not_empty(path),
            io::ErrorKind::ReadOnlyFilesystem => Self::ReadOnlyViolation,
            _ => Self::Io(err),
        }
    }

    /// True if the error reports a missing file or directory.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::NotExist(_))
    }

    /// True if the error reports an already existing file or directory.
    pub fn is_exist(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<io::Error> for VfsError {
    fn from(err: io::Error) -> Self {
        let msg = err.to_string();
        Self::from_io(err, &msg)
    }
}

/// Convert VfsError to std::io::Error for the `std::io` adapters.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotExist(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            VfsError::InvalidName(msg) | VfsError::InvalidPath(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            VfsError::ReadOnlyViolation => io::Error::new(
                io::ErrorKind::ReadOnlyFilesystem,
                "filesystem is read-only",
            ),
            VfsError::UseAfterClose => io::Error::other("file already closed"),
            VfsError::ContentCorruption(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            VfsError::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            VfsError::MountedBelow(msg) => io::Error::new(io::ErrorKind::ResourceBusy, msg),
            VfsError::BadDescriptor(msg) => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            VfsError::InvalidConfig(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Io(e) => e,
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(VfsError::not_exist("/a").is_not_exist());
        assert!(!VfsError::not_exist("/a").is_exist());
        assert!(VfsError::already_exists("/a").is_exist());
        assert!(!VfsError::ReadOnlyViolation.is_not_exist());
    }

    #[test]
    fn test_from_io_maps_kinds() {
        let err = VfsError::from_io(io::Error::from(io::ErrorKind::NotFound), "/x");
        assert!(matches!(err, VfsError::NotExist(ref p) if p == "/x"));

        let err = VfsError::from_io(io::Error::from(io::ErrorKind::DirectoryNotEmpty), "/d");
        assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));

        let err = VfsError::from_io(io::Error::other("boom"), "/y");
        assert!(matches!(err, VfsError::Io(_)));
    }

    #[test]
    fn test_into_io_error() {
        let io_err: io::Error = VfsError::content_corruption("bad zlib").into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        let io_err: io::Error = VfsError::ReadOnlyViolation.into();
        assert_eq!(io_err.kind(), io::ErrorKind::ReadOnlyFilesystem);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            VfsError::mounted_below("/").to_string(),
            "filesystem mounted below /"
        );
        assert_eq!(
            VfsError::not_a_directory("/file").to_string(),
            "it's not a directory: /file"
        );
    }
}
