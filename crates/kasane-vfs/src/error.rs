//! VFS error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// VFS error type.
///
/// Resolution and listing never produce these; they come from operations
/// invoked on the nodes those calls hand back, and from layer construction.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Nothing backs this path in any layer.
    #[error("not found: {0}")]
    NotFound(String),

    /// Mutation attempted on a read-only node (archive entry).
    #[error("read-only: {0}")]
    ReadOnly(String),

    /// Stream or mutation attempted on a synthetic directory.
    #[error("{0} is a virtual directory")]
    VirtualDirectory(String),

    /// Delete or rename of something that was never there.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Archive could not be opened, indexed or re-read.
    #[error("archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Layer configuration is invalid.
    #[error("config: {0}")]
    Config(String),

    /// Layer configuration failed to parse.
    #[error("config parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// The current thread already has an active filesystem.
    #[error("a filesystem is already active in this context")]
    ContextOccupied,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a ReadOnly error.
    pub fn read_only(path: impl Into<String>) -> Self {
        Self::ReadOnly(path.into())
    }

    /// Create a VirtualDirectory error.
    pub fn virtual_directory(path: impl Into<String>) -> Self {
        Self::VirtualDirectory(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create an Archive error.
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map an I/O error from the real filesystem, keeping the virtual path
    /// for the not-found case so callers see which node was missing.
    pub(crate) fn from_io(virtual_path: impl Into<String>, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(virtual_path.into()),
            io::ErrorKind::IsADirectory => Self::IsADirectory(virtual_path.into()),
            _ => Self::Io(err),
        }
    }

    /// True for the read-only family: archive entries and synthetic directories.
    pub fn is_read_only_violation(&self) -> bool {
        matches!(self, Self::ReadOnly(_) | Self::VirtualDirectory(_))
    }
}

/// Convert VfsError to std::io::Error for stream adapters.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::ReadOnly(msg) => {
                io::Error::new(io::ErrorKind::ReadOnlyFilesystem, format!("read-only: {msg}"))
            }
            VfsError::VirtualDirectory(msg) => io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{msg} is a virtual directory"),
            ),
            VfsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::Archive { path, source } => io::Error::new(
                io::ErrorKind::InvalidData,
                format!("archive {}: {source}", path.display()),
            ),
            VfsError::Config(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Ron(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            VfsError::ContextOccupied => io::Error::other("filesystem context occupied"),
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
    fn test_io_not_found_keeps_virtual_path() {
        let err = VfsError::from_io(
            "/virtual/a.txt",
            io::Error::new(io::ErrorKind::NotFound, "/tmp/xyz/a.txt"),
        );
        assert!(matches!(err, VfsError::NotFound(ref p) if p == "/virtual/a.txt"));
    }

    #[test]
    fn test_other_io_errors_pass_through() {
        let err = VfsError::from_io("/x", io::Error::other("disk on fire"));
        assert!(matches!(err, VfsError::Io(_)));
    }

    #[test]
    fn test_read_only_family() {
        assert!(VfsError::read_only("/lib/a.js").is_read_only_violation());
        assert!(VfsError::virtual_directory("/lib").is_read_only_violation());
        assert!(!VfsError::not_found("/nope").is_read_only_violation());
    }

    #[test]
    fn test_into_io_error_kinds() {
        let e: io::Error = VfsError::not_found("/a").into();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);

        let e: io::Error = VfsError::permission_denied("/a").into();
        assert_eq!(e.kind(), io::ErrorKind::PermissionDenied);

        let e: io::Error = VfsError::virtual_directory("/a").into();
        assert_eq!(e.kind(), io::ErrorKind::IsADirectory);
    }
}
