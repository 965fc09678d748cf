//! Node metadata types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory (real, archived or synthetic).
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Which backing store produced a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Entry on the real filesystem.
    Real,
    /// Entry inside an archive.
    ArchiveEntry,
    /// Directory with no backing content.
    Synthetic,
    /// Nothing backs this path.
    Absent,
    /// Another node under a different display name.
    Alias,
    /// Resolved against the active filesystem on every call.
    LateBound,
}

/// Node attributes (metadata).
///
/// Directories always report `size == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Whether content streams may be opened for writing.
    pub writable: bool,
}

impl NodeAttr {
    /// Attributes for a file.
    pub fn file(size: u64, mtime: SystemTime, writable: bool) -> Self {
        Self {
            size,
            kind: FileType::File,
            mtime,
            writable,
        }
    }

    /// Attributes for a directory.
    pub fn directory(mtime: SystemTime) -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            mtime,
            writable: false,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert!(FileType::File.is_file());
        assert!(!FileType::File.is_dir());
        assert!(FileType::Directory.is_dir());
    }

    #[test]
    fn test_attr_constructors() {
        let file = NodeAttr::file(1024, SystemTime::UNIX_EPOCH, true);
        assert!(file.is_file());
        assert_eq!(file.size, 1024);
        assert!(file.writable);

        let dir = NodeAttr::directory(SystemTime::UNIX_EPOCH);
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
        assert!(!dir.writable);
    }
}
