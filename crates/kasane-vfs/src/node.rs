//! Nodes: the values handed back by resolution and listing.
//!
//! A [`Node`] names a virtual path and carries the backing that a layer chose
//! for it. The backing is a closed set of variants; every operation matches
//! on it. Alias and late-bound nodes are first unwrapped to the concrete node
//! they stand for, so the per-variant code only ever sees real files,
//! archive entries, synthetic directories and absent paths.
//!
//! Identity is structural: two nodes are equal when their virtual paths are,
//! whichever layer produced them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::context;
use crate::error::{VfsError, VfsResult};
use crate::layers::archive::{self, ArchiveEntry};
use crate::path::VirtualPath;
use crate::types::{NodeAttr, NodeKind};

/// Byte stream returned by [`Node::read`].
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Byte stream returned by [`Node::write`] and [`Node::append`].
pub type WriteStream = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Clone)]
enum Backing {
    Real { path: PathBuf },
    ArchiveEntry { archive: Arc<PathBuf>, entry: ArchiveEntry },
    Synthetic { mtime: SystemTime },
    Absent,
    Alias { target: Box<Node> },
    LateBound,
}

/// What a node resolves to once aliases and late binding are stripped away.
enum Target {
    Real(PathBuf),
    Archive(Arc<PathBuf>, ArchiveEntry),
    Synthetic(SystemTime),
    Absent,
}

/// A node in the layered tree.
#[derive(Clone)]
pub struct Node {
    parent: Option<Arc<Node>>,
    path: VirtualPath,
    backing: Backing,
}

impl Node {
    // ========================================================================
    // Construction
    // ========================================================================

    /// The virtual root: a synthetic directory with no parent.
    pub(crate) fn root() -> Self {
        Self {
            parent: None,
            path: VirtualPath::root(),
            backing: Backing::Synthetic {
                mtime: SystemTime::now(),
            },
        }
    }

    fn child_of(parent: &Arc<Node>, name: &str, backing: Backing) -> Self {
        Self {
            parent: Some(Arc::clone(parent)),
            path: parent.path.join(name),
            backing,
        }
    }

    /// A node backed by a path on the real filesystem.
    pub fn real(parent: &Arc<Node>, name: &str, real_path: impl Into<PathBuf>) -> Self {
        Self::child_of(
            parent,
            name,
            Backing::Real {
                path: real_path.into(),
            },
        )
    }

    /// A node backed by an entry in an archive.
    pub fn archive_entry(
        parent: &Arc<Node>,
        name: &str,
        archive: Arc<PathBuf>,
        entry: ArchiveEntry,
    ) -> Self {
        Self::child_of(parent, name, Backing::ArchiveEntry { archive, entry })
    }

    /// A directory with no backing content. Its modification time is fixed
    /// at creation.
    pub fn synthetic(parent: &Arc<Node>, name: &str) -> Self {
        Self::child_of(
            parent,
            name,
            Backing::Synthetic {
                mtime: SystemTime::now(),
            },
        )
    }

    /// A path that nothing backs.
    pub fn absent(parent: &Arc<Node>, name: &str) -> Self {
        Self::child_of(parent, name, Backing::Absent)
    }

    /// Present `target` under a different display name.
    ///
    /// The alias sits beside the target (same parent) and delegates every
    /// operation to it; only [`name`](Self::name) and [`path`](Self::path)
    /// differ.
    pub fn alias(target: Node, name: &str) -> Self {
        let parent = target.parent.clone();
        let path = target.path.parent().join(name);
        Self {
            parent,
            path,
            backing: Backing::Alias {
                target: Box::new(target),
            },
        }
    }

    /// A node that re-resolves `path` against the active filesystem (see
    /// [`context::current`]) on every operation.
    ///
    /// `.` and `..` are folded lexically so the node's identity matches what
    /// the resolver would return.
    pub fn late_bound(path: &str) -> Self {
        let mut segments: Vec<String> = Vec::new();
        for segment in VirtualPath::parse(path).segments() {
            match segment.as_str() {
                "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_string()),
            }
        }
        Self::late_bound_at(VirtualPath::from_segments(segments))
    }

    fn late_bound_at(path: VirtualPath) -> Self {
        let parent = if path.is_root() {
            None
        } else {
            Some(Arc::new(Self::late_bound_at(path.parent())))
        };
        Self {
            parent,
            path,
            backing: Backing::LateBound,
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Display name: the last component of the virtual path.
    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// Parent node, `None` for the root.
    pub fn parent(&self) -> Option<&Arc<Node>> {
        self.parent.as_ref()
    }

    /// Which variant backs this node. Aliases and late-bound nodes report
    /// themselves, not what they delegate to.
    pub fn kind(&self) -> NodeKind {
        match &self.backing {
            Backing::Real { .. } => NodeKind::Real,
            Backing::ArchiveEntry { .. } => NodeKind::ArchiveEntry,
            Backing::Synthetic { .. } => NodeKind::Synthetic,
            Backing::Absent => NodeKind::Absent,
            Backing::Alias { .. } => NodeKind::Alias,
            Backing::LateBound => NodeKind::LateBound,
        }
    }

    // ========================================================================
    // Delegation
    // ========================================================================

    /// Unwrap aliases and late-bound nodes down to the backing that actually
    /// answers operations.
    async fn target(&self) -> Target {
        let mut node = self.clone();
        loop {
            match node.backing {
                Backing::Alias { target } => node = *target,
                Backing::LateBound => match context::current() {
                    Some(fs) => node = fs.resolve_path(&node.path).await,
                    None => {
                        tracing::debug!(
                            path = %node.path,
                            "late-bound node used with no active filesystem"
                        );
                        return Target::Absent;
                    }
                },
                Backing::Real { path } => return Target::Real(path),
                Backing::ArchiveEntry { archive, entry } => return Target::Archive(archive, entry),
                Backing::Synthetic { mtime } => return Target::Synthetic(mtime),
                Backing::Absent => return Target::Absent,
            }
        }
    }

    /// The on-disk location behind this node, for real files and aliases of
    /// them.
    pub async fn real_path(&self) -> Option<PathBuf> {
        match self.target().await {
            Target::Real(path) => Some(path),
            _ => None,
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Node attributes. Fails with `NotFound` when nothing exists here.
    pub async fn stat(&self) -> VfsResult<NodeAttr> {
        match self.target().await {
            Target::Real(path) => {
                let meta = fs::metadata(&path)
                    .await
                    .map_err(|e| VfsError::from_io(self.path.to_string(), e))?;
                Ok(metadata_to_attr(&meta))
            }
            Target::Archive(_, entry) => Ok(entry.attr()),
            Target::Synthetic(mtime) => Ok(NodeAttr::directory(mtime)),
            Target::Absent => Err(VfsError::not_found(self.path.to_string())),
        }
    }

    pub async fn exists(&self) -> bool {
        self.stat().await.is_ok()
    }

    pub async fn is_dir(&self) -> bool {
        self.stat().await.map(|a| a.is_dir()).unwrap_or(false)
    }

    pub async fn is_file(&self) -> bool {
        self.stat().await.map(|a| a.is_file()).unwrap_or(false)
    }

    /// Last modification time; the Unix epoch when nothing exists here.
    pub async fn modified(&self) -> SystemTime {
        self.stat()
            .await
            .map(|a| a.mtime)
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    /// Length in bytes; 0 for directories and missing paths.
    pub async fn len(&self) -> u64 {
        self.stat().await.map(|a| a.size).unwrap_or(0)
    }

    /// Whether content or a listing can be read from here. Archive entries
    /// and synthetic directories always can; real nodes must exist.
    pub async fn can_read(&self) -> bool {
        match self.target().await {
            Target::Real(path) => fs::metadata(&path).await.is_ok(),
            Target::Archive(..) | Target::Synthetic(_) => true,
            Target::Absent => false,
        }
    }

    /// Whether an existing real node accepts writes. Archive entries,
    /// synthetic directories and absent paths never do.
    pub async fn can_write(&self) -> bool {
        match self.target().await {
            Target::Real(path) => fs::metadata(&path)
                .await
                .is_ok_and(|meta| !meta.permissions().readonly()),
            _ => false,
        }
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Open the node's content for reading.
    pub async fn read(&self) -> VfsResult<ReadStream> {
        let vpath = self.path.to_string();
        match self.target().await {
            Target::Real(path) => {
                let meta = fs::metadata(&path)
                    .await
                    .map_err(|e| VfsError::from_io(&vpath, e))?;
                if meta.is_dir() {
                    return Err(VfsError::is_a_directory(vpath));
                }
                let file = fs::File::open(&path)
                    .await
                    .map_err(|e| VfsError::from_io(&vpath, e))?;
                Ok(Box::new(file))
            }
            Target::Archive(archive, entry) => {
                if entry.is_dir {
                    return Err(VfsError::is_a_directory(vpath));
                }
                let data = tokio::task::spawn_blocking(move || {
                    archive::read_entry(&archive, &entry.name)
                })
                .await
                .map_err(|e| VfsError::Io(std::io::Error::other(e)))??;
                Ok(Box::new(Cursor::new(data)))
            }
            Target::Synthetic(_) => Err(VfsError::virtual_directory(vpath)),
            Target::Absent => Err(VfsError::not_found(vpath)),
        }
    }

    /// Open the node for writing, truncating any existing content.
    pub async fn write(&self) -> VfsResult<WriteStream> {
        self.open_write(false).await
    }

    /// Open the node for writing at the end of any existing content.
    pub async fn append(&self) -> VfsResult<WriteStream> {
        self.open_write(true).await
    }

    async fn open_write(&self, append: bool) -> VfsResult<WriteStream> {
        let vpath = self.path.to_string();
        match self.target().await {
            Target::Real(path) => {
                let file = fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .append(append)
                    .truncate(!append)
                    .open(&path)
                    .await
                    .map_err(|e| VfsError::from_io(&vpath, e))?;
                Ok(Box::new(file))
            }
            Target::Archive(..) => Err(VfsError::read_only(vpath)),
            Target::Synthetic(_) => Err(VfsError::virtual_directory(vpath)),
            Target::Absent => Err(VfsError::not_found(vpath)),
        }
    }

    /// Read the whole content into memory.
    pub async fn read_to_end(&self) -> VfsResult<Vec<u8>> {
        let mut stream = self.read().await?;
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await?;
        Ok(data)
    }

    /// Replace the whole content.
    pub async fn write_all(&self, data: &[u8]) -> VfsResult<()> {
        let mut stream = self.write().await?;
        stream.write_all(data).await?;
        stream.shutdown().await?;
        Ok(())
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Delete a file or an empty directory.
    pub async fn delete(&self) -> VfsResult<()> {
        let vpath = self.path.to_string();
        match self.target().await {
            Target::Real(path) => {
                let meta = fs::metadata(&path)
                    .await
                    .map_err(|e| VfsError::from_io(&vpath, e))?;
                let removed = if meta.is_dir() {
                    fs::remove_dir(&path).await
                } else {
                    fs::remove_file(&path).await
                };
                removed.map_err(|e| VfsError::from_io(&vpath, e))
            }
            Target::Archive(..) => Err(VfsError::read_only(vpath)),
            Target::Synthetic(_) => Err(VfsError::virtual_directory(vpath)),
            Target::Absent => Err(VfsError::permission_denied(vpath)),
        }
    }

    /// Nodes never move content between backing stores, so renaming a real
    /// file reports `Ok(false)` and leaves it in place. Read-only and absent
    /// nodes refuse outright.
    pub async fn rename(&self, _to: &Node) -> VfsResult<bool> {
        let vpath = self.path.to_string();
        match self.target().await {
            Target::Real(_) => Ok(false),
            Target::Archive(..) => Err(VfsError::read_only(vpath)),
            Target::Synthetic(_) => Err(VfsError::virtual_directory(vpath)),
            Target::Absent => Err(VfsError::permission_denied(vpath)),
        }
    }

    /// Create an empty file if nothing exists here yet. Returns `false` when
    /// the path is already taken.
    pub async fn create_new(&self) -> VfsResult<bool> {
        let vpath = self.path.to_string();
        match self.target().await {
            Target::Real(path) => {
                let created = fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await;
                match created {
                    Ok(_) => Ok(true),
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
                    Err(e) => Err(VfsError::from_io(vpath, e)),
                }
            }
            Target::Archive(..) => Err(VfsError::read_only(vpath)),
            Target::Synthetic(_) => Err(VfsError::virtual_directory(vpath)),
            Target::Absent => Err(VfsError::not_found(vpath)),
        }
    }

    /// Set the modification time of a real file or directory.
    pub async fn set_modified(&self, mtime: SystemTime) -> VfsResult<()> {
        let vpath = self.path.to_string();
        match self.target().await {
            Target::Real(path) => {
                let result = tokio::task::spawn_blocking(move || {
                    let handle = if std::fs::metadata(&path)?.is_dir() {
                        std::fs::File::open(&path)?
                    } else {
                        std::fs::OpenOptions::new().write(true).open(&path)?
                    };
                    handle.set_modified(mtime)
                })
                .await
                .map_err(|e| VfsError::Io(std::io::Error::other(e)))?;
                result.map_err(|e| VfsError::from_io(vpath, e))
            }
            Target::Archive(..) => Err(VfsError::read_only(vpath)),
            Target::Synthetic(_) => Err(VfsError::virtual_directory(vpath)),
            Target::Absent => Err(VfsError::not_found(vpath)),
        }
    }

    /// Create this directory. The parent must already exist.
    pub async fn mkdir(&self) -> VfsResult<()> {
        self.make_dir(false).await
    }

    /// Create this directory and any missing parents.
    pub async fn mkdir_all(&self) -> VfsResult<()> {
        self.make_dir(true).await
    }

    async fn make_dir(&self, recursive: bool) -> VfsResult<()> {
        let vpath = self.path.to_string();
        match self.target().await {
            Target::Real(path) => {
                let created = if recursive {
                    fs::create_dir_all(&path).await
                } else {
                    fs::create_dir(&path).await
                };
                created.map_err(|e| VfsError::from_io(&vpath, e))
            }
            Target::Archive(..) => Err(VfsError::read_only(vpath)),
            Target::Synthetic(_) => Err(VfsError::virtual_directory(vpath)),
            Target::Absent => Err(VfsError::not_found(vpath)),
        }
    }
}

/// Convert std::fs::Metadata to NodeAttr.
fn metadata_to_attr(meta: &std::fs::Metadata) -> NodeAttr {
    let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    if meta.is_dir() {
        NodeAttr::directory(mtime)
    } else {
        NodeAttr::file(meta.len(), mtime, !meta.permissions().readonly())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Node");
        s.field("path", &self.path.to_string())
            .field("kind", &self.kind());
        match &self.backing {
            Backing::Real { path } => {
                s.field("real", path);
            }
            Backing::ArchiveEntry { archive, entry } => {
                s.field("archive", archive).field("entry", &entry.name);
            }
            Backing::Alias { target } => {
                s.field("target", target);
            }
            _ => {}
        }
        s.finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}
