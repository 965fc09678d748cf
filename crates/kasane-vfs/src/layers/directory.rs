//! Directory layer: a real on-disk directory mounted at a virtual prefix.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use super::{Layer, mount_step};
use crate::node::Node;
use crate::path::VirtualPath;

/// Real directory layer.
///
/// If `root` is `/home/amy/site/webapp` and the prefix is `/virtual`, then
/// `/virtual/css/a.css` is backed by `/home/amy/site/webapp/css/a.css`, and
/// the node at `/virtual` itself is the root directory presented under the
/// name `virtual`.
#[derive(Debug, Clone)]
pub struct DirectoryLayer {
    prefix: VirtualPath,
    root: PathBuf,
}

impl DirectoryLayer {
    /// Mount `root` at `prefix`.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`). A root that does not exist yet
    /// is kept as given and lists empty until it appears.
    pub fn new(prefix: &str, root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            prefix: VirtualPath::parse(prefix),
            root,
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Real location for the components below the prefix.
    fn real_path(&self, below_prefix: &[String]) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(below_prefix);
        path
    }
}

#[async_trait]
impl Layer for DirectoryLayer {
    fn prefix(&self) -> &VirtualPath {
        &self.prefix
    }

    async fn list_children(&self, dir: &VirtualPath) -> BTreeSet<String> {
        let Some(below) = dir.strip_prefix(&self.prefix) else {
            return mount_step(&self.prefix, dir);
        };

        let full_path = self.real_path(below);
        let mut names = BTreeSet::new();
        let mut entries = match fs::read_dir(&full_path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %full_path.display(), error = %e, "directory layer: nothing to list");
                return names;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => match entry.file_name().into_string() {
                    Ok(name) => {
                        names.insert(name);
                    }
                    Err(raw) => {
                        tracing::debug!(path = %full_path.display(), name = ?raw, "directory layer: skipping non-UTF-8 name");
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(path = %full_path.display(), error = %e, "directory layer: listing cut short");
                    break;
                }
            }
        }
        names
    }

    fn make_child(&self, parent: &Arc<Node>, name: &str) -> Node {
        let candidate = parent.path().join(name);
        match candidate.strip_prefix(&self.prefix) {
            // The mount point itself: the real root, shown under the mount's name.
            Some([]) => Node::alias(Node::real(parent, name, self.root.clone()), name),
            Some(below) => Node::real(parent, name, self.real_path(below)),
            None if self.prefix.is_strictly_under(&candidate) => Node::synthetic(parent, name),
            None => Node::absent(parent, name),
        }
    }

    fn describe(&self) -> String {
        format!("directory {} at {}", self.root.display(), self.prefix)
    }
}
