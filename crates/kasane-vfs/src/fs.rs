//! The layered filesystem: ordered layers merged into one tree.
//!
//! Layers are consulted in registration order, and the earlier layer wins
//! whenever two of them offer the same name in the same directory. The same
//! rule is applied two ways: single-child lookup walks the layers forwards
//! and stops at the first that lists the name, while directory listing walks
//! them backwards so that earlier layers overwrite later ones in the name
//! map. Both must agree; the tests below and in `tests/` check that they do.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::VfsResult;
use crate::layers::{ArchiveLayer, DirectoryLayer, Layer};
use crate::node::Node;
use crate::path::VirtualPath;

/// Resolves paths and lists directories across an ordered set of layers.
///
/// Immutable after construction; share it as `Arc<LayeredFs>`.
pub struct LayeredFs {
    root: Arc<Node>,
    layers: Vec<Arc<dyn Layer>>,
}

impl std::fmt::Debug for LayeredFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredFs")
            .field(
                "layers",
                &self.layers.iter().map(|l| l.describe()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl LayeredFs {
    /// Create a filesystem over `layers`, highest precedence first.
    pub fn new(layers: Vec<Arc<dyn Layer>>) -> Self {
        Self {
            root: Arc::new(Node::root()),
            layers,
        }
    }

    /// Start building a filesystem layer by layer.
    pub fn builder() -> LayeredFsBuilder {
        LayeredFsBuilder::default()
    }

    /// The virtual root.
    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// Layers in precedence order.
    pub fn layers(&self) -> &[Arc<dyn Layer>] {
        &self.layers
    }

    /// Resolve a path string to a node.
    ///
    /// Never fails: a path nothing backs resolves to an absent node. Leading,
    /// trailing and repeated separators are ignored, relative paths are taken
    /// from the root, `.` stays put and `..` climbs (the root is its own
    /// parent).
    pub async fn resolve(&self, path: &str) -> Node {
        self.resolve_path(&VirtualPath::parse(path)).await
    }

    /// Resolve an already-parsed path.
    pub async fn resolve_path(&self, path: &VirtualPath) -> Node {
        let mut current = Arc::clone(&self.root);
        for segment in path.segments() {
            current = match segment.as_str() {
                "." => current,
                ".." => current.parent().cloned().unwrap_or_else(|| Arc::clone(&self.root)),
                name => Arc::new(self.child(&current, name).await),
            };
        }
        tracing::trace!(path = %path, resolved = ?current.kind(), "resolved");
        Arc::unwrap_or_clone(current)
    }

    /// Materialize `parent/name`.
    ///
    /// The first layer that lists `name` under `parent` provides it. If none
    /// does, the first layer is still asked, so every name gets that layer's
    /// fallback (absent, or synthetic on the way to its mount point). With no
    /// layers at all, every path is a synthetic directory.
    pub async fn child(&self, parent: &Arc<Node>, name: &str) -> Node {
        for layer in &self.layers {
            if layer.list_children(parent.path()).await.contains(name) {
                return layer.make_child(parent, name);
            }
        }
        match self.layers.first() {
            Some(first) => first.make_child(parent, name),
            None => Node::synthetic(parent, name),
        }
    }

    /// Merged, deduplicated listing of `dir`, sorted by name.
    ///
    /// Each name is materialized by the earliest layer that lists it.
    pub async fn list_children(&self, dir: &Node) -> Vec<Node> {
        self.list_children_filtered(dir, |_| true).await
    }

    /// Like [`list_children`](Self::list_children), keeping only names that
    /// `accept` allows. Rejected names are never materialized.
    pub async fn list_children_filtered<F>(&self, dir: &Node, accept: F) -> Vec<Node>
    where
        F: Fn(&str) -> bool,
    {
        if dir.kind() == crate::types::NodeKind::Absent {
            return Vec::new();
        }

        let mut owners: BTreeMap<String, &Arc<dyn Layer>> = BTreeMap::new();
        for layer in self.layers.iter().rev() {
            for name in layer.list_children(dir.path()).await {
                if accept(&name) {
                    owners.insert(name, layer);
                }
            }
        }

        let parent = Arc::new(dir.clone());
        owners
            .into_iter()
            .map(|(name, layer)| layer.make_child(&parent, &name))
            .collect()
    }

    /// Does anything exist at exactly this path?
    pub async fn exists(&self, path: &str) -> bool {
        self.resolve(path).await.exists().await
    }
}

/// Builder for [`LayeredFs`]. Layers are added highest precedence first.
#[derive(Default)]
pub struct LayeredFsBuilder {
    layers: Vec<Arc<dyn Layer>>,
}

impl LayeredFsBuilder {
    /// Mount a real directory.
    pub fn directory(mut self, prefix: &str, root: impl Into<PathBuf>) -> Self {
        self.layers.push(Arc::new(DirectoryLayer::new(prefix, root)));
        self
    }

    /// Mount a zip archive. Fails if the archive cannot be indexed.
    pub fn archive(mut self, prefix: &str, archive: impl Into<PathBuf>) -> VfsResult<Self> {
        self.layers.push(Arc::new(ArchiveLayer::open(prefix, archive)?));
        Ok(self)
    }

    /// Add any layer implementation.
    pub fn layer(mut self, layer: Arc<dyn Layer>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn build(self) -> LayeredFs {
        LayeredFs::new(self.layers)
    }
}
