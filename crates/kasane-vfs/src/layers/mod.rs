//! Layers: the backing stores that contribute to the merged tree.
//!
//! A layer is mounted at a virtual prefix and answers two questions about
//! any directory in the tree: which child names it can offer, and what node
//! it would produce for a given child. Both answers must be total; a layer
//! with nothing to say returns an empty set or an absent node.

pub mod archive;
mod directory;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::node::Node;
use crate::path::VirtualPath;

pub use archive::{ArchiveEntry, ArchiveLayer};
pub use directory::DirectoryLayer;

/// Backing-store adapter contract.
///
/// Layers are immutable after construction and shared as `Arc<dyn Layer>`.
#[async_trait]
pub trait Layer: Send + Sync + Debug {
    /// Virtual path at which this layer's content appears.
    fn prefix(&self) -> &VirtualPath;

    /// Names this layer offers directly under `dir`.
    ///
    /// For directories at or below the prefix this is the backing content;
    /// for strict ancestors of the prefix it is the single next component of
    /// the prefix, so the tree stays navigable down to the mount point.
    /// Never fails: unreadable or missing directories list empty.
    async fn list_children(&self, dir: &VirtualPath) -> BTreeSet<String>;

    /// Materialize the node this layer would provide for `parent/name`.
    ///
    /// Always returns a node, absent if the layer has nothing there.
    fn make_child(&self, parent: &Arc<Node>, name: &str) -> Node;

    /// One-line description for logs and diagnostics.
    fn describe(&self) -> String;
}

/// The mount-point step shared by every layer kind: when `dir` is a strict
/// ancestor of `prefix`, offer the next component of `prefix`.
pub(crate) fn mount_step(prefix: &VirtualPath, dir: &VirtualPath) -> BTreeSet<String> {
    prefix
        .next_below(dir)
        .map(|name| BTreeSet::from([name.to_string()]))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_step() {
        let prefix = VirtualPath::parse("/a/b");
        assert_eq!(
            mount_step(&prefix, &VirtualPath::root()),
            BTreeSet::from(["a".to_string()])
        );
        assert_eq!(
            mount_step(&prefix, &VirtualPath::parse("/a")),
            BTreeSet::from(["b".to_string()])
        );
        assert!(mount_step(&prefix, &prefix).is_empty());
        assert!(mount_step(&prefix, &VirtualPath::parse("/c")).is_empty());
    }
}
