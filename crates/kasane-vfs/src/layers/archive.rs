//! Archive layer: a read-only zip archive mounted at a virtual prefix.
//!
//! The archive is opened once at construction to build an ordered index of
//! every entry, then closed. Reads reopen the archive, inflate one entry into
//! memory and close it again, so no file handle outlives a single call.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use zip::ZipArchive;
use zip::result::ZipError;

use super::{Layer, mount_step};
use crate::error::{VfsError, VfsResult};
use crate::node::Node;
use crate::path::VirtualPath;
use crate::types::NodeAttr;

/// Metadata recorded for one archive entry at index time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name exactly as stored in the archive.
    pub name: String,
    pub is_dir: bool,
    /// Uncompressed size.
    pub size: u64,
    pub mtime: SystemTime,
}

impl ArchiveEntry {
    pub(crate) fn attr(&self) -> NodeAttr {
        if self.is_dir {
            NodeAttr::directory(self.mtime)
        } else {
            NodeAttr::file(self.size, self.mtime, false)
        }
    }
}

/// Zip archive layer.
#[derive(Debug)]
pub struct ArchiveLayer {
    prefix: VirtualPath,
    archive: Arc<PathBuf>,
    index: BTreeMap<VirtualPath, ArchiveEntry>,
}

impl ArchiveLayer {
    /// Index `archive` and mount it at `prefix`.
    ///
    /// Fails if the archive cannot be opened or enumerated; a layer is never
    /// created over an unreadable archive.
    pub fn open(prefix: &str, archive: impl Into<PathBuf>) -> VfsResult<Self> {
        let archive: PathBuf = archive.into();
        let prefix = VirtualPath::parse(prefix);

        let file = File::open(&archive).map_err(|e| VfsError::archive(&archive, ZipError::Io(e)))?;
        let mut zip = ZipArchive::new(file).map_err(|e| VfsError::archive(&archive, e))?;

        let mut index = BTreeMap::new();
        for i in 0..zip.len() {
            let entry = zip.by_index(i).map_err(|e| VfsError::archive(&archive, e))?;
            let relative = VirtualPath::parse(entry.name());
            if relative.is_root() {
                continue;
            }
            if relative.segments().iter().any(|s| s == "." || s == "..") {
                tracing::warn!(
                    archive = %archive.display(),
                    entry = entry.name(),
                    "skipping archive entry with relative components"
                );
                continue;
            }
            let mtime = entry
                .last_modified()
                .and_then(zip_time)
                .unwrap_or(SystemTime::UNIX_EPOCH);
            index.insert(
                prefix.concat(&relative),
                ArchiveEntry {
                    name: entry.name().to_string(),
                    is_dir: entry.is_dir(),
                    size: entry.size(),
                    mtime,
                },
            );
        }

        tracing::debug!(
            archive = %archive.display(),
            prefix = %prefix,
            entries = index.len(),
            "indexed archive"
        );

        Ok(Self {
            prefix,
            archive: Arc::new(archive),
            index,
        })
    }

    /// The archive file backing this layer.
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// Number of indexed entries.
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// Indexed entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = (&VirtualPath, &ArchiveEntry)> {
        self.index.iter()
    }

    /// True if some indexed key lies strictly under `path`.
    fn has_descendants(&self, path: &VirtualPath) -> bool {
        self.index
            .range((Bound::Excluded(path.clone()), Bound::Unbounded))
            .next()
            .is_some_and(|(key, _)| key.is_strictly_under(path))
    }
}

#[async_trait]
impl Layer for ArchiveLayer {
    fn prefix(&self) -> &VirtualPath {
        &self.prefix
    }

    async fn list_children(&self, dir: &VirtualPath) -> BTreeSet<String> {
        if !dir.starts_with(&self.prefix) {
            return mount_step(&self.prefix, dir);
        }

        // Keys under `dir` are contiguous in the ordered index. Taking the
        // next component of each one yields implicit directories too.
        self.index
            .range(dir.clone()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(dir))
            .filter_map(|key| key.next_below(dir))
            .map(str::to_string)
            .collect()
    }

    fn make_child(&self, parent: &Arc<Node>, name: &str) -> Node {
        let candidate = parent.path().join(name);
        if let Some(entry) = self.index.get(&candidate) {
            return Node::archive_entry(parent, name, Arc::clone(&self.archive), entry.clone());
        }
        if candidate == self.prefix
            || self.prefix.is_strictly_under(&candidate)
            || self.has_descendants(&candidate)
        {
            return Node::synthetic(parent, name);
        }
        Node::absent(parent, name)
    }

    fn describe(&self) -> String {
        format!("archive {} at {}", self.archive_path().display(), self.prefix)
    }
}

/// Upper bound on the buffer reserved up front for one entry.
const MAX_PREALLOC: u64 = 1 << 20;

/// Reopen `archive` and inflate the entry stored under `name`.
pub(crate) fn read_entry(archive: &Path, name: &str) -> VfsResult<Vec<u8>> {
    tracing::trace!(archive = %archive.display(), entry = name, "reopening archive");
    let file = File::open(archive).map_err(|e| VfsError::archive(archive, ZipError::Io(e)))?;
    let mut zip = ZipArchive::new(file).map_err(|e| VfsError::archive(archive, e))?;
    let mut entry = zip.by_name(name).map_err(|e| VfsError::archive(archive, e))?;

    // Header sizes are untrusted.
    let capacity = usize::try_from(entry.size().min(MAX_PREALLOC)).unwrap_or(0);
    let mut data = Vec::with_capacity(capacity);
    entry.read_to_end(&mut data)?;
    Ok(data)
}

/// Zip timestamps carry no zone; treat them as UTC.
fn zip_time(dt: zip::DateTime) -> Option<SystemTime> {
    let naive = chrono::NaiveDate::from_ymd_opt(dt.year().into(), dt.month().into(), dt.day().into())?
        .and_hms_opt(dt.hour().into(), dt.minute().into(), dt.second().into())?;
    Some(SystemTime::from(naive.and_utc()))
}
