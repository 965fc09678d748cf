//! Layer configuration.
//!
//! A filesystem is described by an ordered list of layers, highest
//! precedence first, each pairing a mount prefix with a backing source:
//!
//! ```ron
//! (
//!     layers: [
//!         (prefix: "/target", source: Directory("target/webapp")),
//!         (prefix: "/virtual", source: Directory("src/main/webapp")),
//!         (prefix: "/lib/bootstrap", source: Archive("~/.m2/bootstrap.zip")),
//!     ],
//! )
//! ```
//!
//! Locations are tilde-expanded, and relative ones are taken from the
//! directory holding the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{VfsError, VfsResult};
use crate::fs::LayeredFs;
use crate::layers::{ArchiveLayer, DirectoryLayer, Layer};

/// Where a layer's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerSource {
    /// A directory on the real filesystem.
    Directory(PathBuf),
    /// A zip archive.
    Archive(PathBuf),
}

impl LayerSource {
    pub fn location(&self) -> &Path {
        match self {
            LayerSource::Directory(p) | LayerSource::Archive(p) => p,
        }
    }
}

/// One `(prefix, kind, location)` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Virtual mount point; the root when omitted.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    pub source: LayerSource,
}

fn default_prefix() -> String {
    "/".to_string()
}

/// Ordered layer list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
    /// Directory that relative locations are resolved against. Set by
    /// [`FsConfig::load`]; the working directory otherwise.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl FsConfig {
    /// Parse a RON document.
    pub fn from_ron(text: &str) -> VfsResult<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Read and parse a config file; relative locations resolve against its
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VfsError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_ron(&text)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Serialize back to pretty RON.
    pub fn to_ron(&self) -> VfsResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| VfsError::config(e.to_string()))
    }

    /// Append a layer (lowest precedence so far).
    pub fn with_layer(mut self, prefix: &str, source: LayerSource) -> Self {
        self.layers.push(LayerConfig {
            prefix: prefix.to_string(),
            source,
        });
        self
    }

    /// Expand `~` and anchor relative locations at `base_dir`.
    fn resolve_location(&self, location: &Path) -> VfsResult<PathBuf> {
        let raw = location.to_str().ok_or_else(|| {
            VfsError::config(format!("location is not UTF-8: {}", location.display()))
        })?;
        let expanded = PathBuf::from(shellexpand::tilde(raw).as_ref());
        if expanded.is_absolute() {
            return Ok(expanded);
        }
        Ok(match &self.base_dir {
            Some(base) => base.join(expanded),
            None => expanded,
        })
    }

    /// Construct every layer, in order. Any archive that cannot be indexed
    /// aborts the whole build.
    pub fn build_layers(&self) -> VfsResult<Vec<Arc<dyn Layer>>> {
        let mut layers: Vec<Arc<dyn Layer>> = Vec::with_capacity(self.layers.len());
        for entry in &self.layers {
            let location = self.resolve_location(entry.source.location())?;
            let layer: Arc<dyn Layer> = match &entry.source {
                LayerSource::Directory(_) => Arc::new(DirectoryLayer::new(&entry.prefix, location)),
                LayerSource::Archive(_) => Arc::new(ArchiveLayer::open(&entry.prefix, location)?),
            };
            tracing::info!(layer = %layer.describe(), "mounted layer");
            layers.push(layer);
        }
        Ok(layers)
    }
}

impl LayeredFs {
    /// Build a filesystem from configuration.
    pub fn from_config(config: &FsConfig) -> VfsResult<Self> {
        Ok(Self::new(config.build_layers()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::archive::tests::write_zip;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"(
        layers: [
            (prefix: "/target", source: Directory("out")),
            (source: Directory("/abs/root")),
            (prefix: "/lib", source: Archive("deps/lib.zip")),
        ],
    )"#;

    #[test]
    fn test_parse_sample() {
        let config = FsConfig::from_ron(SAMPLE).unwrap();
        assert_eq!(config.layers.len(), 3);
        assert_eq!(config.layers[0].prefix, "/target");
        assert_eq!(config.layers[0].source, LayerSource::Directory("out".into()));
        assert_eq!(config.layers[1].prefix, "/");
        assert_eq!(config.layers[2].source, LayerSource::Archive("deps/lib.zip".into()));
    }

    #[test]
    fn test_parse_error() {
        let result = FsConfig::from_ron("(layers: [ (source: Floppy(\"a\")) ])");
        assert!(matches!(result, Err(VfsError::Ron(_))));
    }

    #[test]
    fn test_ron_round_trip_preserves_order() {
        let config = FsConfig::default()
            .with_layer("/a", LayerSource::Directory("one".into()))
            .with_layer("/b", LayerSource::Archive("two.zip".into()));
        let text = config.to_ron().unwrap();
        assert_eq!(FsConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_relative_locations_use_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kasane.ron");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = FsConfig::load(&path).unwrap();
        assert_eq!(config.base_dir.as_deref(), Some(dir.path()));
        assert_eq!(
            config.resolve_location(Path::new("out")).unwrap(),
            dir.path().join("out")
        );
        assert_eq!(
            config.resolve_location(Path::new("/abs/root")).unwrap(),
            PathBuf::from("/abs/root")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = FsConfig::load(dir.path().join("absent.ron"));
        assert!(matches!(result, Err(VfsError::Config(_))));
    }

    #[tokio::test]
    async fn test_from_config_builds_layers_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        std::fs::write(dir.path().join("out/a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("deps")).unwrap();
        write_zip(&dir.path().join("deps/lib.zip"), &[("x/y.js", b"y")]);

        let mut config = FsConfig::default()
            .with_layer("/target", LayerSource::Directory("out".into()))
            .with_layer("/lib", LayerSource::Archive("deps/lib.zip".into()));
        config.base_dir = Some(dir.path().to_path_buf());

        let fs = LayeredFs::from_config(&config).unwrap();
        assert_eq!(fs.layers().len(), 2);
        assert_eq!(fs.layers()[0].prefix().to_string(), "/target");
        assert_eq!(fs.resolve("/target/a.txt").await.read_to_end().await.unwrap(), b"a");
        assert_eq!(fs.resolve("/lib/x/y.js").await.read_to_end().await.unwrap(), b"y");
    }

    #[test]
    fn test_from_config_fails_on_bad_archive() {
        let dir = TempDir::new().unwrap();
        let mut config =
            FsConfig::default().with_layer("/lib", LayerSource::Archive("missing.zip".into()));
        config.base_dir = Some(dir.path().to_path_buf());

        assert!(matches!(
            LayeredFs::from_config(&config),
            Err(VfsError::Archive { .. })
        ));
    }
}
