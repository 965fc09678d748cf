//! Kasane: a layered overlay filesystem.
//!
//! Several sources (real directories and zip archives) are each mounted at a
//! virtual prefix and merged into a single read/write tree. When two layers
//! offer the same name in the same directory, the layer registered first
//! wins, both for lookups and for listings.
//!
//! ```no_run
//! # async fn demo() -> kasane_vfs::VfsResult<()> {
//! use kasane_vfs::LayeredFs;
//!
//! let fs = LayeredFs::builder()
//!     .directory("/target", "target/webapp")
//!     .directory("/virtual", "src/main/webapp")
//!     .archive("/lib/bootstrap", "bootstrap-5.3.zip")?
//!     .build();
//!
//! let css = fs.resolve("/lib/bootstrap/css/bootstrap.css").await;
//! let bytes = css.read_to_end().await?;
//! fs.resolve("/target/bundle.css").await.write_all(&bytes).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Nodes materialized by the resolver are one of a closed set of kinds (see
//! [`NodeKind`]). Archive content is read-only; synthetic directories exist
//! only to reach mount points; absent nodes stand for paths nothing backs.

pub mod config;
pub mod context;
mod error;
mod fs;
pub mod layers;
mod node;
pub mod path;
mod types;

pub use config::{FsConfig, LayerConfig, LayerSource};
pub use error::{VfsError, VfsResult};
pub use fs::{LayeredFs, LayeredFsBuilder};
pub use layers::{ArchiveEntry, ArchiveLayer, DirectoryLayer, Layer};
pub use node::{Node, ReadStream, WriteStream};
pub use path::VirtualPath;
pub use types::{FileType, NodeAttr, NodeKind};
