//! Subcommand implementations. Output goes to any `Write` so tests can
//! capture it.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use kasane_vfs::{FsConfig, LayerSource, LayeredFs, Node, NodeKind};

/// Parse a `PREFIX=PATH` mount. Paths ending in `.zip` or `.jar` mount as
/// archives, everything else as a directory.
pub fn parse_mount(spec: &str) -> Result<(String, LayerSource)> {
    let Some((prefix, location)) = spec.split_once('=') else {
        bail!("mount must look like PREFIX=PATH, got {spec:?}");
    };
    if location.is_empty() {
        bail!("mount {spec:?} has no path");
    }
    let location = PathBuf::from(location);
    let is_archive = location
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip") || e.eq_ignore_ascii_case("jar"));
    let source = if is_archive {
        LayerSource::Archive(location)
    } else {
        LayerSource::Directory(location)
    };
    Ok((prefix.to_string(), source))
}

/// Config file layers first, then `--mount` layers in command-line order.
pub fn build_fs(config: Option<&PathBuf>, mounts: &[String]) -> Result<LayeredFs> {
    let mut fs_config = match config {
        Some(path) => FsConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => FsConfig::default(),
    };
    for spec in mounts {
        let (prefix, source) = parse_mount(spec)?;
        fs_config = fs_config.with_layer(&prefix, source);
    }
    if fs_config.layers.is_empty() {
        tracing::warn!("no layers configured; every path is an empty directory");
    }
    Ok(LayeredFs::from_config(&fs_config)?)
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Real => "real",
        NodeKind::ArchiveEntry => "archive",
        NodeKind::Synthetic => "synthetic",
        NodeKind::Absent => "absent",
        NodeKind::Alias => "alias",
        NodeKind::LateBound => "late-bound",
    }
}

async fn type_char(node: &Node) -> char {
    if node.is_dir().await { 'd' } else { '-' }
}

async fn existing(fs: &LayeredFs, path: &str) -> Result<Node> {
    let node = fs.resolve(path).await;
    if !node.exists().await {
        bail!("{path}: no such file or directory");
    }
    Ok(node)
}

pub async fn ls(fs: &LayeredFs, path: &str, out: &mut impl Write) -> Result<()> {
    let dir = existing(fs, path).await?;
    if !dir.is_dir().await {
        writeln!(out, "{}", dir.name())?;
        return Ok(());
    }
    for child in fs.list_children(&dir).await {
        writeln!(
            out,
            "{} {:<9} {:>10} {}",
            type_char(&child).await,
            kind_label(child.kind()),
            child.len().await,
            child.name()
        )?;
    }
    Ok(())
}

pub async fn cat(fs: &LayeredFs, path: &str, out: &mut impl Write) -> Result<()> {
    let node = fs.resolve(path).await;
    let data = node
        .read_to_end()
        .await
        .with_context(|| format!("reading {path}"))?;
    out.write_all(&data)?;
    Ok(())
}

pub async fn stat(fs: &LayeredFs, path: &str, out: &mut impl Write) -> Result<()> {
    let node = fs.resolve(path).await;
    let attr = node.stat().await.with_context(|| format!("stat {path}"))?;
    let modified = DateTime::<Utc>::from(attr.mtime).to_rfc3339_opts(SecondsFormat::Secs, true);

    writeln!(out, "path:     {}", node.path())?;
    writeln!(out, "kind:     {}", kind_label(node.kind()))?;
    writeln!(out, "type:     {}", if attr.is_dir() { "directory" } else { "file" })?;
    writeln!(out, "size:     {}", attr.size)?;
    writeln!(out, "modified: {modified}")?;
    writeln!(out, "writable: {}", attr.writable)?;
    if let Some(real) = node.real_path().await {
        writeln!(out, "real:     {}", real.display())?;
    }
    Ok(())
}

/// Indented listing of everything under `path`, down to `max_depth` levels.
pub async fn tree(
    fs: &LayeredFs,
    path: &str,
    max_depth: Option<usize>,
    out: &mut impl Write,
) -> Result<()> {
    let top = existing(fs, path).await?;
    writeln!(out, "{}", top.path())?;

    let mut stack: Vec<(Node, usize)> = fs
        .list_children(&top)
        .await
        .into_iter()
        .rev()
        .map(|n| (n, 1))
        .collect();

    while let Some((node, depth)) = stack.pop() {
        let is_dir = node.is_dir().await;
        let suffix = if is_dir { "/" } else { "" };
        writeln!(out, "{}{}{suffix}", "  ".repeat(depth), node.name())?;

        if is_dir && max_depth.is_none_or(|max| depth < max) {
            let children = fs.list_children(&node).await;
            stack.extend(children.into_iter().rev().map(|n| (n, depth + 1)));
        }
    }
    Ok(())
}

/// Replace the content at `path` with `data`.
pub async fn put(fs: &LayeredFs, path: &str, data: &[u8]) -> Result<()> {
    let node = fs.resolve(path).await;
    node.write_all(data)
        .await
        .with_context(|| format!("writing {path}"))?;
    tracing::debug!(path, bytes = data.len(), "wrote");
    Ok(())
}
