//! kasane: browse and edit a layered filesystem from the shell.
//!
//! Usage:
//!   # Layers from a config file
//!   kasane --config kasane.ron tree /
//!
//!   # Ad-hoc mounts, highest precedence first
//!   kasane -m /target=target/webapp -m /virtual=src/main/webapp \
//!          -m /lib/bootstrap=bootstrap-5.3.zip ls /lib/bootstrap/css
//!
//!   # Write through the overlay
//!   echo 'body{}' | kasane -m /target=out put /target/site.css

mod commands;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Layered overlay filesystem browser.
#[derive(Parser, Debug)]
#[command(name = "kasane")]
#[command(about = "Browse a layered overlay of directories and zip archives")]
struct Args {
    /// RON file listing the layers
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra layer as PREFIX=PATH (.zip/.jar mount as archives); repeatable,
    /// applied after the config file's layers
    #[arg(short, long = "mount", value_name = "PREFIX=PATH")]
    mounts: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file's content
    Cat { path: String },
    /// Show a node's attributes and backing
    Stat { path: String },
    /// Print the tree under a directory
    Tree {
        #[arg(default_value = "/")]
        path: String,
        /// Stop descending after this many levels
        #[arg(short, long)]
        depth: Option<usize>,
    },
    /// Write stdin to a file
    Put { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let fs = commands::build_fs(args.config.as_ref(), &args.mounts)?;
    tracing::debug!(?fs, "filesystem ready");

    let mut stdout = std::io::stdout().lock();
    match args.command {
        Command::Ls { path } => commands::ls(&fs, &path, &mut stdout).await?,
        Command::Cat { path } => commands::cat(&fs, &path, &mut stdout).await?,
        Command::Stat { path } => commands::stat(&fs, &path, &mut stdout).await?,
        Command::Tree { path, depth } => commands::tree(&fs, &path, depth, &mut stdout).await?,
        Command::Put { path } => {
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await?;
            commands::put(&fs, &path, &data).await?;
        }
    }
    stdout.flush()?;
    Ok(())
}
