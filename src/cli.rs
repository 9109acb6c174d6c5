use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Reference index for Kustomize overlays and Flux Kustomization resources.
///
/// kustomap resolves every path a kustomization points at (resources, bases,
/// components, patches, Flux `spec.path`, ...) and answers "what does this file
/// reference" and "who references this file" without re-reading the tree.
#[derive(Parser, Debug)]
#[command(
    name = "kustomap",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Resolve Flux paths against this directory instead of asking git for the
    /// repository root.
    #[arg(long, global = true)]
    pub repo_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a workspace and print a summary.
    Index {
        /// Path to the workspace root to index.
        path: PathBuf,

        /// Log each processed file to stderr.
        #[arg(short, long)]
        verbose: bool,

        /// Output results as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// List the files a kustomization references, in field order.
    Refs {
        /// The kustomization file (absolute, or relative to the current directory).
        file: PathBuf,

        /// Path to the workspace root to index.
        path: PathBuf,

        /// Output results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the kustomizations that reference a file.
    Backrefs {
        /// The referenced file (absolute, or relative to the current directory).
        file: PathBuf,

        /// Path to the workspace root to index.
        path: PathBuf,

        /// Output results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report references whose target does not exist. Exits with status 1 if any.
    Check {
        /// Path to the workspace root to index.
        path: PathBuf,

        /// Output results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Index a workspace, then keep the index in sync with file changes until
    /// interrupted.
    Watch {
        /// Path to the workspace root to watch.
        path: PathBuf,

        /// Bypass the filesystem cache (every existence check hits the disk).
        #[arg(long)]
        no_cache: bool,

        /// Log each processed file to stderr.
        #[arg(short, long)]
        verbose: bool,
    },
}
