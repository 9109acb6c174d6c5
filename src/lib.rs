//! Reference resolution and incremental indexing for Kustomize overlays and Flux
//! Kustomization resources.
//!
//! [`Indexer`] owns the bidirectional reference map and keeps it in sync with the
//! file tree through change events ([`watcher`]).

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod logging;
pub mod parser;
pub mod paths;
pub mod resolver;
pub mod walker;
pub mod watcher;

use std::path::Path;

pub use config::KustomapConfig;
pub use error::{KustomapError, Result};
pub use indexer::{FileUpdate, Indexer, UpdateStats};

use resolver::RepoRootResolver;

/// Load `kustomap.toml` from `root`, build the index and run one full rebuild.
pub fn build_index(
    root: &Path,
    repo_roots: Box<dyn RepoRootResolver>,
) -> anyhow::Result<Indexer> {
    let config = KustomapConfig::load(root);
    let mut indexer = Indexer::new(root, config, repo_roots);
    indexer.full_rebuild()?;
    Ok(indexer)
}
