mod cli;
mod output;

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use kustomap::logging::init_logging;
use kustomap::paths::absolute_normalized;
use kustomap::resolver::{GitRepoRoot, RepoRootResolver, StaticRepoRoot};
use kustomap::watcher::coordinator::run_event_loop;
use kustomap::watcher::start_watcher;
use kustomap::{Indexer, KustomapConfig, build_index};
use output::IndexStats;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(
        cli.command,
        Commands::Index { verbose: true, .. } | Commands::Watch { verbose: true, .. }
    );
    init_logging(verbose);

    let repo_root = cli.repo_root.as_deref().map(absolute_normalized);
    let repo_roots = move || -> Box<dyn RepoRootResolver> {
        match &repo_root {
            Some(root) => Box::new(StaticRepoRoot(root.clone())),
            None => Box::new(GitRepoRoot),
        }
    };

    match cli.command {
        Commands::Index { path, json, .. } => {
            let start = Instant::now();
            let indexer = build_index(&path, repo_roots())?;
            let stats = IndexStats::collect(&indexer, start.elapsed().as_secs_f64());
            output::print_summary(&stats, json);
        }

        Commands::Refs { file, path, json } => {
            let indexer = build_index(&path, repo_roots())?;
            let file = absolute_normalized(&file);
            ensure_indexed(&indexer, &file)?;
            output::print_references(&indexer.references_for_file(&file), indexer.root(), json);
        }

        Commands::Backrefs { file, path, json } => {
            let indexer = build_index(&path, repo_roots())?;
            let file = absolute_normalized(&file);
            output::print_back_references(
                &indexer.back_references_for_file(&file),
                indexer.root(),
                json,
            );
        }

        Commands::Check { path, json } => {
            let indexer = build_index(&path, repo_roots())?;
            let missing = indexer.all_missing_references();
            output::print_missing(&missing, indexer.root(), json);
            if !missing.is_empty() {
                std::process::exit(1);
            }
        }

        Commands::Watch { path, no_cache, .. } => {
            let mut config = KustomapConfig::load(&path);
            if no_cache {
                config.cache.enabled = false;
            }
            let mut indexer = Indexer::new(&path, config, repo_roots());
            indexer.full_rebuild()?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start the event loop")?;
            runtime.block_on(watch(&mut indexer))?;
        }
    }

    Ok(())
}

/// `refs` only makes sense for files the index has seen.
fn ensure_indexed(indexer: &Indexer, file: &Path) -> Result<()> {
    if indexer.metadata(file).is_none() {
        anyhow::bail!(
            "{} is not a YAML file under {}",
            file.display(),
            indexer.root().display()
        );
    }
    Ok(())
}

async fn watch(indexer: &mut Indexer) -> Result<()> {
    let (_handle, rx) = start_watcher(indexer.root(), indexer.config())
        .context("failed to start the file watcher")?;
    let settings = indexer.config().watch.clone();

    tokio::select! {
        _ = run_event_loop(indexer, rx, settings) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping");
        }
    }
    Ok(())
}
