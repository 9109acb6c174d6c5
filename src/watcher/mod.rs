pub mod coordinator;
pub mod event;
pub mod incremental;

use std::path::{Component, Path};
use std::time::Duration;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;

use crate::config::{CONFIG_FILE, KustomapConfig};
use crate::error::Result;
use crate::paths::{is_yaml_path, normalize_path};
use crate::walker::is_excluded_by_config;

use event::WatchEvent;

/// Handle to a running watcher. Keeps the debouncer alive (dropping stops watching).
pub struct WatcherHandle {
    /// Keep alive: dropping the debouncer stops the OS watcher.
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    /// The bridge task forwarding events from std channel to tokio channel.
    _bridge_task: JoinHandle<()>,
}

/// OS-level coalescing only; batching for the index happens in the coordinator.
const OS_DEBOUNCE: Duration = Duration::from_millis(50);

/// Build a Gitignore matcher from the workspace root's .gitignore file.
/// Same source of truth as `walker::walk_yaml_files`. Without a .gitignore the
/// matcher matches nothing.
fn build_gitignore_matcher(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists()
        && let Some(err) = builder.add(&gitignore_path)
    {
        tracing::warn!("ignoring unreadable {}: {err}", gitignore_path.display());
    }
    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Start a debounced file watcher on `root`.
///
/// Returns a `WatcherHandle` (must be kept alive) and a tokio mpsc receiver that
/// yields classified `WatchEvent`s. Must be called from within a tokio runtime.
pub fn start_watcher(
    root: &Path,
    config: &KustomapConfig,
) -> Result<(WatcherHandle, tokio_mpsc::Receiver<WatchEvent>)> {
    let (std_tx, std_rx) = std::sync::mpsc::channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(OS_DEBOUNCE, move |res| {
        let _ = std_tx.send(res);
    })?;
    debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
    tracing::info!("watching {}", root.display());

    let gitignore = build_gitignore_matcher(root);
    let config = config.clone();

    let (tokio_tx, tokio_rx) = tokio_mpsc::channel::<WatchEvent>(1024);

    // Bridge: spawn_blocking to receive from std channel, classify, forward to tokio
    let root = root.to_path_buf();
    let bridge_task = tokio::task::spawn_blocking(move || {
        while let Ok(result) = std_rx.recv() {
            match result {
                Ok(events) => {
                    for debounced_event in events {
                        let path = debounced_event.path;
                        if let Some(watch_event) =
                            classify_event(&path, &root, &gitignore, &config)
                            && tokio_tx.blocking_send(watch_event).is_err()
                        {
                            return; // receiver dropped, shutdown
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("watcher error: {err:?}");
                }
            }
        }
    });

    Ok((
        WatcherHandle {
            _debouncer: debouncer,
            _bridge_task: bridge_task,
        },
        tokio_rx,
    ))
}

/// Classify a filesystem event path into a WatchEvent, or None if it should be ignored.
///
/// Filtering order:
/// 1. Hidden files and directories below the root (`.git`, `.flux`, ...), which
///    discovery skips as well
/// 2. .gitignore rules and `exclude` patterns (same as discovery)
/// 3. `kustomap.toml` at the root -> ConfigChanged
/// 4. YAML files -> Modified / Deleted by existence
/// 5. Directories -> Modified (refreshes cached existence), vanished extensionless
///    paths -> Deleted (a removed directory)
fn classify_event(
    path: &Path,
    root: &Path,
    gitignore: &Gitignore,
    config: &KustomapConfig,
) -> Option<WatchEvent> {
    if is_hidden_below(path, root) {
        return None;
    }

    let is_dir = path.is_dir();
    if path.starts_with(root)
        && gitignore
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    {
        return None;
    }
    if is_excluded_by_config(path, config) {
        return None;
    }

    if path.parent() == Some(root)
        && path.file_name().and_then(|n| n.to_str()) == Some(CONFIG_FILE)
    {
        return Some(WatchEvent::ConfigChanged);
    }

    let path = normalize_path(path);
    let exists = path.exists();

    if is_yaml_path(&path) && !is_dir {
        return Some(if exists {
            // notify-debouncer-mini doesn't distinguish creation from modification;
            // the incremental pipeline treats both the same.
            WatchEvent::Modified(path)
        } else {
            WatchEvent::Deleted(path)
        });
    }

    if is_dir {
        return Some(WatchEvent::Modified(path));
    }
    if !exists && path.extension().is_none() {
        return Some(WatchEvent::Deleted(path));
    }
    None
}

/// True when a component of `path` below `root` starts with a dot.
fn is_hidden_below(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.')))
}
