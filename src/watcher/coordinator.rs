//! Debouncing and mass-change detection between the OS watcher and the index.
//!
//! Every event invalidates its path in the filesystem cache right away and restarts
//! the debounce timer. When the timer elapses the pending batch (one entry per path,
//! last kind wins) is applied in a single pass. A burst of more than
//! `mass_change_threshold` events inside `mass_change_window` clears the cache and
//! turns the next flush into one full rebuild.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::mpsc as tokio_mpsc;

use crate::config::WatchConfig;
use crate::indexer::Indexer;

use super::event::WatchEvent;
use super::incremental::handle_file_event;

/// What a call to [`ChangeCoordinator::flush`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending.
    Idle,
    /// Pending events were applied one by one.
    Incremental { events: usize },
    /// The whole workspace was reindexed.
    FullRebuild { files: usize },
}

#[derive(Debug)]
pub struct ChangeCoordinator {
    settings: WatchConfig,
    /// Timestamps of events inside the current mass-change window.
    recent: VecDeque<Instant>,
    /// Pending events keyed by path.
    pending: BTreeMap<PathBuf, WatchEvent>,
    rebuild_requested: bool,
    config_changed: bool,
    last_event: Option<Instant>,
}

impl ChangeCoordinator {
    pub fn new(settings: WatchConfig) -> Self {
        Self {
            settings,
            recent: VecDeque::new(),
            pending: BTreeMap::new(),
            rebuild_requested: false,
            config_changed: false,
            last_event: None,
        }
    }

    /// Record one event observed at `now`.
    pub fn observe(&mut self, indexer: &mut Indexer, event: WatchEvent, now: Instant) {
        if let Some(path) = event.path() {
            indexer.cache().invalidate(path);
        }
        self.last_event = Some(now);

        let window = self.settings.mass_change_window();
        while let Some(&oldest) = self.recent.front() {
            if now.saturating_duration_since(oldest) > window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        self.recent.push_back(now);

        match event.path().map(PathBuf::from) {
            Some(path) => {
                self.pending.insert(path, event);
            }
            None => {
                self.config_changed = true;
                self.rebuild_requested = true;
            }
        }

        if self.recent.len() > self.settings.mass_change_threshold {
            tracing::info!(
                "{} change events within {:?}, switching to a full rebuild",
                self.recent.len(),
                window
            );
            indexer.cache().clear_all();
            self.recent.clear();
            self.pending.clear();
            self.rebuild_requested = true;
        }
    }

    /// When the pending work should be flushed, `None` if there is none.
    pub fn flush_deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() && !self.rebuild_requested {
            return None;
        }
        self.last_event.map(|last| last + self.settings.debounce())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.rebuild_requested
    }

    /// Apply the pending batch, or run the requested full rebuild instead.
    pub fn flush(&mut self, indexer: &mut Indexer) -> FlushOutcome {
        if self.rebuild_requested {
            self.rebuild_requested = false;
            self.pending.clear();

            if self.config_changed {
                self.config_changed = false;
                indexer.reload_config();
                indexer.cache().clear_all();
                self.settings = indexer.config().watch.clone();
            }

            let files = match indexer.full_rebuild() {
                Ok(files) => files,
                Err(err) => {
                    tracing::warn!("full rebuild failed: {err:#}");
                    0
                }
            };
            return FlushOutcome::FullRebuild { files };
        }

        if self.pending.is_empty() {
            return FlushOutcome::Idle;
        }

        let batch = std::mem::take(&mut self.pending);
        let events = batch.len();
        for event in batch.values() {
            handle_file_event(indexer, event);
        }
        tracing::info!("applied {events} change event(s)");
        FlushOutcome::Incremental { events }
    }
}

/// Feed events from `rx` into the index until the channel closes.
///
/// Runs on the caller's task; all index work happens here, one batch at a time.
pub async fn run_event_loop(
    indexer: &mut Indexer,
    mut rx: tokio_mpsc::Receiver<WatchEvent>,
    settings: WatchConfig,
) {
    let mut coordinator = ChangeCoordinator::new(settings);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => coordinator.observe(indexer, event, Instant::now()),
                None => {
                    coordinator.flush(indexer);
                    break;
                }
            },
            _ = wait_until(coordinator.flush_deadline()) => {
                coordinator.flush(indexer);
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
