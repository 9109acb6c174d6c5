//! The workspace index: one owned structure holding the reference map, the
//! filesystem cache, the resolver and per-file bookkeeping.
//!
//! Mutation goes through [`Indexer::full_rebuild`], [`Indexer::refresh_file`] and the
//! change handlers in [`crate::watcher::incremental`]. Consumers use the read API.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::cache::{FsCache, StatEntry};
use crate::config::KustomapConfig;
use crate::error::KustomapError;
use crate::graph::{
    BackReference, FileMetadata, MissingReference, ReferenceKind, ReferenceMap, ReferenceOrigin,
};
use crate::parser::{self, DocumentKind, KustomizationFile};
use crate::paths::{absolute_normalized, is_kustomization_file_name, normalize_path};
use crate::resolver::{PathResolver, RepoRootResolver, Resolution, ResolutionRegime};
use crate::walker::walk_yaml_files;
use crate::watcher::incremental;

/// Counters of indexing work, cumulative over the lifetime of an [`Indexer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateStats {
    /// Completed full rebuilds.
    pub full_rebuilds: u64,
    /// Files reprocessed because a change event named them.
    pub incremental_updates: u64,
    /// Back-referrers recomputed after one of their targets changed.
    pub cascaded_updates: u64,
    /// Events ignored because mtime and size matched the last processed state.
    pub skipped_unchanged: u64,
}

/// Result of processing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileUpdate {
    /// mtime and size unchanged; nothing recomputed.
    Unchanged,
    /// References recomputed.
    Updated,
    /// The file is gone (or unreadable) and was removed from the index.
    Removed,
    /// The path is not a YAML file (e.g. a directory); ignored.
    Ignored,
}

/// What resolving every document of a file produced.
struct ResolvedFile {
    references: Vec<PathBuf>,
    origins: Vec<ReferenceOrigin>,
    missing: Vec<MissingReference>,
    is_flux: bool,
    is_kustomization: bool,
}

pub struct Indexer {
    root: PathBuf,
    config: KustomapConfig,
    references: ReferenceMap,
    cache: FsCache,
    resolver: PathResolver,
    metadata: HashMap<PathBuf, FileMetadata>,
    /// File -> set of targets it currently references; the delta source for retraction.
    dependencies: HashMap<PathBuf, HashSet<PathBuf>>,
    /// Expected path of a missing reference -> files waiting on it.
    missing: HashMap<PathBuf, BTreeSet<PathBuf>>,
    stats: UpdateStats,
}

impl Indexer {
    /// Create an empty index for the workspace at `root`. Call [`Indexer::full_rebuild`]
    /// to populate it.
    pub fn new(root: &Path, config: KustomapConfig, repo_roots: Box<dyn RepoRootResolver>) -> Self {
        let root = absolute_normalized(root);
        let cache = FsCache::new(config.cache.enabled);
        let resolver = PathResolver::new(&root, repo_roots);
        Self {
            root,
            config,
            references: ReferenceMap::new(),
            cache,
            resolver,
            metadata: HashMap::new(),
            dependencies: HashMap::new(),
            missing: HashMap::new(),
            stats: UpdateStats::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &KustomapConfig {
        &self.config
    }

    pub fn cache(&self) -> &FsCache {
        &self.cache
    }

    pub fn reference_map(&self) -> &ReferenceMap {
        &self.references
    }

    pub fn stats(&self) -> UpdateStats {
        self.stats
    }

    /// Metadata of a processed YAML file.
    pub fn metadata(&self, path: &Path) -> Option<&FileMetadata> {
        self.metadata.get(&normalize_path(path))
    }

    /// Every processed YAML file, kustomization or not.
    pub fn indexed_files(&self) -> impl Iterator<Item = (&PathBuf, &FileMetadata)> {
        self.metadata.iter()
    }

    // ---- read API -------------------------------------------------------------

    /// Resolved targets of `path`, in field order, without duplicates.
    pub fn references_for_file(&self, path: &Path) -> Vec<PathBuf> {
        self.references.references(&normalize_path(path)).to_vec()
    }

    /// Files referencing `path`, with the regime of each referrer.
    pub fn back_references_for_file(&self, path: &Path) -> Vec<BackReference> {
        self.references.back_references(&normalize_path(path))
    }

    /// References of `path` that resolved to nothing.
    pub fn missing_references_for_file(&self, path: &Path) -> Vec<MissingReference> {
        self.metadata(path)
            .map(|meta| meta.missing.clone())
            .unwrap_or_default()
    }

    /// Every missing reference in the workspace, ordered by referencing file.
    pub fn all_missing_references(&self) -> Vec<MissingReference> {
        let mut all: Vec<MissingReference> = self
            .metadata
            .values()
            .flat_map(|meta| meta.missing.iter().cloned())
            .collect();
        all.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.raw.cmp(&b.raw)));
        all
    }

    /// Uses indexed state when available, otherwise reads and classifies the file.
    pub fn is_kustomization_file(&self, path: &Path) -> bool {
        match self.metadata(path) {
            Some(meta) => meta.is_kustomization,
            None => parser::is_kustomization_file(path),
        }
    }

    /// Uses indexed state when available, otherwise reads and classifies the file.
    pub fn is_flux_kustomization_file(&self, path: &Path) -> bool {
        match self.metadata(path) {
            Some(meta) => meta.is_flux,
            None => parser::is_flux_kustomization_file(path),
        }
    }

    pub fn cached_file_exists(&self, path: &Path) -> bool {
        self.cache.exists(path)
    }

    pub fn cached_is_directory(&self, path: &Path) -> bool {
        self.cache.is_directory(path)
    }

    /// One [`KustomizationFile`] per kustomization document of `path`.
    pub fn parse_kustomization_file(&self, path: &Path) -> Vec<KustomizationFile> {
        parser::parse_kustomization_file(path)
    }

    // ---- refresh entry points -------------------------------------------------

    /// Drop all state and index every YAML file under the workspace root once.
    ///
    /// Returns the number of files processed.
    pub fn full_rebuild(&mut self) -> anyhow::Result<usize> {
        let start = Instant::now();

        self.references.clear();
        self.metadata.clear();
        self.dependencies.clear();
        self.missing.clear();
        self.resolver.clear_root_cache();

        let files = walk_yaml_files(&self.root, &self.config)?;
        for file in &files {
            self.process_file(file, true);
        }

        self.stats.full_rebuilds += 1;
        tracing::info!(
            "indexed {} YAML files ({} kustomizations, {} references) in {:.2}s",
            files.len(),
            self.references.file_count(),
            self.references.reference_count(),
            start.elapsed().as_secs_f64()
        );
        Ok(files.len())
    }

    /// Forget cached state for `path` and recompute it (and its referrers) now,
    /// regardless of its mtime.
    pub fn refresh_file(&mut self, path: &Path) -> FileUpdate {
        let path = normalize_path(path);
        self.cache.invalidate(&path);
        incremental::handle_modified(self, &path, true)
    }

    /// Re-read `kustomap.toml`. The cache is rebuilt when its toggle changed.
    pub fn reload_config(&mut self) {
        let config = KustomapConfig::load(&self.root);
        if config.cache.enabled != self.cache.is_enabled() {
            let state = if config.cache.enabled { "enabled" } else { "disabled" };
            tracing::info!("filesystem cache {state}");
            self.cache = FsCache::new(config.cache.enabled);
        }
        self.config = config;
    }

    // ---- per-file processing (used by the incremental handlers) ------------------

    pub(crate) fn record_incremental(&mut self) {
        self.stats.incremental_updates += 1;
    }

    pub(crate) fn record_cascade(&mut self) {
        self.stats.cascaded_updates += 1;
    }

    /// Files whose missing references expect `path`, or its directory when `path`
    /// is a kustomization file name.
    pub(crate) fn waiting_on(&self, path: &Path) -> Vec<PathBuf> {
        let mut waiting: BTreeSet<PathBuf> = self.missing.get(path).cloned().unwrap_or_default();
        if is_kustomization_file_name(path)
            && let Some(dir) = path.parent()
            && let Some(dir_waiters) = self.missing.get(dir)
        {
            waiting.extend(dir_waiters.iter().cloned());
        }
        waiting.remove(path);
        waiting.into_iter().collect()
    }

    /// Files with a missing reference expecting `dir` or any path below it.
    pub(crate) fn waiting_under(&self, dir: &Path) -> Vec<PathBuf> {
        let waiting: BTreeSet<PathBuf> = self
            .missing
            .iter()
            .filter(|(expected, _)| expected.starts_with(dir))
            .flat_map(|(_, sources)| sources.iter().cloned())
            .collect();
        waiting.into_iter().collect()
    }

    /// Indexed files and reference targets strictly below the directory `dir`, sorted.
    pub(crate) fn indexed_paths_under(&self, dir: &Path) -> Vec<PathBuf> {
        let below: BTreeSet<PathBuf> = self
            .metadata
            .keys()
            .chain(self.references.targets())
            .filter(|p| p.as_path() != dir && p.starts_with(dir))
            .cloned()
            .collect();
        below.into_iter().collect()
    }

    /// Process one file: recompute its references unless mtime and size are unchanged
    /// (or `force` is set). A path that no longer exists is removed from the index.
    pub(crate) fn process_file(&mut self, path: &Path, force: bool) -> FileUpdate {
        let path = normalize_path(path);

        let Some(stat) = self.cache.stat(&path) else {
            self.remove_file(&path);
            return FileUpdate::Removed;
        };
        if !stat.is_file {
            return FileUpdate::Ignored;
        }

        if !force
            && let Some(meta) = self.metadata.get(&path)
            && meta.mtime == stat.mtime
            && meta.len == stat.len
        {
            tracing::debug!("{} unchanged, skipping", path.display());
            self.stats.skipped_unchanged += 1;
            return FileUpdate::Unchanged;
        }

        let Some(text) = self.read_file(&path) else {
            self.remove_file(&path);
            return FileUpdate::Removed;
        };

        let documents = parser::parse_kustomizations(&path, &text);
        let resolved = self.resolve_documents(&path, &documents);
        self.apply(&path, stat, resolved);
        FileUpdate::Updated
    }

    /// Remove `path` as a referencing file: its forward list, the back-references it
    /// produced, its missing references and its metadata. Back-references pointing
    /// *at* `path` are left alone.
    pub(crate) fn remove_file(&mut self, path: &Path) {
        self.references.remove_references(path);
        self.dependencies.remove(path);
        if let Some(meta) = self.metadata.remove(path) {
            self.unindex_missing(path, &meta.missing);
        }
    }

    /// Handle the disappearance of `path` as a target: every referrer loses only its
    /// dangling entry, which becomes a missing reference.
    pub(crate) fn detach_target(&mut self, path: &Path) {
        let referrers = self.references.take_back_references(path);
        for back in referrers {
            let source = back.source;
            self.references.prune_reference(&source, path);
            if let Some(deps) = self.dependencies.get_mut(&source) {
                deps.remove(path);
            }
            if let Some(meta) = self.metadata.get_mut(&source) {
                meta.references.retain(|t| t != path);
                let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut meta.origins)
                    .into_iter()
                    .partition(|origin| origin.target == path);
                meta.origins = kept;
                meta.missing.extend(gone.into_iter().map(|origin| MissingReference {
                    source: source.clone(),
                    field: origin.field,
                    raw: origin.raw,
                    expected: origin.target,
                    directory_exists: false,
                }));
            }
            self.missing.entry(path.to_path_buf()).or_default().insert(source);
        }
    }

    /// Read with the safety net: on failure revalidate the cache entry and retry once.
    fn read_file(&self, path: &Path) -> Option<String> {
        let read = || {
            std::fs::read_to_string(path).map_err(|source| KustomapError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        match read() {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!("{err}, revalidating");
                if !self.cache.validate_and_refresh(path) {
                    return None;
                }
                match read() {
                    Ok(text) => Some(text),
                    Err(err) => {
                        tracing::warn!("{err}, treating as deleted");
                        None
                    }
                }
            }
        }
    }

    fn resolve_documents(&self, path: &Path, documents: &[KustomizationFile]) -> ResolvedFile {
        let mut references = Vec::new();
        let mut origins = Vec::new();
        let mut seen = HashSet::new();
        let mut missing = Vec::new();

        for document in documents {
            let regime = ResolutionRegime::from(document.kind);
            for raw in document.references() {
                match self.resolver.resolve(&self.cache, path, regime, raw.path) {
                    Ok(Resolution::Found(target)) => {
                        if seen.insert(target.clone()) {
                            references.push(target.clone());
                        }
                        origins.push(ReferenceOrigin {
                            field: raw.field,
                            raw: raw.path.to_owned(),
                            target,
                        });
                    }
                    Ok(unresolved) => missing.push(MissingReference {
                        source: path.to_path_buf(),
                        field: raw.field,
                        raw: raw.path.to_owned(),
                        expected: unresolved.expected().to_path_buf(),
                        directory_exists: matches!(
                            unresolved,
                            Resolution::DirectoryWithoutKustomization(_)
                        ),
                    }),
                    Err(err @ KustomapError::InvalidReference { .. }) => {
                        tracing::debug!("{err}");
                    }
                    Err(err) => {
                        tracing::warn!("skipping {} in {}: {err}", raw.field, path.display());
                    }
                }
            }
        }

        ResolvedFile {
            references,
            origins,
            missing,
            is_flux: documents.iter().any(|d| d.kind == DocumentKind::Flux),
            is_kustomization: !documents.is_empty(),
        }
    }

    /// Patch the reference map with a freshly resolved file.
    fn apply(&mut self, path: &Path, stat: StatEntry, resolved: ResolvedFile) {
        let kind = if resolved.is_flux {
            ReferenceKind::Flux
        } else {
            ReferenceKind::K8s
        };

        let new_deps: HashSet<PathBuf> = resolved.references.iter().cloned().collect();
        let old_deps = self.dependencies.remove(path).unwrap_or_default();
        let stale: Vec<&PathBuf> = old_deps.difference(&new_deps).collect();
        if !stale.is_empty() {
            tracing::debug!("{}: retracting {} stale references", path.display(), stale.len());
        }
        self.references.retract(path, stale);

        if resolved.is_kustomization {
            self.references.link(path, resolved.references.clone(), kind);
            self.dependencies.insert(path.to_path_buf(), new_deps);
        } else {
            // Stopped being (or never was) a kustomization.
            self.references.remove_references(path);
        }

        if let Some(old) = self.metadata.remove(path) {
            self.unindex_missing(path, &old.missing);
        }
        for reference in &resolved.missing {
            self.missing
                .entry(reference.expected.clone())
                .or_default()
                .insert(path.to_path_buf());
        }

        tracing::debug!(
            "{}: {} references, {} missing",
            path.display(),
            resolved.references.len(),
            resolved.missing.len()
        );

        self.metadata.insert(
            path.to_path_buf(),
            FileMetadata {
                mtime: stat.mtime,
                len: stat.len,
                references: resolved.references,
                origins: resolved.origins,
                is_flux: resolved.is_flux,
                is_kustomization: resolved.is_kustomization,
                missing: resolved.missing,
            },
        );
    }

    fn unindex_missing(&mut self, source: &Path, missing: &[MissingReference]) {
        for reference in missing {
            if let Some(waiters) = self.missing.get_mut(&reference.expected) {
                waiters.remove(source);
                if waiters.is_empty() {
                    self.missing.remove(&reference.expected);
                }
            }
        }
    }

    /// Kind recorded for back-references emitted by `path`.
    pub fn kind_of(&self, path: &Path) -> ReferenceKind {
        self.metadata
            .get(path)
            .map(FileMetadata::kind)
            .unwrap_or(ReferenceKind::K8s)
    }

    /// Symmetry violations between forward and back references (empty when consistent).
    pub fn check_consistency(&self) -> Vec<String> {
        self.references.check_consistency(|file| self.kind_of(file))
    }
}
