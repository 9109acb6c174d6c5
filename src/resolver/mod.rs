pub mod repo_root;

pub use repo_root::{GitRepoRoot, NoRepoRoot, RepoRootResolver, StaticRepoRoot};

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cache::FsCache;
use crate::error::{KustomapError, Result};
use crate::parser::DocumentKind;
use crate::paths::{KUSTOMIZATION_FILE_NAMES, normalize_path};

/// How a raw reference is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionRegime {
    /// Relative to the referencing file's directory (Kustomize).
    FileRelative,
    /// Relative to the repository root containing the referencing file (Flux).
    RepositoryRoot,
}

impl From<DocumentKind> for ResolutionRegime {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Flux => Self::RepositoryRoot,
            DocumentKind::Standard => Self::FileRelative,
        }
    }
}

/// The outcome of resolving one raw reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An existing file: either the path itself or the kustomization file inside
    /// the referenced directory.
    Found(PathBuf),
    /// The referenced directory exists but holds no kustomization file.
    DirectoryWithoutKustomization(PathBuf),
    /// Nothing exists at the resolved path.
    Missing(PathBuf),
}

impl Resolution {
    /// The target to record in the reference map, only for `Found`.
    pub fn target(&self) -> Option<&Path> {
        match self {
            Self::Found(path) => Some(path),
            Self::DirectoryWithoutKustomization(_) | Self::Missing(_) => None,
        }
    }

    /// The path the reference points at, whether or not it exists.
    pub fn expected(&self) -> &Path {
        match self {
            Self::Found(path) | Self::DirectoryWithoutKustomization(path) | Self::Missing(path) => {
                path
            }
        }
    }
}

/// Turns raw references into absolute, normalized filesystem targets.
pub struct PathResolver {
    workspace_root: PathBuf,
    repo_roots: Box<dyn RepoRootResolver>,
    /// Directory -> repository root (or the workspace-root fallback).
    root_cache: RefCell<HashMap<PathBuf, PathBuf>>,
}

impl PathResolver {
    pub fn new(workspace_root: &Path, repo_roots: Box<dyn RepoRootResolver>) -> Self {
        Self {
            workspace_root: normalize_path(workspace_root),
            repo_roots,
            root_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Repository root containing `dir`, discovered once per directory.
    ///
    /// Falls back to the workspace root (with a warning) when discovery fails.
    pub fn repository_root(&self, dir: &Path) -> PathBuf {
        let dir = normalize_path(dir);
        if let Some(root) = self.root_cache.borrow().get(&dir) {
            return root.clone();
        }

        let root = match self.repo_roots.repo_root(&dir) {
            Some(root) => normalize_path(&root),
            None => {
                tracing::warn!(
                    "no repository root found for {}, resolving Flux paths against workspace root {}",
                    dir.display(),
                    self.workspace_root.display()
                );
                self.workspace_root.clone()
            }
        };

        self.root_cache.borrow_mut().insert(dir, root.clone());
        root
    }

    /// Forget discovered repository roots (e.g. after a branch switch).
    pub fn clear_root_cache(&self) {
        self.root_cache.borrow_mut().clear();
    }

    /// Anchor `raw` according to `regime`, without touching the filesystem.
    pub fn join_reference(
        &self,
        origin: &Path,
        regime: ResolutionRegime,
        raw: &str,
    ) -> Result<PathBuf> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid(origin, raw, "empty reference"));
        }
        if is_remote_reference(trimmed) {
            return Err(invalid(origin, raw, "remote references are not resolved"));
        }

        let reference = Path::new(trimmed);
        if reference.is_absolute() {
            return Ok(normalize_path(reference));
        }

        let origin_dir = origin
            .parent()
            .ok_or_else(|| invalid(origin, raw, "referencing file has no parent directory"))?;

        let joined = match regime {
            ResolutionRegime::FileRelative => origin_dir.join(reference),
            ResolutionRegime::RepositoryRoot => {
                let relative = trimmed.strip_prefix("./").unwrap_or(trimmed);
                self.repository_root(origin_dir).join(relative)
            }
        };

        Ok(normalize_path(&joined))
    }

    /// Resolve `raw` from `origin` to a concrete target, expanding directories to
    /// the kustomization file they contain.
    pub fn resolve(
        &self,
        cache: &FsCache,
        origin: &Path,
        regime: ResolutionRegime,
        raw: &str,
    ) -> Result<Resolution> {
        let resolved = self.join_reference(origin, regime, raw)?;

        if cache.is_directory(&resolved) {
            for name in KUSTOMIZATION_FILE_NAMES {
                let candidate = resolved.join(name);
                if cache.is_file(&candidate) {
                    return Ok(Resolution::Found(candidate));
                }
            }
            return Ok(Resolution::DirectoryWithoutKustomization(resolved));
        }

        if cache.exists(&resolved) {
            Ok(Resolution::Found(resolved))
        } else {
            Ok(Resolution::Missing(resolved))
        }
    }
}

/// Kustomize remote targets (`github.com/org/repo//path`, URLs, scp-style git).
pub fn is_remote_reference(raw: &str) -> bool {
    raw.contains("://")
        || raw.starts_with("git@")
        || raw.starts_with("github.com/")
        || raw.starts_with("gitlab.com/")
        || raw.starts_with("bitbucket.org/")
}

fn invalid(origin: &Path, raw: &str, reason: &str) -> KustomapError {
    KustomapError::InvalidReference {
        origin: origin.to_path_buf(),
        reference: raw.to_owned(),
        reason: reason.to_owned(),
    }
}
