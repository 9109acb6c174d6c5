use std::path::{Path, PathBuf};
use std::process::Command;

/// Finds the version-control repository root that contains a directory.
///
/// Flux resolves `spec.path` inside the checked-out source repository, so the
/// resolver needs this root. Kept behind a trait so tests can substitute a fixed
/// answer instead of invoking `git`.
pub trait RepoRootResolver {
    /// Repository root containing `dir`, or `None` if there is none (or discovery failed).
    fn repo_root(&self, dir: &Path) -> Option<PathBuf>;
}

/// Asks the `git` CLI (`git rev-parse --show-toplevel`).
#[derive(Debug, Default, Clone, Copy)]
pub struct GitRepoRoot;

impl RepoRootResolver for GitRepoRoot {
    fn repo_root(&self, dir: &Path) -> Option<PathBuf> {
        let output = match Command::new("git")
            .arg("rev-parse")
            .arg("--show-toplevel")
            .current_dir(dir)
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!("git unavailable in {}: {err}", dir.display());
                return None;
            }
        };
        if !output.status.success() {
            tracing::debug!(
                "git rev-parse failed in {}: {}",
                dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        let stdout = String::from_utf8(output.stdout).ok()?;
        let root = stdout.trim();
        if root.is_empty() {
            return None;
        }
        Some(PathBuf::from(root))
    }
}

/// Always answers with the same root. Used for `--repo-root` and in tests.
#[derive(Debug, Clone)]
pub struct StaticRepoRoot(pub PathBuf);

impl RepoRootResolver for StaticRepoRoot {
    fn repo_root(&self, _dir: &Path) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Never finds a repository; every lookup falls back to the workspace root.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRepoRoot;

impl RepoRootResolver for NoRepoRoot {
    fn repo_root(&self, _dir: &Path) -> Option<PathBuf> {
        None
    }
}
