use std::path::{Path, PathBuf};

use crate::config::KustomapConfig;
use crate::paths::{is_yaml_path, normalize_path};

/// Walk a workspace and collect every YAML file that may hold a kustomization.
///
/// Respects `.gitignore` rules (even outside a git repository), skips hidden
/// directories, and applies any additional exclusions from `config.exclude`.
/// Standard kustomizations are found by file name, but Flux Kustomization resources
/// can live in any YAML file, so every `.yaml`/`.yml` file is returned.
///
/// The result is normalized and sorted so that a full rebuild processes files in a
/// deterministic order.
pub fn walk_yaml_files(root: &Path, config: &KustomapConfig) -> anyhow::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git repository.
        .require_git(false)
        .build();

    let mut files = Vec::new();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("skipping walk entry: {err}");
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        if is_excluded_by_config(path, config) {
            continue;
        }

        if !is_yaml_path(path) {
            continue;
        }

        tracing::trace!("discovered {}", path.display());
        files.push(normalize_path(path));
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Returns true if `path` matches any exclusion pattern from config.
///
/// Patterns are matched against the full path and against each path component,
/// so both `**/vendor/**` and `vendor` work.
pub fn is_excluded_by_config(path: &Path, config: &KustomapConfig) -> bool {
    let patterns = match &config.exclude {
        Some(p) => p,
        None => return false,
    };

    let path_str = path.to_string_lossy();

    for pattern in patterns {
        let Ok(matcher) = glob::Pattern::new(pattern) else {
            tracing::debug!("ignoring invalid exclude pattern {pattern:?}");
            continue;
        };
        if matcher.matches(&path_str) {
            return true;
        }
        for component in path.components() {
            if let Some(s) = component.as_os_str().to_str()
                && matcher.matches(s)
            {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_walk_finds_yaml_files_sorted() {
        let dir = tmp();
        let root = dir.path();
        fs::create_dir_all(root.join("overlays/prod")).unwrap();
        fs::create_dir_all(root.join("base")).unwrap();
        fs::write(root.join("overlays/prod/kustomization.yaml"), "bases: []\n").unwrap();
        fs::write(root.join("base/kustomization.yml"), "resources: []\n").unwrap();
        fs::write(root.join("base/deployment.yaml"), "kind: Deployment\n").unwrap();
        fs::write(root.join("base/Kustomization"), "resources: []\n").unwrap();
        fs::write(root.join("README.md"), "# Hello").unwrap();
        fs::write(root.join("values.json"), "{}").unwrap();

        let files = walk_yaml_files(root, &KustomapConfig::default()).unwrap();
        assert_eq!(
            names(&files, root),
            vec![
                "base/Kustomization",
                "base/deployment.yaml",
                "base/kustomization.yml",
                "overlays/prod/kustomization.yaml",
            ]
        );
    }

    #[test]
    fn test_walk_respects_exclude_patterns() {
        let dir = tmp();
        let root = dir.path();
        fs::create_dir_all(root.join("vendor/chart")).unwrap();
        fs::write(root.join("vendor/chart/kustomization.yaml"), "resources: []\n").unwrap();
        fs::write(root.join("kustomization.yaml"), "resources: []\n").unwrap();

        let config = KustomapConfig {
            exclude: Some(vec!["vendor".to_string()]),
            ..KustomapConfig::default()
        };

        let files = walk_yaml_files(root, &config).unwrap();
        assert_eq!(names(&files, root), vec!["kustomization.yaml"]);
    }

    #[test]
    fn test_walk_respects_gitignore_outside_git() {
        let dir = tmp();
        let root = dir.path();
        fs::create_dir_all(root.join("rendered")).unwrap();
        fs::write(root.join(".gitignore"), "rendered/\n").unwrap();
        fs::write(root.join("rendered/all.yaml"), "kind: List\n").unwrap();
        fs::write(root.join("app.yaml"), "kind: ConfigMap\n").unwrap();

        let files = walk_yaml_files(root, &KustomapConfig::default()).unwrap();
        assert_eq!(names(&files, root), vec!["app.yaml"]);
    }

    #[test]
    fn test_walk_rejects_non_directory() {
        let dir = tmp();
        let file = dir.path().join("file.yaml");
        fs::write(&file, "a: 1\n").unwrap();
        assert!(walk_yaml_files(&file, &KustomapConfig::default()).is_err());
    }
}
