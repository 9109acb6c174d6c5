use std::path::{Component, Path, PathBuf};

/// File names Kustomize itself looks for inside a directory, in lookup order.
pub const KUSTOMIZATION_FILE_NAMES: &[&str] = &["kustomization.yaml", "kustomization.yml"];

/// Extensionless name Kustomize also accepts for a standard kustomization file.
const LEGACY_KUSTOMIZATION_FILE_NAME: &str = "Kustomization";

const YAML_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Lexically normalize a path: drop `.` components and fold `..` into its parent.
///
/// No filesystem access and no symlink resolution, so the result is stable for
/// paths that do not exist yet. Applying it twice yields the same path.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` above the root stays at the root; above a relative start it is kept.
                match normalized.components().next_back() {
                    Some(Component::Normal(_)) => {
                        normalized.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => normalized.push(".."),
                }
            }
            Component::RootDir | Component::Normal(_) | Component::Prefix(_) => {
                normalized.push(component.as_os_str());
            }
        }
    }

    normalized
}

/// Make `path` absolute against the current directory (without touching the disk
/// beyond `current_dir`) and normalize it.
pub fn absolute_normalized(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_path(&absolute)
}

/// Returns true for `.yaml` / `.yml` files and the extensionless `Kustomization`.
pub fn is_yaml_path(path: &Path) -> bool {
    if path.file_name().and_then(|n| n.to_str()) == Some(LEGACY_KUSTOMIZATION_FILE_NAME) {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| YAML_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Returns true if the file name is one Kustomize treats as a kustomization file.
pub fn is_kustomization_file_name(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => {
            KUSTOMIZATION_FILE_NAMES.contains(&name) || name == LEGACY_KUSTOMIZATION_FILE_NAME
        }
        None => false,
    }
}

/// Render `path` relative to `root` for display, falling back to the full path.
pub fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
