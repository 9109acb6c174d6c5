use std::path::{Path, PathBuf};

/// Change notification fed to the index after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A YAML file appeared.
    Created(PathBuf),
    /// A YAML file's content changed.
    Modified(PathBuf),
    /// A YAML file disappeared.
    Deleted(PathBuf),
    /// `kustomap.toml` changed; triggers a full rebuild.
    ConfigChanged,
}

impl WatchEvent {
    /// The path the event is about, `None` for `ConfigChanged`.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Created(path) | Self::Modified(path) | Self::Deleted(path) => Some(path),
            Self::ConfigChanged => None,
        }
    }
}
