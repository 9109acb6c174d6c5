use std::path::{Path, PathBuf};

/// Which regime produced a reference edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Emitted by a Flux Kustomization custom resource.
    Flux,
    /// Emitted by a standard Kustomize kustomization.
    K8s,
}

impl ReferenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flux => "flux",
            Self::K8s => "k8s",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target -> source edge: `source` references the file this entry is stored under.
///
/// Ordered by source path first, so a back-reference set iterates by referrer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct BackReference {
    /// The referencing kustomization file.
    pub source: PathBuf,
    /// The regime of the referencing file.
    pub kind: ReferenceKind,
}

impl BackReference {
    pub fn new(source: &Path, kind: ReferenceKind) -> Self {
        Self {
            source: source.to_path_buf(),
            kind,
        }
    }
}
