use std::path::PathBuf;

use crate::parser::ReferenceField;

use super::edge::ReferenceKind;

/// A reference whose target did not resolve to an existing file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MissingReference {
    /// The kustomization file holding the reference.
    pub source: PathBuf,
    /// The field the reference was read from.
    pub field: ReferenceField,
    /// The reference as written.
    pub raw: String,
    /// Where the reference points after resolution.
    pub expected: PathBuf,
    /// True when `expected` is an existing directory without a kustomization file.
    pub directory_exists: bool,
}

/// Where a resolved target came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOrigin {
    pub field: ReferenceField,
    /// The reference as written.
    pub raw: String,
    /// The resolved, existing target.
    pub target: PathBuf,
}

/// What the indexer remembers about one processed YAML file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Modification time (ns since the epoch) observed when the file was processed.
    pub mtime: u64,
    /// Size observed alongside `mtime`.
    pub len: u64,
    /// Resolved, deduplicated targets in first-seen order.
    pub references: Vec<PathBuf>,
    /// Every resolved reference with its field and raw text, duplicates included.
    pub origins: Vec<ReferenceOrigin>,
    /// Any document is a Flux Kustomization.
    pub is_flux: bool,
    /// Any document is a Flux or standard kustomization.
    pub is_kustomization: bool,
    /// References that resolved to nothing.
    pub missing: Vec<MissingReference>,
}

impl FileMetadata {
    /// Regime recorded on back-references emitted by this file.
    pub fn kind(&self) -> ReferenceKind {
        if self.is_flux {
            ReferenceKind::Flux
        } else {
            ReferenceKind::K8s
        }
    }
}
