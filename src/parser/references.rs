use std::path::PathBuf;

use serde::Deserialize;
use serde_yaml::Value;

use super::{Document, DocumentKind};

/// The kustomization field a reference was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceField {
    /// Flux `spec.path`.
    Path,
    Resources,
    Bases,
    Components,
    Patches,
    PatchesStrategicMerge,
    PatchesJson6902,
    Configurations,
    Crds,
    Generators,
    Transformers,
}

impl ReferenceField {
    /// The YAML key as written in the document.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Resources => "resources",
            Self::Bases => "bases",
            Self::Components => "components",
            Self::Patches => "patches",
            Self::PatchesStrategicMerge => "patchesStrategicMerge",
            Self::PatchesJson6902 => "patchesJson6902",
            Self::Configurations => "configurations",
            Self::Crds => "crds",
            Self::Generators => "generators",
            Self::Transformers => "transformers",
        }
    }
}

impl std::fmt::Display for ReferenceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selector attached to a patch entry (`target:`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchTarget {
    pub group: Option<String>,
    pub version: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    pub annotation_selector: Option<String>,
}

/// One entry of a path-bearing list.
#[derive(Debug, Clone, PartialEq)]
pub enum PathEntry {
    /// `- deployment.yaml`
    StringPath(String),
    /// `- path: patch.yaml` with an optional `target:` selector.
    ObjectPath {
        path: String,
        target: Option<PatchTarget>,
    },
    /// An inline patch (`patch:` body, no `path`). Valid, but names no file.
    InlinePatch,
}

impl PathEntry {
    /// The file path this entry names, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::StringPath(path) | Self::ObjectPath { path, .. } => Some(path.as_str()),
            Self::InlinePatch => None,
        }
    }
}

/// A raw, unresolved reference together with the field it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReference<'a> {
    pub field: ReferenceField,
    pub path: &'a str,
}

/// Kustomization view of one document: every path-bearing field, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct KustomizationFile {
    pub path: PathBuf,
    pub document_index: usize,
    pub kind: DocumentKind,
    /// Flux `spec.path`; always `None` for standard documents.
    pub source_path: Option<String>,
    pub resources: Vec<PathEntry>,
    pub bases: Vec<PathEntry>,
    pub components: Vec<PathEntry>,
    pub patches: Vec<PathEntry>,
    pub patches_strategic_merge: Vec<PathEntry>,
    pub patches_json6902: Vec<PathEntry>,
    pub configurations: Vec<PathEntry>,
    pub crds: Vec<PathEntry>,
    pub generators: Vec<PathEntry>,
    pub transformers: Vec<PathEntry>,
}

impl KustomizationFile {
    /// Extract the path-bearing fields of an already classified document.
    pub fn extract(doc: &Document, kind: DocumentKind) -> Self {
        let mut file = Self {
            path: doc.path.clone(),
            document_index: doc.index,
            kind,
            source_path: None,
            resources: Vec::new(),
            bases: Vec::new(),
            components: Vec::new(),
            patches: Vec::new(),
            patches_strategic_merge: Vec::new(),
            patches_json6902: Vec::new(),
            configurations: Vec::new(),
            crds: Vec::new(),
            generators: Vec::new(),
            transformers: Vec::new(),
        };

        match kind {
            DocumentKind::Flux => {
                let spec = match doc.root.get("spec") {
                    Some(spec) => spec,
                    None => return file,
                };
                file.source_path = spec.get("path").and_then(Value::as_str).map(str::to_owned);
                file.patches = patch_entries(spec, "patches", doc);
                file.patches_strategic_merge = patch_entries(spec, "patchesStrategicMerge", doc);
                file.patches_json6902 = patch_entries(spec, "patchesJson6902", doc);
                file.components = string_entries(spec, "components");
            }
            DocumentKind::Standard => {
                let root = &doc.root;
                file.resources = string_entries(root, "resources");
                file.bases = string_entries(root, "bases");
                file.components = string_entries(root, "components");
                file.patches = patch_entries(root, "patches", doc);
                file.patches_strategic_merge = patch_entries(root, "patchesStrategicMerge", doc);
                file.patches_json6902 = patch_entries(root, "patchesJson6902", doc);
                file.configurations = string_entries(root, "configurations");
                file.crds = string_entries(root, "crds");
                file.generators = string_entries(root, "generators");
                file.transformers = string_entries(root, "transformers");
            }
        }

        file
    }

    /// Field lists in resolution order for this document kind.
    fn fields(&self) -> Vec<(ReferenceField, &[PathEntry])> {
        match self.kind {
            DocumentKind::Flux => vec![
                (ReferenceField::Patches, self.patches.as_slice()),
                (ReferenceField::PatchesStrategicMerge, self.patches_strategic_merge.as_slice()),
                (ReferenceField::PatchesJson6902, self.patches_json6902.as_slice()),
                (ReferenceField::Components, self.components.as_slice()),
            ],
            DocumentKind::Standard => vec![
                (ReferenceField::Resources, self.resources.as_slice()),
                (ReferenceField::Bases, self.bases.as_slice()),
                (ReferenceField::Components, self.components.as_slice()),
                (ReferenceField::Patches, self.patches.as_slice()),
                (ReferenceField::PatchesStrategicMerge, self.patches_strategic_merge.as_slice()),
                (ReferenceField::PatchesJson6902, self.patches_json6902.as_slice()),
                (ReferenceField::Configurations, self.configurations.as_slice()),
                (ReferenceField::Crds, self.crds.as_slice()),
                (ReferenceField::Generators, self.generators.as_slice()),
                (ReferenceField::Transformers, self.transformers.as_slice()),
            ],
        }
    }

    /// Every file-naming reference in field iteration order. Inline patches are skipped.
    pub fn references(&self) -> Vec<RawReference<'_>> {
        let mut out = Vec::new();

        if let Some(path) = &self.source_path {
            out.push(RawReference {
                field: ReferenceField::Path,
                path,
            });
        }

        for (field, entries) in self.fields() {
            for entry in entries {
                if let Some(path) = entry.path() {
                    out.push(RawReference { field, path });
                }
            }
        }

        out
    }

    /// Number of inline patches across all patch fields.
    pub fn inline_patch_count(&self) -> usize {
        [&self.patches, &self.patches_strategic_merge, &self.patches_json6902]
            .iter()
            .flat_map(|entries| entries.iter())
            .filter(|entry| matches!(entry, PathEntry::InlinePatch))
            .count()
    }
}

fn sequence<'v>(parent: &'v Value, key: &str) -> &'v [Value] {
    parent
        .get(key)
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Plain path lists: strings only. Nulls and inline objects name no file.
fn string_entries(parent: &Value, key: &str) -> Vec<PathEntry> {
    sequence(parent, key)
        .iter()
        .filter_map(Value::as_str)
        .map(|s| PathEntry::StringPath(s.to_owned()))
        .collect()
}

/// Patch-family lists: string, object with `path`, or inline patch object.
fn patch_entries(parent: &Value, key: &str, doc: &Document) -> Vec<PathEntry> {
    sequence(parent, key)
        .iter()
        .filter_map(|value| match patch_entry(value) {
            Ok(entry) => entry,
            Err(reason) => {
                tracing::warn!(
                    "skipping {key} entry in document {} of {}: {reason}",
                    doc.index,
                    doc.path.display()
                );
                None
            }
        })
        .collect()
}

fn patch_entry(value: &Value) -> Result<Option<PathEntry>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(path) => Ok(Some(PathEntry::StringPath(path.clone()))),
        Value::Mapping(map) => match map.get("path") {
            None | Some(Value::Null) => Ok(Some(PathEntry::InlinePatch)),
            Some(Value::String(path)) => {
                let target = match map.get("target") {
                    None | Some(Value::Null) => None,
                    Some(raw) => Some(
                        serde_yaml::from_value::<PatchTarget>(raw.clone())
                            .map_err(|e| format!("invalid target selector: {e}"))?,
                    ),
                };
                Ok(Some(PathEntry::ObjectPath {
                    path: path.clone(),
                    target,
                }))
            }
            Some(other) => Err(format!("`path` must be a string, found {other:?}")),
        },
        other => Err(format!("unsupported entry {other:?}")),
    }
}
