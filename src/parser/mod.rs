pub mod classify;
pub mod references;

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::{KustomapError, Result};

pub use classify::{DocumentKind, classify, is_flux_document, is_standard_document};
pub use references::{KustomizationFile, PatchTarget, PathEntry, RawReference, ReferenceField};

/// One YAML document of a file. Always a mapping at the root.
#[derive(Debug, Clone)]
pub struct Document {
    /// File the document was read from.
    pub path: PathBuf,
    /// Position of the document among the non-blank documents of the file.
    pub index: usize,
    /// Parsed root mapping.
    pub root: Value,
}

impl Document {
    /// Top-level string field, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.root.get(key).and_then(Value::as_str)
    }

    /// Whether a top-level key is present (with any value, including null).
    pub fn has_field(&self, key: &str) -> bool {
        self.root
            .as_mapping()
            .map(|m| m.contains_key(key))
            .unwrap_or(false)
    }
}

/// Split a multi-document YAML stream on lines that are exactly `---`.
///
/// Blank segments are dropped. Separator lines may carry trailing whitespace or a
/// `\r` but nothing else; `--- # comment` or `---foo` are document content.
pub fn split_documents(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        if line.trim_end() == "---" {
            segments.push(&text[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    segments.push(&text[start..]);

    segments
        .into_iter()
        .filter(|segment| !segment.trim().is_empty())
        .collect()
}

/// Parse a single document segment. Non-mapping documents yield `Ok(None)`.
fn parse_document(path: &Path, index: usize, segment: &str) -> Result<Option<Document>> {
    let value: Value = serde_yaml::from_str(segment).map_err(|source| KustomapError::Yaml {
        path: path.to_path_buf(),
        index,
        source,
    })?;

    if !value.is_mapping() {
        return Ok(None);
    }

    Ok(Some(Document {
        path: path.to_path_buf(),
        index,
        root: value,
    }))
}

/// Parse every document of a file independently.
///
/// A malformed document is logged and dropped; its siblings are still returned.
pub fn parse_documents(path: &Path, text: &str) -> Vec<Document> {
    let mut documents = Vec::new();

    for (index, segment) in split_documents(text).into_iter().enumerate() {
        match parse_document(path, index, segment) {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => {}
            Err(err) => tracing::warn!("{err}"),
        }
    }

    documents
}

/// Classify and extract every kustomization document in `text`.
pub fn parse_kustomizations(path: &Path, text: &str) -> Vec<KustomizationFile> {
    parse_documents(path, text)
        .iter()
        .filter_map(|doc| classify(doc).map(|kind| KustomizationFile::extract(doc, kind)))
        .collect()
}

/// Read `path` and return one [`KustomizationFile`] per kustomization document.
///
/// Unreadable files yield an empty list.
pub fn parse_kustomization_file(path: &Path) -> Vec<KustomizationFile> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_kustomizations(path, &text),
        Err(err) => {
            tracing::debug!("cannot read {}: {err}", path.display());
            Vec::new()
        }
    }
}

/// True if any document of the file is a Flux or standard kustomization.
pub fn is_kustomization_file(path: &Path) -> bool {
    !parse_kustomization_file(path).is_empty()
}

/// True if any document of the file is a Flux Kustomization custom resource.
pub fn is_flux_kustomization_file(path: &Path) -> bool {
    parse_kustomization_file(path)
        .iter()
        .any(|k| k.kind == DocumentKind::Flux)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_exact_separator_lines() {
        let text = "a: 1\n---\nb: 2\n---   \nc: 3\n";
        let docs = split_documents(text);
        assert_eq!(docs, vec!["a: 1\n", "b: 2\n", "c: 3\n"]);
    }

    #[test]
    fn test_split_drops_blank_segments() {
        let text = "---\n\n---\na: 1\n---\n   \n";
        let docs = split_documents(text);
        assert_eq!(docs, vec!["a: 1\n"]);
    }

    #[test]
    fn test_split_keeps_separator_lookalikes() {
        let text = "a: |\n  ---x\nb: 2\n";
        assert_eq!(split_documents(text).len(), 1);
    }

    #[test]
    fn test_split_handles_crlf() {
        let text = "a: 1\r\n---\r\nb: 2\r\n";
        assert_eq!(split_documents(text).len(), 2);
    }

    #[test]
    fn test_malformed_document_does_not_block_siblings() {
        let text = "resources: [a.yaml\n---\nkind: Kustomization\napiVersion: kustomize.config.k8s.io/v1beta1\n";
        let docs = parse_documents(Path::new("/w/kustomization.yaml"), text);
        assert_eq!(docs.len(), 1, "the valid document should survive");
        assert_eq!(docs[0].index, 1, "document index counts the broken one");
        assert_eq!(docs[0].str_field("kind"), Some("Kustomization"));
    }

    #[test]
    fn test_non_mapping_documents_are_dropped() {
        let text = "- a\n- b\n---\njust a string\n---\nkey: value\n";
        let docs = parse_documents(Path::new("/w/x.yaml"), text);
        assert_eq!(docs.len(), 1);
        assert!(docs[0].has_field("key"));
    }

    #[test]
    fn test_parse_kustomizations_skips_plain_manifests() {
        let text = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
---
apiVersion: kustomize.config.k8s.io/v1beta1
kind: Kustomization
resources:
  - deployment.yaml
";
        let found = parse_kustomizations(Path::new("/w/mixed.yaml"), text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DocumentKind::Standard);
        assert_eq!(found[0].document_index, 1);
    }

    #[test]
    fn test_file_level_predicates() {
        let dir = tempfile::tempdir().unwrap();
        let flux = dir.path().join("flux.yaml");
        std::fs::write(
            &flux,
            "apiVersion: kustomize.toolkit.fluxcd.io/v1\nkind: Kustomization\nspec:\n  path: ./apps\n",
        )
        .unwrap();
        let standard = dir.path().join("kustomization.yaml");
        std::fs::write(&standard, "resources:\n  - a.yaml\nnamePrefix: dev-\n").unwrap();
        let plain = dir.path().join("cm.yaml");
        std::fs::write(&plain, "apiVersion: v1\nkind: ConfigMap\n").unwrap();

        assert!(is_kustomization_file(&flux));
        assert!(is_flux_kustomization_file(&flux));
        assert!(is_kustomization_file(&standard));
        assert!(!is_flux_kustomization_file(&standard));
        assert!(!is_kustomization_file(&plain));
        assert!(!is_kustomization_file(&dir.path().join("absent.yaml")));
    }
}
