use super::Document;

/// Flux Kustomization API versions recognised as Flux resources.
pub const FLUX_API_VERSIONS: &[&str] = &[
    "kustomize.toolkit.fluxcd.io/v1",
    "kustomize.toolkit.fluxcd.io/v1beta1",
    "kustomize.toolkit.fluxcd.io/v1beta2",
];

/// API group prefix of standard Kustomize files.
pub const KUSTOMIZE_API_GROUP_PREFIX: &str = "kustomize.config.k8s.io/";

/// Keys characteristic of kustomization files written before `apiVersion`/`kind`
/// were required. Two or more of them mark a legacy kustomization.
pub const LEGACY_KUSTOMIZATION_FIELDS: &[&str] = &[
    "resources",
    "bases",
    "patchesStrategicMerge",
    "patchesJson6902",
    "configMapGenerator",
    "secretGenerator",
    "generatorOptions",
    "namePrefix",
    "nameSuffix",
    "commonLabels",
    "commonAnnotations",
];

const LEGACY_FIELD_THRESHOLD: usize = 2;

const KUSTOMIZATION_KIND: &str = "Kustomization";

/// Which kustomization flavour a document is. Determines the path-resolution regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Flux CD `Kustomization` custom resource: paths are repository-root relative.
    Flux,
    /// Kustomize kustomization file: paths are relative to the file's directory.
    Standard,
}

/// True iff the document is a Flux `Kustomization` in one of the known API versions.
pub fn is_flux_document(doc: &Document) -> bool {
    let api_version = match doc.str_field("apiVersion") {
        Some(v) => v,
        None => return false,
    };
    FLUX_API_VERSIONS.contains(&api_version) && doc.str_field("kind") == Some(KUSTOMIZATION_KIND)
}

/// True iff the document is a standard Kustomize kustomization.
///
/// With an `apiVersion`, the Kustomize API group and kind decide. Without one,
/// at least two legacy kustomization keys must be present.
pub fn is_standard_document(doc: &Document) -> bool {
    match doc.str_field("apiVersion") {
        Some(api_version) => {
            api_version.starts_with(KUSTOMIZE_API_GROUP_PREFIX)
                && doc.str_field("kind") == Some(KUSTOMIZATION_KIND)
        }
        None if doc.has_field("apiVersion") => false,
        None => {
            LEGACY_KUSTOMIZATION_FIELDS
                .iter()
                .filter(|field| doc.has_field(field))
                .count()
                >= LEGACY_FIELD_THRESHOLD
        }
    }
}

/// Classify a document. Flux takes precedence over standard.
pub fn classify(doc: &Document) -> Option<DocumentKind> {
    if is_flux_document(doc) {
        Some(DocumentKind::Flux)
    } else if is_standard_document(doc) {
        Some(DocumentKind::Standard)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_documents;
    use std::path::Path;

    fn doc(text: &str) -> Document {
        parse_documents(Path::new("/w/file.yaml"), text)
            .into_iter()
            .next()
            .expect("one document")
    }

    #[test]
    fn test_flux_versions_are_recognised() {
        for version in FLUX_API_VERSIONS {
            let d = doc(&format!("apiVersion: {version}\nkind: Kustomization\n"));
            assert!(is_flux_document(&d), "{version} should be Flux");
            assert_eq!(classify(&d), Some(DocumentKind::Flux));
        }
    }

    #[test]
    fn test_flux_requires_kustomization_kind() {
        let d = doc("apiVersion: kustomize.toolkit.fluxcd.io/v1\nkind: GitRepository\n");
        assert!(!is_flux_document(&d));
        assert_eq!(classify(&d), None);
    }

    #[test]
    fn test_unknown_flux_version_is_not_flux() {
        let d = doc("apiVersion: kustomize.toolkit.fluxcd.io/v2\nkind: Kustomization\n");
        assert!(!is_flux_document(&d));
    }

    #[test]
    fn test_standard_by_api_group() {
        let d = doc("apiVersion: kustomize.config.k8s.io/v1beta1\nkind: Kustomization\n");
        assert!(is_standard_document(&d));
        assert!(!is_flux_document(&d));
        assert_eq!(classify(&d), Some(DocumentKind::Standard));
    }

    #[test]
    fn test_component_kind_is_not_standard() {
        let d = doc("apiVersion: kustomize.config.k8s.io/v1alpha1\nkind: Component\n");
        assert!(!is_standard_document(&d));
        assert_eq!(classify(&d), None);
    }

    #[test]
    fn test_legacy_needs_two_characteristic_fields() {
        let one = doc("resources:\n  - a.yaml\n");
        assert!(!is_standard_document(&one), "a single key is not enough");

        let two = doc("resources:\n  - a.yaml\ncommonLabels:\n  app: web\n");
        assert!(is_standard_document(&two));

        let null_valued = doc("bases:\nnamePrefix:\n");
        assert!(is_standard_document(&null_valued), "presence counts, not value");
    }

    #[test]
    fn test_other_api_version_blocks_legacy_heuristic() {
        let d = doc("apiVersion: apps/v1\nkind: Deployment\nresources: []\nbases: []\n");
        assert!(!is_standard_document(&d));
    }

    #[test]
    fn test_plain_manifest_is_not_classified() {
        let d = doc("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n");
        assert_eq!(classify(&d), None);
    }
}
