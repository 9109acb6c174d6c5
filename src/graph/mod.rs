pub mod edge;
pub mod node;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

pub use edge::{BackReference, ReferenceKind};
pub use node::{FileMetadata, MissingReference, ReferenceOrigin};

/// The bidirectional reference index: forward lists and their exact inverse.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReferenceMap {
    /// File -> resolved targets, ordered and deduplicated (first occurrence wins).
    file_references: HashMap<PathBuf, Vec<PathBuf>>,
    /// Target -> files referencing it, one entry per referrer.
    file_back_references: HashMap<PathBuf, BTreeSet<BackReference>>,
}

impl ReferenceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward references of `file` (empty when unknown).
    pub fn references(&self, file: &Path) -> &[PathBuf] {
        self.file_references
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Back-references pointing at `file`, ordered by referrer.
    pub fn back_references(&self, file: &Path) -> Vec<BackReference> {
        self.file_back_references
            .get(file)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Referring files of `file`, without their kinds.
    pub fn referrers(&self, file: &Path) -> Vec<PathBuf> {
        self.file_back_references
            .get(file)
            .map(|set| set.iter().map(|b| b.source.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether `file` has a forward entry (possibly empty).
    pub fn contains_file(&self, file: &Path) -> bool {
        self.file_references.contains_key(file)
    }

    /// Files with at least one back-reference.
    pub fn targets(&self) -> impl Iterator<Item = &PathBuf> {
        self.file_back_references.keys()
    }

    /// Number of files with a forward entry.
    pub fn file_count(&self) -> usize {
        self.file_references.len()
    }

    /// Total number of forward edges.
    pub fn reference_count(&self) -> usize {
        self.file_references.values().map(Vec::len).sum()
    }

    /// Store the forward list of `file` and insert `{file, kind}` into the back-reference
    /// bucket of every target.
    ///
    /// Insertion is idempotent. Targets dropped since the previous list must be
    /// retracted first with [`ReferenceMap::retract`].
    pub fn link(&mut self, file: &Path, targets: Vec<PathBuf>, kind: ReferenceKind) {
        for target in &targets {
            self.insert_back_reference(target, BackReference::new(file, kind));
        }
        self.file_references.insert(file.to_path_buf(), targets);
    }

    /// Remove `source` from the back-reference buckets of `targets`.
    pub fn retract<'a>(&mut self, source: &Path, targets: impl IntoIterator<Item = &'a PathBuf>) {
        for target in targets {
            self.remove_back_reference(target, source);
        }
    }

    /// Drop the forward list of `file` and every back-reference it produced.
    /// Returns the old targets.
    pub fn remove_references(&mut self, file: &Path) -> Vec<PathBuf> {
        let old = self.file_references.remove(file).unwrap_or_default();
        for target in &old {
            self.remove_back_reference(target, file);
        }
        old
    }

    /// Strip a single dangling `target` from the forward list of `file`.
    /// Returns whether anything was removed.
    pub fn prune_reference(&mut self, file: &Path, target: &Path) -> bool {
        let Some(targets) = self.file_references.get_mut(file) else {
            return false;
        };
        let before = targets.len();
        targets.retain(|t| t != target);
        let pruned = targets.len() != before;
        if pruned {
            self.remove_back_reference(target, file);
        }
        pruned
    }

    /// Remove and return the whole back-reference bucket of `target`.
    pub fn take_back_references(&mut self, target: &Path) -> BTreeSet<BackReference> {
        self.file_back_references.remove(target).unwrap_or_default()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.file_references.clear();
        self.file_back_references.clear();
    }

    /// Verify that the forward and back maps are exact inverses.
    ///
    /// Returns a description of every violation found; empty means consistent.
    /// `kind_of` supplies the expected kind for a referring file.
    pub fn check_consistency(&self, kind_of: impl Fn(&Path) -> ReferenceKind) -> Vec<String> {
        let mut problems = Vec::new();

        for (file, targets) in &self.file_references {
            let expected = BackReference::new(file, kind_of(file));
            for target in targets {
                let present = self
                    .file_back_references
                    .get(target)
                    .is_some_and(|set| set.contains(&expected));
                if !present {
                    problems.push(format!(
                        "{} -> {} has no matching back-reference",
                        file.display(),
                        target.display()
                    ));
                }
            }
        }

        for (target, set) in &self.file_back_references {
            if set.is_empty() {
                problems.push(format!("empty back-reference bucket for {}", target.display()));
            }
            for back in set {
                let present = self
                    .file_references
                    .get(&back.source)
                    .is_some_and(|targets| targets.contains(target));
                if !present {
                    problems.push(format!(
                        "{} <- {} ({}) has no matching forward reference",
                        target.display(),
                        back.source.display(),
                        back.kind
                    ));
                }
            }
        }

        problems
    }

    /// Idempotent: one entry per referring file, whatever the kind.
    fn insert_back_reference(&mut self, target: &Path, back: BackReference) {
        let bucket = self
            .file_back_references
            .entry(target.to_path_buf())
            .or_default();
        bucket.retain(|b| b.source != back.source || b.kind == back.kind);
        bucket.insert(back);
    }

    /// Remove every entry of `source` from the bucket of `target`; drop empty buckets.
    fn remove_back_reference(&mut self, target: &Path, source: &Path) {
        if let Some(bucket) = self.file_back_references.get_mut(target) {
            bucket.retain(|b| b.source != source);
            if bucket.is_empty() {
                self.file_back_references.remove(target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    fn k8s(_: &Path) -> ReferenceKind {
        ReferenceKind::K8s
    }

    #[test]
    fn test_link_populates_both_sides() {
        let mut map = ReferenceMap::new();
        map.link(
            &p("/w/overlay/kustomization.yaml"),
            vec![p("/w/base/kustomization.yaml"), p("/w/overlay/patch.yaml")],
            ReferenceKind::K8s,
        );

        assert_eq!(
            map.references(&p("/w/overlay/kustomization.yaml")),
            &[p("/w/base/kustomization.yaml"), p("/w/overlay/patch.yaml")]
        );
        assert_eq!(
            map.back_references(&p("/w/base/kustomization.yaml")),
            vec![BackReference::new(
                &p("/w/overlay/kustomization.yaml"),
                ReferenceKind::K8s
            )]
        );
        assert!(map.check_consistency(k8s).is_empty());
    }

    #[test]
    fn test_retract_then_link_replaces_stale_targets() {
        let mut map = ReferenceMap::new();
        let file = p("/w/k.yaml");
        map.link(&file, vec![p("/w/a.yaml"), p("/w/b.yaml")], ReferenceKind::K8s);
        map.retract(&file, &[p("/w/a.yaml")]);
        map.link(&file, vec![p("/w/b.yaml"), p("/w/c.yaml")], ReferenceKind::K8s);

        assert!(map.back_references(&p("/w/a.yaml")).is_empty());
        assert_eq!(map.back_references(&p("/w/b.yaml")).len(), 1);
        assert_eq!(map.back_references(&p("/w/c.yaml")).len(), 1);
        assert!(map.check_consistency(k8s).is_empty());
    }

    #[test]
    fn test_relinking_is_idempotent_and_kind_changes_replace() {
        let mut map = ReferenceMap::new();
        let file = p("/w/app.yaml");
        map.link(&file, vec![p("/w/a.yaml")], ReferenceKind::K8s);
        map.link(&file, vec![p("/w/a.yaml")], ReferenceKind::K8s);
        assert_eq!(map.back_references(&p("/w/a.yaml")).len(), 1);

        map.link(&file, vec![p("/w/a.yaml")], ReferenceKind::Flux);
        assert_eq!(
            map.back_references(&p("/w/a.yaml")),
            vec![BackReference::new(&file, ReferenceKind::Flux)]
        );
    }

    #[test]
    fn test_missing_retract_is_detected() {
        let mut map = ReferenceMap::new();
        let file = p("/w/k.yaml");
        map.link(&file, vec![p("/w/a.yaml")], ReferenceKind::K8s);
        map.link(&file, vec![p("/w/b.yaml")], ReferenceKind::K8s);
        assert_eq!(map.check_consistency(k8s).len(), 1);
    }

    #[test]
    fn test_remove_references_drops_empty_buckets() {
        let mut map = ReferenceMap::new();
        let file = p("/w/k.yaml");
        map.link(&file, vec![p("/w/a.yaml")], ReferenceKind::K8s);
        let old = map.remove_references(&file);

        assert_eq!(old, vec![p("/w/a.yaml")]);
        assert!(!map.contains_file(&file));
        assert_eq!(map, ReferenceMap::new());
    }

    #[test]
    fn test_prune_reference_touches_only_the_dangling_entry() {
        let mut map = ReferenceMap::new();
        let one = p("/w/one.yaml");
        let two = p("/w/two.yaml");
        map.link(&one, vec![p("/w/gone.yaml"), p("/w/kept.yaml")], ReferenceKind::K8s);
        map.link(&two, vec![p("/w/kept.yaml")], ReferenceKind::K8s);

        assert!(map.prune_reference(&one, &p("/w/gone.yaml")));
        assert!(!map.prune_reference(&one, &p("/w/gone.yaml")));

        assert_eq!(map.references(&one), &[p("/w/kept.yaml")]);
        assert_eq!(map.references(&two), &[p("/w/kept.yaml")]);
        assert_eq!(map.referrers(&p("/w/kept.yaml")), vec![one, two]);
        assert!(map.check_consistency(k8s).is_empty());
    }

    #[test]
    fn test_check_consistency_reports_orphans() {
        let mut map = ReferenceMap::new();
        map.insert_back_reference(
            &p("/w/a.yaml"),
            BackReference::new(&p("/w/ghost.yaml"), ReferenceKind::K8s),
        );
        let problems = map.check_consistency(k8s);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("ghost.yaml"));
    }

    #[test]
    fn test_counts() {
        let mut map = ReferenceMap::new();
        map.link(&p("/w/x.yaml"), vec![p("/w/a"), p("/w/b")], ReferenceKind::Flux);
        map.link(&p("/w/y.yaml"), Vec::new(), ReferenceKind::K8s);
        assert_eq!(map.file_count(), 2);
        assert_eq!(map.reference_count(), 2);
    }
}
