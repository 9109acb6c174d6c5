use std::path::{Path, PathBuf};

use crate::indexer::{FileUpdate, Indexer};
use crate::paths::normalize_path;
use crate::walker::walk_yaml_files;

use super::event::WatchEvent;

/// Handle a single watch event by performing an incremental index update.
///
/// For Created/Modified: reprocesses the file unless its mtime and size are
/// unchanged, then recomputes its back-referrers (one level) and any file whose
/// missing references were waiting for this path.
///
/// For Deleted: removes the file's own references, prunes the dangling entry from
/// every referrer and drops its cache entries.
///
/// Returns `true` if the event was handled, `false` for ConfigChanged (caller must
/// run a full rebuild).
pub fn handle_file_event(indexer: &mut Indexer, event: &WatchEvent) -> bool {
    match event {
        WatchEvent::Created(path) | WatchEvent::Modified(path) => {
            handle_modified(indexer, path, false);
            true
        }
        WatchEvent::Deleted(path) => {
            handle_deleted(indexer, path);
            true
        }
        WatchEvent::ConfigChanged => false,
    }
}

/// Handle a created or changed path. With `force`, the mtime short-circuit is skipped.
pub fn handle_modified(indexer: &mut Indexer, path: &Path, force: bool) -> FileUpdate {
    let path = normalize_path(path);
    indexer.cache().invalidate(&path);
    // A new file may live in a directory the cache still believes is missing.
    if let Some(parent) = path.parent() {
        indexer.cache().invalidate(parent);
    }

    if indexer.cache().is_directory(&path) {
        handle_directory(indexer, &path);
        return FileUpdate::Ignored;
    }

    let update = indexer.process_file(&path, force);
    match update {
        FileUpdate::Updated => {
            indexer.record_incremental();
            cascade(indexer, &path);
            relink_missing(indexer, &path);
        }
        FileUpdate::Removed => remove_deleted(indexer, &path),
        FileUpdate::Unchanged | FileUpdate::Ignored => {}
    }
    update
}

/// A directory appeared or changed (e.g. renamed into the workspace): index the
/// YAML files below it, then recompute files whose missing references pointed at
/// the directory or anything inside it.
fn handle_directory(indexer: &mut Indexer, dir: &Path) {
    let files = match walk_yaml_files(dir, indexer.config()) {
        Ok(files) => files,
        Err(err) => {
            tracing::warn!("cannot scan {}: {err:#}", dir.display());
            return;
        }
    };
    tracing::debug!("{} changed, scanning {} YAML file(s)", dir.display(), files.len());

    for file in &files {
        handle_modified(indexer, file, false);
    }
    for waiter in indexer.waiting_under(dir) {
        if indexer.process_file(&waiter, true) == FileUpdate::Updated {
            indexer.record_cascade();
        }
    }
}

/// Handle a deleted path (a file, or a directory with indexed files below it).
pub fn handle_deleted(indexer: &mut Indexer, path: &Path) {
    let path = normalize_path(path);
    indexer.cache().invalidate(&path);

    // Deleted and recreated before the event got here (editors saving via rename).
    if indexer.cache().exists(&path) {
        handle_modified(indexer, &path, false);
        return;
    }

    let below = indexer.indexed_paths_under(&path);
    remove_deleted(indexer, &path);
    for child in below {
        indexer.cache().invalidate(&child);
        remove_deleted(indexer, &child);
    }
}

fn remove_deleted(indexer: &mut Indexer, path: &Path) {
    let referrers = indexer.reference_map().referrers(path);
    indexer.remove_file(path);
    indexer.detach_target(path);
    indexer.cache().invalidate(path);
    indexer.record_incremental();

    if !referrers.is_empty() {
        tracing::debug!(
            "{} deleted, pruned from {} referrer(s)",
            path.display(),
            referrers.len()
        );
    }
}

/// Recompute every current back-referrer of `path`, one level deep.
fn cascade(indexer: &mut Indexer, path: &Path) {
    let referrers: Vec<PathBuf> = indexer
        .reference_map()
        .referrers(path)
        .into_iter()
        .filter(|referrer| referrer != path)
        .collect();

    for referrer in referrers {
        if indexer.process_file(&referrer, true) == FileUpdate::Updated {
            indexer.record_cascade();
        }
    }
}

/// Files that had a missing reference expecting `path` (or its directory) now
/// resolve again.
fn relink_missing(indexer: &mut Indexer, path: &Path) {
    for waiter in indexer.waiting_on(path) {
        tracing::debug!("{} may now resolve a reference of {}", path.display(), waiter.display());
        if indexer.process_file(&waiter, true) == FileUpdate::Updated {
            indexer.record_cascade();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KustomapConfig;
    use crate::graph::ReferenceKind;
    use crate::resolver::StaticRepoRoot;
    use std::fs;

    fn kustomization(body: &str) -> String {
        format!("apiVersion: kustomize.config.k8s.io/v1beta1\nkind: Kustomization\n{body}")
    }

    fn indexer(root: &Path) -> Indexer {
        let mut idx = Indexer::new(
            root,
            KustomapConfig::default(),
            Box::new(StaticRepoRoot(root.to_path_buf())),
        );
        idx.full_rebuild().unwrap();
        idx
    }

    #[test]
    fn test_modified_file_updates_forward_and_back_references() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.yaml"), "kind: ConfigMap\n").unwrap();
        fs::write(root.join("b.yaml"), "kind: Secret\n").unwrap();
        fs::write(root.join("kustomization.yaml"), kustomization("resources:\n  - a.yaml\n")).unwrap();

        let mut idx = indexer(root);
        let root = idx.root().to_path_buf();
        let k = root.join("kustomization.yaml");

        fs::write(&k, kustomization("resources:\n  - b.yaml\n  - a.yaml\n")).unwrap();
        assert!(handle_file_event(&mut idx, &WatchEvent::Modified(k.clone())));

        assert_eq!(idx.references_for_file(&k), vec![root.join("b.yaml"), root.join("a.yaml")]);

        fs::write(&k, kustomization("resources:\n  - b.yaml\n")).unwrap();
        handle_file_event(&mut idx, &WatchEvent::Modified(k.clone()));

        assert_eq!(idx.references_for_file(&k), vec![root.join("b.yaml")]);
        assert!(idx.back_references_for_file(&root.join("a.yaml")).is_empty());
        assert!(idx.check_consistency().is_empty());
        assert_eq!(idx.stats().incremental_updates, 2);
    }

    #[test]
    fn test_created_file_relinks_waiting_referrer() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("overlay")).unwrap();
        fs::write(root.join("overlay/kustomization.yaml"), kustomization("resources:\n  - ../base\n")).unwrap();

        let mut idx = indexer(root);
        let root = idx.root().to_path_buf();
        let overlay = root.join("overlay/kustomization.yaml");
        assert_eq!(idx.missing_references_for_file(&overlay).len(), 1);

        fs::create_dir_all(root.join("base")).unwrap();
        let base = root.join("base/kustomization.yaml");
        fs::write(&base, kustomization("resources: []\n")).unwrap();
        handle_file_event(&mut idx, &WatchEvent::Created(base.clone()));

        assert_eq!(idx.references_for_file(&overlay), vec![base.clone()]);
        assert!(idx.missing_references_for_file(&overlay).is_empty());
        assert_eq!(idx.back_references_for_file(&base).len(), 1);
        assert!(idx.check_consistency().is_empty());
    }

    #[test]
    fn test_cascade_recomputes_referrers_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("base")).unwrap();
        fs::write(root.join("base/kustomization.yaml"), kustomization("resources: []\n")).unwrap();
        fs::write(root.join("kustomization.yaml"), kustomization("resources:\n  - base\n")).unwrap();

        let mut idx = indexer(root);
        let base = idx.root().join("base/kustomization.yaml");

        fs::write(&base, kustomization("resources: []\nnamePrefix: x-\n")).unwrap();
        handle_file_event(&mut idx, &WatchEvent::Modified(base));

        assert_eq!(idx.stats().incremental_updates, 1);
        assert_eq!(idx.stats().cascaded_updates, 1);
    }

    #[test]
    fn test_unchanged_file_event_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("kustomization.yaml"), kustomization("resources: []\n")).unwrap();

        let mut idx = indexer(root);
        let k = idx.root().join("kustomization.yaml");
        assert_eq!(handle_modified(&mut idx, &k, false), FileUpdate::Unchanged);
        assert_eq!(idx.stats().incremental_updates, 0);
    }

    #[test]
    fn test_modified_event_for_vanished_file_is_a_delete() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.yaml"), "kind: ConfigMap\n").unwrap();
        fs::write(root.join("kustomization.yaml"), kustomization("resources:\n  - a.yaml\n")).unwrap();

        let mut idx = indexer(root);
        let root = idx.root().to_path_buf();
        fs::remove_file(root.join("a.yaml")).unwrap();
        handle_file_event(&mut idx, &WatchEvent::Modified(root.join("a.yaml")));

        assert!(idx.references_for_file(&root.join("kustomization.yaml")).is_empty());
        let missing = idx.missing_references_for_file(&root.join("kustomization.yaml"));
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].raw, "a.yaml");
    }

    #[test]
    fn test_deleted_directory_removes_indexed_files_below_it() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("apps/web")).unwrap();
        fs::write(root.join("apps/web/kustomization.yaml"), kustomization("resources:\n  - svc.yaml\n")).unwrap();
        fs::write(root.join("apps/web/svc.yaml"), "kind: Service\n").unwrap();
        fs::write(root.join("kustomization.yaml"), kustomization("resources:\n  - apps/web\n")).unwrap();

        let mut idx = indexer(root);
        let root = idx.root().to_path_buf();
        fs::remove_dir_all(root.join("apps")).unwrap();
        handle_file_event(&mut idx, &WatchEvent::Deleted(root.join("apps")));

        assert!(idx.references_for_file(&root.join("kustomization.yaml")).is_empty());
        assert!(idx.metadata(&root.join("apps/web/kustomization.yaml")).is_none());
        assert!(idx.back_references_for_file(&root.join("apps/web/svc.yaml")).is_empty());
        assert!(idx.check_consistency().is_empty());
    }

    #[test]
    fn test_directory_renamed_into_workspace_is_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("overlays/prod")).unwrap();
        fs::write(
            root.join("overlays/prod/kustomization.yaml"),
            kustomization("resources:\n  - ../../base\n"),
        )
        .unwrap();

        let mut idx = indexer(root);
        let root = idx.root().to_path_buf();
        let overlay = root.join("overlays/prod/kustomization.yaml");
        assert_eq!(idx.missing_references_for_file(&overlay).len(), 1);

        let staging = tempfile::tempdir().unwrap();
        let outside = staging.path().join("base");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("kustomization.yaml"), kustomization("resources:\n  - cm.yaml\n")).unwrap();
        fs::write(outside.join("cm.yaml"), "kind: ConfigMap\n").unwrap();
        fs::rename(&outside, root.join("base")).unwrap();

        // A rename produces one event for the directory and none for its contents.
        handle_file_event(&mut idx, &WatchEvent::Modified(root.join("base")));

        let base = root.join("base/kustomization.yaml");
        assert!(idx.metadata(&base).is_some());
        assert_eq!(idx.references_for_file(&overlay), vec![base.clone()]);
        assert_eq!(idx.references_for_file(&base), vec![root.join("base/cm.yaml")]);
        assert!(idx.missing_references_for_file(&overlay).is_empty());
        assert!(idx.check_consistency().is_empty());

        let incremental = idx.reference_map().clone();
        idx.full_rebuild().unwrap();
        assert_eq!(&incremental, idx.reference_map());
    }

    #[test]
    fn test_directory_event_heals_nested_directory_reference() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("kustomization.yaml"),
            kustomization("components:\n  - components/monitoring\n"),
        )
        .unwrap();

        let mut idx = indexer(root);
        let root = idx.root().to_path_buf();
        let top = root.join("kustomization.yaml");
        assert_eq!(idx.missing_references_for_file(&top).len(), 1);

        fs::create_dir_all(root.join("components/monitoring")).unwrap();
        fs::write(
            root.join("components/monitoring/kustomization.yaml"),
            kustomization("resources: []\n"),
        )
        .unwrap();
        handle_file_event(&mut idx, &WatchEvent::Modified(root.join("components")));

        assert_eq!(
            idx.references_for_file(&top),
            vec![root.join("components/monitoring/kustomization.yaml")]
        );
        assert!(idx.check_consistency().is_empty());
    }

    #[test]
    fn test_flux_kind_is_recorded_on_back_references() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("clusters/prod")).unwrap();
        fs::create_dir_all(root.join("apps")).unwrap();
        fs::write(root.join("apps/kustomization.yaml"), kustomization("resources: []\n")).unwrap();
        let app = root.join("clusters/prod/apps.yaml");
        fs::write(&app, "kind: ConfigMap\n").unwrap();

        let mut idx = indexer(root);
        let root = idx.root().to_path_buf();
        let app = root.join("clusters/prod/apps.yaml");
        fs::write(
            &app,
            "apiVersion: kustomize.toolkit.fluxcd.io/v1\nkind: Kustomization\nspec:\n  path: ./apps\n",
        )
        .unwrap();
        handle_file_event(&mut idx, &WatchEvent::Modified(app.clone()));

        let backs = idx.back_references_for_file(&root.join("apps/kustomization.yaml"));
        assert_eq!(backs.len(), 1);
        assert_eq!(backs[0].kind, ReferenceKind::Flux);
        assert!(idx.is_flux_kustomization_file(&app));
    }
}
