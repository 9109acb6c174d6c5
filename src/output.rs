use std::path::{Path, PathBuf};

use serde::Serialize;

use kustomap::graph::{BackReference, MissingReference};
use kustomap::paths::display_relative;
use kustomap::{Indexer, UpdateStats};

/// Aggregate statistics produced by an indexing run.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    /// YAML files discovered and processed.
    pub file_count: usize,
    /// Files holding at least one kustomization document.
    pub kustomization_count: usize,
    /// Files holding at least one Flux Kustomization.
    pub flux_count: usize,
    /// Resolved forward references across all files.
    pub reference_count: usize,
    /// References whose target does not exist.
    pub missing_count: usize,
    /// Wall-clock time for the indexing run in seconds.
    pub elapsed_secs: f64,
    pub updates: UpdateStats,
}

impl IndexStats {
    pub fn collect(indexer: &Indexer, elapsed_secs: f64) -> Self {
        let mut stats = Self {
            file_count: 0,
            kustomization_count: 0,
            flux_count: 0,
            reference_count: indexer.reference_map().reference_count(),
            missing_count: 0,
            elapsed_secs,
            updates: indexer.stats(),
        };
        for (_, meta) in indexer.indexed_files() {
            stats.file_count += 1;
            stats.kustomization_count += usize::from(meta.is_kustomization);
            stats.flux_count += usize::from(meta.is_flux);
            stats.missing_count += meta.missing.len();
        }
        stats
    }
}

/// Print a summary of the indexing run.
///
/// - `json = true`: emit a pretty-printed JSON object to stdout.
/// - `json = false`: emit a cargo-style human-readable summary to stdout.
///
/// If `stats.missing_count > 0`, a warning line is written to **stderr** so that
/// the stdout stream remains clean for downstream JSON consumers.
pub fn print_summary(stats: &IndexStats, json: bool) {
    if json {
        print_json(stats);
        return;
    }

    println!(
        "Indexed {} YAML files in {:.2}s",
        stats.file_count, stats.elapsed_secs
    );
    println!(
        "  {} kustomizations ({} Flux), {} references",
        stats.kustomization_count, stats.flux_count, stats.reference_count,
    );

    if stats.missing_count > 0 {
        eprintln!("  {} missing references (run `kustomap check`)", stats.missing_count);
    }
}

/// Forward references of one file, relative to the workspace root.
pub fn print_references(targets: &[PathBuf], root: &Path, json: bool) {
    let rel: Vec<String> = targets.iter().map(|t| display_relative(t, root)).collect();
    if json {
        print_json(&rel);
        return;
    }
    if rel.is_empty() {
        println!("no references");
    }
    for target in rel {
        println!("{target}");
    }
}

#[derive(Serialize)]
struct BackReferenceRow {
    source: String,
    kind: &'static str,
}

/// Back-references of one file, relative to the workspace root.
pub fn print_back_references(backs: &[BackReference], root: &Path, json: bool) {
    let rows: Vec<BackReferenceRow> = backs
        .iter()
        .map(|b| BackReferenceRow {
            source: display_relative(&b.source, root),
            kind: b.kind.as_str(),
        })
        .collect();
    if json {
        print_json(&rows);
        return;
    }
    if rows.is_empty() {
        println!("no back-references");
    }
    for row in rows {
        println!("{:<5} {}", row.kind, row.source);
    }
}

#[derive(Serialize)]
struct MissingRow {
    source: String,
    field: &'static str,
    reference: String,
    expected: String,
    directory_exists: bool,
}

/// Missing references, one line each.
pub fn print_missing(missing: &[MissingReference], root: &Path, json: bool) {
    let rows: Vec<MissingRow> = missing
        .iter()
        .map(|m| MissingRow {
            source: display_relative(&m.source, root),
            field: m.field.as_str(),
            reference: m.raw.clone(),
            expected: display_relative(&m.expected, root),
            directory_exists: m.directory_exists,
        })
        .collect();
    if json {
        print_json(&rows);
        return;
    }
    if rows.is_empty() {
        println!("all references resolve");
        return;
    }
    for row in &rows {
        let reason = if row.directory_exists {
            "directory has no kustomization file"
        } else {
            "not found"
        };
        println!(
            "{}: {} `{}` -> {} ({reason})",
            row.source, row.field, row.reference, row.expected
        );
    }
    eprintln!("{} missing reference(s)", rows.len());
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("error serialising output: {}", e),
    }
}
