//! Integration tests for the batch conversion engine.
//!
//! Everything here is hermetic: fixtures live in per-test temp directories
//! and the tool probe is stubbed with `ToolSet::none()`, so no external
//! converter binary is ever spawned. Plain-text sources exercise the full
//! pipeline (discovery, scheduling, freshness, atomic writes, reporting)
//! because their adapter copies bytes without shelling out; PDF and unknown
//! extensions exercise the failure paths for the same reason.
//!
//! Run with:
//!   cargo test --test convert_batch

use mdcorpus::{
    convert_tree, AdapterKind, BatchProgressCallback, ConversionStatus, ConvertConfig,
    CorpusError, ToolSet,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Write `contents` at `root/rel`, creating parent directories as needed.
fn seed(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dirs");
    }
    fs::write(&path, contents).expect("write fixture");
    path
}

/// A config whose tool probe reports every external binary as missing.
/// Plain-text units still convert (their adapter needs no tool); everything
/// else fails deterministically with `tool-unavailable`.
fn offline_config() -> ConvertConfig {
    ConvertConfig::builder()
        .tools(ToolSet::none())
        .build()
        .expect("valid config")
}

fn set_mtime(path: &Path, t: SystemTime) {
    let f = fs::File::options()
        .write(true)
        .open(path)
        .expect("open for mtime update");
    f.set_modified(t).expect("set mtime");
}

/// Collapse a status to a label that is comparable across runs (durations and
/// error details vary; the outcome must not).
fn status_label(status: &ConversionStatus) -> &'static str {
    match status {
        ConversionStatus::Converted { .. } => "converted",
        ConversionStatus::SkippedUpToDate => "skipped",
        ConversionStatus::Failed { .. } => "failed",
    }
}

// ── Tree mirroring ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_nested_tree_mirrors_relative_paths() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "readme.txt", "top level\n");
    seed(src.path(), "docs/guide.txt", "# Guide\n\nBody.\n");
    seed(src.path(), "docs/deep/notes.txt", "deep notes\n");

    let report = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("batch must not be fatal");

    assert_eq!(report.converted, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 0);
    assert!(!report.has_failures());

    for rel in ["readme.md", "docs/guide.md", "docs/deep/notes.md"] {
        assert!(
            dst.path().join(rel).is_file(),
            "expected mirrored output at {rel}"
        );
    }
    // The plain-text adapter copies bytes, so output equals source.
    assert_eq!(
        fs::read_to_string(dst.path().join("docs/guide.md")).expect("read output"),
        "# Guide\n\nBody.\n"
    );
}

#[tokio::test]
async fn test_records_are_sorted_by_relative_path() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "zebra.txt", "z\n");
    seed(src.path(), "alpha.txt", "a\n");
    seed(src.path(), "middle/m.txt", "m\n");

    let config = ConvertConfig::builder()
        .workers(4)
        .tools(ToolSet::none())
        .build()
        .expect("valid config");

    let report = convert_tree(src.path(), dst.path(), &config)
        .await
        .expect("batch must not be fatal");

    let order: Vec<&Path> = report.records.iter().map(|r| r.rel_path.as_path()).collect();
    assert_eq!(
        order,
        vec![
            Path::new("alpha.txt"),
            Path::new("middle/m.txt"),
            Path::new("zebra.txt")
        ],
        "records must come back in path order regardless of completion order"
    );
}

#[tokio::test]
async fn test_empty_source_tree_is_a_clean_no_op() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");

    let report = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("empty tree is not an error");

    assert!(report.records.is_empty());
    assert!(!report.has_failures());
    assert!(dst.path().is_dir(), "destination root is still created");
}

#[tokio::test]
async fn test_hidden_files_are_not_discovered() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "visible.txt", "seen\n");
    seed(src.path(), ".hidden.txt", "unseen\n");
    seed(src.path(), ".git/objects/blob.txt", "unseen\n");

    let report = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("batch must not be fatal");

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].rel_path, PathBuf::from("visible.txt"));
    assert!(!dst.path().join(".hidden.md").exists());
}

// ── Failure isolation ────────────────────────────────────────────────────────

/// The core containment property: one bad unit never sinks the batch. A PDF
/// with no tools on PATH and a file with an unknown extension both fail, the
/// plain-text file between them converts, and the report accounts for all
/// three.
#[tokio::test]
async fn test_one_bad_unit_does_not_sink_the_batch() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "a.pdf", "%PDF-1.4 not really");
    seed(src.path(), "b.txt", "plain text survives\n");
    seed(src.path(), "c.xyz", "nobody speaks xyz");

    let config = ConvertConfig::builder()
        .workers(2)
        .tools(ToolSet::none())
        .build()
        .expect("valid config");

    let report = convert_tree(src.path(), dst.path(), &config)
        .await
        .expect("unit failures must not abort the run");

    assert_eq!(report.records.len(), 3);
    assert_eq!(report.converted, 1);
    assert_eq!(report.failed, 2);
    assert!(report.has_failures(), "a failed unit must flag the run");

    // Sorted records make the indices stable: a.pdf, b.txt, c.xyz.
    let pdf = &report.records[0];
    assert_eq!(pdf.rel_path, PathBuf::from("a.pdf"));
    assert_eq!(pdf.kind, AdapterKind::Pdf);
    assert_eq!(
        pdf.error().map(|e| e.kind()),
        Some("tool-unavailable"),
        "with no tools installed the whole PDF chain is unavailable"
    );

    let txt = &report.records[1];
    assert_eq!(txt.rel_path, PathBuf::from("b.txt"));
    assert!(
        matches!(&txt.status, ConversionStatus::Converted { strategy } if strategy == "copy"),
        "plain text must convert via the copy strategy, got {:?}",
        txt.status
    );

    let unknown = &report.records[2];
    assert_eq!(unknown.kind, AdapterKind::Unsupported);
    assert_eq!(unknown.error().map(|e| e.kind()), Some("unsupported-format"));

    // Failed units leave no output behind.
    assert!(dst.path().join("b.md").is_file());
    assert!(!dst.path().join("a.md").exists());
    assert!(!dst.path().join("c.md").exists());

    let counts = report.error_kind_counts();
    assert_eq!(counts.get("tool-unavailable"), Some(&1));
    assert_eq!(counts.get("unsupported-format"), Some(&1));
    assert_eq!(counts.get("conversion-failed"), None);
}

#[tokio::test]
async fn test_failed_units_are_retried_on_the_next_run() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "broken.pdf", "no tools for this one");

    let first = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run one");
    assert_eq!(first.failed, 1);

    // Nothing was written, so freshness cannot mask the failure.
    let second = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run two");
    assert_eq!(second.failed, 1, "a failed unit must be re-attempted");
    assert_eq!(second.skipped, 0);
}

// ── Freshness ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_run_skips_up_to_date_outputs() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "one.txt", "first\n");
    seed(src.path(), "two.txt", "second\n");

    let first = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run one");
    assert_eq!(first.converted, 2);

    let second = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run two");
    assert_eq!(second.converted, 0);
    assert_eq!(second.skipped, 2, "outputs newer than sources must be skipped");
    assert!(second
        .records
        .iter()
        .all(|r| matches!(r.status, ConversionStatus::SkippedUpToDate)));
}

#[tokio::test]
async fn test_equal_mtimes_count_as_up_to_date() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    let src_file = seed(src.path(), "doc.txt", "content\n");

    convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run one");

    // Pin source and output to the same instant. "At least as new" includes
    // exact equality, so the unit must still be skipped.
    let t = SystemTime::now();
    set_mtime(&src_file, t);
    set_mtime(&dst.path().join("doc.md"), t);

    let report = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run two");
    assert_eq!(report.skipped, 1);
    assert_eq!(report.converted, 0);
}

#[tokio::test]
async fn test_stale_output_is_reconverted() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    let src_file = seed(src.path(), "doc.txt", "v1\n");

    convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run one");

    // Touch the source into the future so the existing output reads as stale.
    fs::write(&src_file, "v2\n").expect("rewrite source");
    set_mtime(&src_file, SystemTime::now() + Duration::from_secs(60));

    let report = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run two");
    assert_eq!(report.converted, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(
        fs::read_to_string(dst.path().join("doc.md")).expect("read output"),
        "v2\n",
        "stale output must be replaced with the new conversion"
    );
}

#[tokio::test]
async fn test_force_reconverts_up_to_date_units() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "doc.txt", "content\n");

    convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("run one");

    let forced = ConvertConfig::builder()
        .force(true)
        .tools(ToolSet::none())
        .build()
        .expect("valid config");

    let report = convert_tree(src.path(), dst.path(), &forced)
        .await
        .expect("forced run");
    assert_eq!(report.converted, 1, "force must ignore freshness");
    assert_eq!(report.skipped, 0);
}

// ── Extension allow-list ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_extension_allow_list_narrows_the_run() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "keep.txt", "kept\n");
    seed(src.path(), "drop.pdf", "dropped");
    seed(src.path(), "drop.xyz", "dropped");

    // Mixed case and a stray dot must both normalise away.
    let config = ConvertConfig::builder()
        .extensions([".TXT"])
        .tools(ToolSet::none())
        .build()
        .expect("valid config");

    let report = convert_tree(src.path(), dst.path(), &config)
        .await
        .expect("batch must not be fatal");

    assert_eq!(report.records.len(), 1, "filtered units never become records");
    assert_eq!(report.records[0].rel_path, PathBuf::from("keep.txt"));
    assert!(!report.has_failures(), "excluded formats cannot fail");
    assert!(dst.path().join("keep.md").is_file());
    assert!(!dst.path().join("drop.md").exists());
}

#[tokio::test]
async fn test_empty_allow_list_is_rejected_at_build_time() {
    let err = ConvertConfig::builder()
        .extensions(Vec::<String>::new())
        .build()
        .expect_err("an allow-list with no entries can never match");
    assert!(matches!(err, CorpusError::InvalidConfig(_)));
}

// ── Worker counts ────────────────────────────────────────────────────────────

/// Sequential and parallel runs must agree on everything except timing.
#[tokio::test]
async fn test_worker_count_does_not_change_outcomes() {
    let src = TempDir::new().expect("src dir");
    seed(src.path(), "a.txt", "a\n");
    seed(src.path(), "b.pdf", "fails either way");
    seed(src.path(), "c.txt", "c\n");
    seed(src.path(), "d/e.txt", "e\n");

    let mut outcomes = Vec::new();
    for workers in [1, 4] {
        let dst = TempDir::new().expect("dst dir");
        let config = ConvertConfig::builder()
            .workers(workers)
            .tools(ToolSet::none())
            .build()
            .expect("valid config");
        let report = convert_tree(src.path(), dst.path(), &config)
            .await
            .expect("batch must not be fatal");
        outcomes.push(
            report
                .records
                .iter()
                .map(|r| (r.rel_path.clone(), status_label(&r.status)))
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(
        outcomes[0], outcomes[1],
        "one worker and four workers must produce identical outcomes"
    );
}

#[tokio::test]
async fn test_workers_zero_means_all_cores() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    for i in 0..6 {
        seed(src.path(), &format!("f{i}.txt"), "x\n");
    }

    let config = ConvertConfig::builder()
        .workers(0)
        .tools(ToolSet::none())
        .build()
        .expect("valid config");

    let report = convert_tree(src.path(), dst.path(), &config)
        .await
        .expect("batch must not be fatal");
    assert_eq!(report.converted, 6);
}

// ── Error reports ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failure_leaves_an_error_report_beside_the_missing_output() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "broken.pdf", "no tools");

    let report = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("batch must not be fatal");
    assert_eq!(report.failed, 1);

    let report_file = dst.path().join("broken.error.txt");
    let body = fs::read_to_string(&report_file).expect("error report must exist");
    assert!(body.starts_with("Failed to convert"));
    assert!(
        body.contains("not found on PATH"),
        "report must carry the failure cause, got: {body}"
    );
}

#[tokio::test]
async fn test_success_clears_a_stale_error_report() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "doc.txt", "now it works\n");
    // Residue from an imagined earlier failing run.
    seed(dst.path(), "doc.error.txt", "Failed to convert doc.txt: ...");

    let report = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("batch must not be fatal");
    assert_eq!(report.converted, 1);
    assert!(
        !dst.path().join("doc.error.txt").exists(),
        "a fresh success must remove the stale report"
    );
}

#[tokio::test]
async fn test_error_reports_can_be_disabled() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "broken.pdf", "no tools");

    let config = ConvertConfig::builder()
        .error_reports(false)
        .tools(ToolSet::none())
        .build()
        .expect("valid config");

    let report = convert_tree(src.path(), dst.path(), &config)
        .await
        .expect("batch must not be fatal");
    assert_eq!(report.failed, 1);
    assert!(!dst.path().join("broken.error.txt").exists());
}

// ── Fatal errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_source_root_is_fatal() {
    let dir = TempDir::new().expect("tmp dir");
    let err = convert_tree(
        dir.path().join("does-not-exist"),
        dir.path().join("out"),
        &offline_config(),
    )
    .await
    .expect_err("a missing source root cannot be a per-unit failure");
    assert!(matches!(err, CorpusError::SourceDirMissing { .. }));
}

#[tokio::test]
async fn test_file_as_source_root_is_fatal() {
    let dir = TempDir::new().expect("tmp dir");
    let file = seed(dir.path(), "plain.txt", "not a directory");
    let err = convert_tree(&file, dir.path().join("out"), &offline_config())
        .await
        .expect_err("a file source root must be rejected");
    assert!(matches!(err, CorpusError::SourceNotADirectory { .. }));
}

// ── Progress callbacks ───────────────────────────────────────────────────────

#[derive(Default)]
struct CountingCallback {
    batch_total: AtomicUsize,
    starts: AtomicUsize,
    completes: AtomicUsize,
    skips: AtomicUsize,
    errors: AtomicUsize,
    succeeded: AtomicUsize,
}

impl BatchProgressCallback for CountingCallback {
    fn on_batch_start(&self, total_units: usize) {
        self.batch_total.store(total_units, Ordering::SeqCst);
    }
    fn on_unit_start(&self, _rel_path: &Path) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_unit_complete(&self, _rel_path: &Path, _output_bytes: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_unit_skipped(&self, _rel_path: &Path) {
        self.skips.fetch_add(1, Ordering::SeqCst);
    }
    fn on_unit_error(&self, _rel_path: &Path, _error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_batch_complete(&self, _total_units: usize, succeeded: usize) {
        self.succeeded.store(succeeded, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_progress_callbacks_fire_per_outcome() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "good.txt", "fine\n");
    seed(src.path(), "bad.xyz", "unknown");

    let cb = Arc::new(CountingCallback::default());
    let config = ConvertConfig::builder()
        .tools(ToolSet::none())
        .progress_callback(Arc::clone(&cb) as Arc<dyn BatchProgressCallback>)
        .build()
        .expect("valid config");

    convert_tree(src.path(), dst.path(), &config)
        .await
        .expect("batch must not be fatal");

    assert_eq!(cb.batch_total.load(Ordering::SeqCst), 2);
    assert_eq!(cb.starts.load(Ordering::SeqCst), 2);
    assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
    assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    assert_eq!(cb.skips.load(Ordering::SeqCst), 0);
    assert_eq!(cb.succeeded.load(Ordering::SeqCst), 1);

    // Second run: the good unit is now up to date and must report a skip
    // without a matching start.
    let cb2 = Arc::new(CountingCallback::default());
    let config2 = ConvertConfig::builder()
        .tools(ToolSet::none())
        .progress_callback(Arc::clone(&cb2) as Arc<dyn BatchProgressCallback>)
        .build()
        .expect("valid config");

    convert_tree(src.path(), dst.path(), &config2)
        .await
        .expect("batch must not be fatal");

    assert_eq!(cb2.skips.load(Ordering::SeqCst), 1);
    assert_eq!(cb2.starts.load(Ordering::SeqCst), 1, "only the retried failure starts");
    assert_eq!(cb2.errors.load(Ordering::SeqCst), 1);
}

// ── Serialisation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_report_serialises_for_json_consumers() {
    let src = TempDir::new().expect("src dir");
    let dst = TempDir::new().expect("dst dir");
    seed(src.path(), "good.txt", "fine\n");
    seed(src.path(), "bad.xyz", "unknown");

    let report = convert_tree(src.path(), dst.path(), &offline_config())
        .await
        .expect("batch must not be fatal");

    let json = serde_json::to_string_pretty(&report).expect("report must serialise");
    assert!(json.contains("\"converted\": 1"));
    assert!(
        json.contains("UnsupportedFormat"),
        "the failure cause must survive serialisation"
    );

    let back: mdcorpus::RunReport =
        serde_json::from_str(&json).expect("report must deserialise back");
    assert_eq!(back.converted, report.converted);
    assert_eq!(back.failed, report.failed);
    assert_eq!(back.records.len(), report.records.len());
}
