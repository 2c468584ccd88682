//! Batch split engine: partition Markdown documents into chapter files.
//!
//! ## Why split at all?
//!
//! A whole book in one Markdown file is a poor retrieval unit. The engine
//! walks a tree of converted documents and cuts each one at headings of
//! exactly the configured depth, producing one `chNN_<slug>.md` per
//! section in a per-document directory that mirrors the source layout.
//!
//! Chapters are exact line ranges of the source: concatenating a
//! document's chapter files in ordinal order (preamble included, when
//! kept) reproduces the document byte-for-byte. The engine rearranges
//! content; it must never alter it.
//!
//! Dry-run shares every code path with a real run except the filesystem
//! step and mutates nothing — not even the destination root is created.

use crate::config::{NoSplitAction, PreamblePolicy, SplitConfig};
use crate::error::{CorpusError, UnitError};
use crate::pipeline::discover::{self, SourceFile};
use crate::pipeline::heading::{self, HeadingMatcher};
use crate::pipeline::{up_to_date, write_atomic};
use crate::report::{PlannedFile, SplitRecord, SplitReport, SplitStatus};
use crate::scheduler;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Split every Markdown document under `src_root` into chapter files
/// under `dst_root`.
///
/// A document at `<rel_parent>/<name>.md` maps to the directory
/// `dst_root/<rel_parent>/<name>/` holding one file per section. Documents
/// whose output is already up to date are skipped unless `config.force` is
/// set; `config.dry_run` reports the full plan without writing anything.
///
/// # Returns
/// `Ok(SplitReport)` whenever the batch ran, even if every unit failed —
/// check [`SplitReport::has_failures`] for the exit status.
///
/// # Errors
/// Returns `Err(CorpusError)` only for fatal conditions:
/// - `src_root` missing or not a directory
/// - `dst_root` could not be created
/// - an out-of-range heading level in a hand-built config
///
/// # Example
/// ```rust,no_run
/// use mdcorpus::{split_tree, SplitConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SplitConfig::builder().level(1).dry_run(true).build()?;
/// let report = split_tree("books-md", "books-chapters", &config).await?;
/// for record in &report.records {
///     println!("{}: {} planned files", record.rel_path.display(), record.files.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn split_tree(
    src_root: impl AsRef<Path>,
    dst_root: impl AsRef<Path>,
    config: &SplitConfig,
) -> Result<SplitReport, CorpusError> {
    let total_start = Instant::now();
    let src_root = src_root.as_ref().to_path_buf();
    let dst_root = dst_root.as_ref().to_path_buf();
    info!(
        "Starting split: {} -> {} (level {})",
        src_root.display(),
        dst_root.display(),
        config.level
    );

    // ── Step 1: Validate and build the boundary matcher ──────────────────
    // Configs built by hand can bypass the builder's checks.
    if !(1..=6).contains(&config.level) {
        return Err(CorpusError::InvalidConfig(format!(
            "Heading level must be 1–6, got {}",
            config.level
        )));
    }
    let matcher = HeadingMatcher::new(config.level)?;

    // ── Step 2: Create the destination root ──────────────────────────────
    // Dry-run owns a zero-mutation guarantee, so not even this mkdir runs.
    if !config.dry_run {
        tokio::fs::create_dir_all(&dst_root)
            .await
            .map_err(|e| CorpusError::DestinationFailed {
                path: dst_root.clone(),
                source: e,
            })?;
    }

    // ── Step 3: Discover Markdown documents ──────────────────────────────
    let walk_root = src_root.clone();
    let files = tokio::task::spawn_blocking(move || discover::walk_files(&walk_root))
        .await
        .map_err(|e| CorpusError::Internal(format!("discovery task failed: {e}")))??;
    let docs: Vec<SourceFile> = files.into_iter().filter(|f| f.extension == "md").collect();
    info!(
        "Discovered {} Markdown documents under {}",
        docs.len(),
        src_root.display()
    );

    // ── Step 4: Build the work set ───────────────────────────────────────
    let units: Vec<SplitUnit> = docs
        .into_iter()
        .map(|f| SplitUnit::plan(f, &dst_root))
        .collect();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(units.len());
    }

    // ── Step 5: Split through the scheduler ──────────────────────────────
    let mut records = scheduler::run_units(units, config.workers, |unit| {
        split_one(unit, config, &matcher)
    })
    .await;

    records.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    // ── Step 6: Assemble the report ──────────────────────────────────────
    let report = SplitReport::from_records(
        records,
        config.dry_run,
        total_start.elapsed().as_millis() as u64,
    );
    info!(
        "Split complete{}: {} split, {} copied, {} no-match, {} skipped, {} failed in {}ms",
        if config.dry_run { " (dry-run)" } else { "" },
        report.split,
        report.copied,
        report.unmatched,
        report.skipped,
        report.failed,
        report.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(report.records.len(), report.split + report.copied);
    }

    Ok(report)
}

/// One Markdown document scheduled for splitting.
struct SplitUnit {
    src: PathBuf,
    rel_path: PathBuf,
    /// Receives the chapter files: `dst/<rel_parent>/<stem>/`.
    book_dir: PathBuf,
    /// No-match copy destination: the document's mirrored path.
    copy_target: PathBuf,
}

impl SplitUnit {
    fn plan(file: SourceFile, dst_root: &Path) -> Self {
        let rel_parent = file.rel_path.parent().unwrap_or_else(|| Path::new(""));
        let stem = file.rel_path.file_stem().unwrap_or_default();
        let book_dir = dst_root.join(rel_parent).join(stem);
        let copy_target = dst_root.join(&file.rel_path);
        Self {
            src: file.path,
            rel_path: file.rel_path,
            book_dir,
            copy_target,
        }
    }
}

/// Split a single document, containing every failure in the returned
/// record.
async fn split_one(unit: SplitUnit, config: &SplitConfig, matcher: &HeadingMatcher) -> SplitRecord {
    let start = Instant::now();

    // Document-granularity freshness: any prior output at least as new as
    // the source stands in for the whole chapter set.
    if !config.force
        && (up_to_date(&unit.src, &unit.book_dir) || up_to_date(&unit.src, &unit.copy_target))
    {
        debug!("{}: output up to date, skipping", unit.rel_path.display());
        if let Some(ref cb) = config.progress_callback {
            cb.on_unit_skipped(&unit.rel_path);
        }
        return finish(unit, SplitStatus::SkippedUpToDate, vec![], start);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_unit_start(&unit.rel_path);
    }

    let bytes = match tokio::fs::read(&unit.src).await {
        Ok(b) => b,
        Err(e) => {
            let error = UnitError::io(&unit.src, &e);
            return fail(unit, error, config, start);
        }
    };
    // Boundary scanning is line-oriented text work; refuse to guess at
    // bytes that are not UTF-8 rather than corrupt them.
    let text = match String::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            let error = UnitError::ParseError {
                detail: format!("not valid UTF-8: {e}"),
            };
            return fail(unit, error, config, start);
        }
    };

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let outline = heading::outline(&lines, matcher);

    if outline.is_unsplit() {
        return no_match(unit, &text, config, start).await;
    }

    // ── Chapter plan: preamble per policy, then every section in order ───
    let mut sections: Vec<&heading::Section> = Vec::new();
    if config.preamble == PreamblePolicy::Keep {
        if let Some(ref pre) = outline.preamble {
            sections.push(pre);
        }
    }
    sections.extend(outline.sections.iter());

    let planned: Vec<PlannedFile> = sections
        .iter()
        .enumerate()
        .map(|(ordinal, s)| PlannedFile {
            path: unit
                .book_dir
                .join(heading::chapter_file_name(ordinal, &s.title)),
            bytes: lines[s.start..s.end].iter().map(|l| l.len()).sum(),
        })
        .collect();

    if config.dry_run {
        for f in &planned {
            debug!("[dry-run] would write {} ({} bytes)", f.path.display(), f.bytes);
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_unit_complete(&unit.rel_path, planned.iter().map(|f| f.bytes).sum());
        }
        let chapters = planned.len();
        return finish(unit, SplitStatus::Split { chapters }, planned, start);
    }

    // Force wipes the existing chapter set so files from an earlier run
    // with different boundaries cannot linger as stale extras.
    if config.force {
        match tokio::fs::remove_dir_all(&unit.book_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                let error = UnitError::io(&unit.book_dir, &e);
                return fail(unit, error, config, start);
            }
        }
    }

    let mut written = 0usize;
    for (file, section) in planned.iter().zip(&sections) {
        let body = lines[section.start..section.end].concat();
        if let Err(error) = write_atomic(&file.path, body.as_bytes()).await {
            return fail(unit, error, config, start);
        }
        written += body.len();
    }

    debug!(
        "{}: split into {} chapters ({} bytes)",
        unit.rel_path.display(),
        planned.len(),
        written
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_unit_complete(&unit.rel_path, written);
    }
    let chapters = planned.len();
    finish(unit, SplitStatus::Split { chapters }, planned, start)
}

/// Apply the configured policy to a document with no boundary heading.
async fn no_match(
    unit: SplitUnit,
    text: &str,
    config: &SplitConfig,
    start: Instant,
) -> SplitRecord {
    match config.no_split_action {
        NoSplitAction::Skip => {
            debug!("{}: no boundary heading, skipping", unit.rel_path.display());
            if let Some(ref cb) = config.progress_callback {
                cb.on_unit_skipped(&unit.rel_path);
            }
            finish(unit, SplitStatus::NoMatch, vec![], start)
        }
        NoSplitAction::Copy => {
            let planned = vec![PlannedFile {
                path: unit.copy_target.clone(),
                bytes: text.len(),
            }];
            if config.dry_run {
                debug!(
                    "[dry-run] would copy {} -> {}",
                    unit.src.display(),
                    unit.copy_target.display()
                );
            } else {
                if let Err(error) = write_atomic(&unit.copy_target, text.as_bytes()).await {
                    return fail(unit, error, config, start);
                }
                debug!(
                    "{}: no boundary heading, copied unchanged",
                    unit.rel_path.display()
                );
            }
            if let Some(ref cb) = config.progress_callback {
                cb.on_unit_complete(&unit.rel_path, text.len());
            }
            finish(unit, SplitStatus::NoMatchCopied, planned, start)
        }
    }
}

/// Record a failed unit: log, notify, finish.
fn fail(unit: SplitUnit, error: UnitError, config: &SplitConfig, start: Instant) -> SplitRecord {
    warn!("{}: split failed: {}", unit.rel_path.display(), error);
    if let Some(ref cb) = config.progress_callback {
        cb.on_unit_error(&unit.rel_path, error.to_string());
    }
    finish(unit, SplitStatus::Failed { error }, vec![], start)
}

fn finish(
    unit: SplitUnit,
    status: SplitStatus,
    files: Vec<PlannedFile>,
    start: Instant,
) -> SplitRecord {
    SplitRecord {
        rel_path: unit.rel_path,
        status,
        files,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}
