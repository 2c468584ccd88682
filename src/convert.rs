//! Batch conversion engine: mirror a document tree as Markdown.
//!
//! ## Why a batch engine instead of a per-file function?
//!
//! The unit of value here is the *corpus*, not the file. This module owns
//! everything that only makes sense at corpus scope: destination
//! mirroring, the freshness skip, bounded fan-out, and the run report.
//! Per-file mechanics (format dispatch, tool fallback, atomic publish)
//! live in [`crate::pipeline`] and are driven from here one unit at a
//! time.
//!
//! A unit can fail; a batch cannot. Every failure short of an unusable
//! source or destination root is contained in that unit's
//! [`ConversionRecord`] and the run continues.

use crate::config::{normalize_ext, ConvertConfig};
use crate::error::{CorpusError, UnitError};
use crate::pipeline::adapter::{self, AdapterKind};
use crate::pipeline::discover::{self, SourceFile};
use crate::pipeline::tool::ToolSet;
use crate::pipeline::up_to_date;
use crate::report::{ConversionRecord, ConversionStatus, RunReport};
use crate::scheduler;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert every document under `src_root` to Markdown under `dst_root`.
///
/// Each source file maps to `dst_root/<rel_path>` with its extension
/// replaced by `.md`; intermediate directories are created as needed.
/// Units whose output is already up to date are skipped unless
/// `config.force` is set.
///
/// # Returns
/// `Ok(RunReport)` whenever the batch ran, even if every unit failed —
/// check [`RunReport::has_failures`] for the exit status.
///
/// # Errors
/// Returns `Err(CorpusError)` only for fatal conditions:
/// - `src_root` missing or not a directory
/// - `dst_root` could not be created
///
/// # Example
/// ```rust,no_run
/// use mdcorpus::{convert_tree, ConvertConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConvertConfig::builder().workers(4).build()?;
/// let report = convert_tree("books", "books-md", &config).await?;
/// println!("{} converted, {} failed", report.converted, report.failed);
/// # Ok(())
/// # }
/// ```
pub async fn convert_tree(
    src_root: impl AsRef<Path>,
    dst_root: impl AsRef<Path>,
    config: &ConvertConfig,
) -> Result<RunReport, CorpusError> {
    let total_start = Instant::now();
    let src_root = src_root.as_ref().to_path_buf();
    let dst_root = dst_root.as_ref().to_path_buf();
    info!(
        "Starting conversion: {} -> {}",
        src_root.display(),
        dst_root.display()
    );

    // ── Step 1: Create the destination root ──────────────────────────────
    tokio::fs::create_dir_all(&dst_root)
        .await
        .map_err(|e| CorpusError::DestinationFailed {
            path: dst_root.clone(),
            source: e,
        })?;

    // ── Step 2: Discover source files ────────────────────────────────────
    // walkdir is synchronous; keep it off the async workers.
    let walk_root = src_root.clone();
    let files = tokio::task::spawn_blocking(move || discover::walk_files(&walk_root))
        .await
        .map_err(|e| CorpusError::Internal(format!("discovery task failed: {e}")))??;
    let total_bytes: u64 = files.iter().map(|f| f.size).sum();
    info!(
        "Discovered {} files ({} bytes) under {}",
        files.len(),
        total_bytes,
        src_root.display()
    );

    // ── Step 3: Apply the extension allow-list ───────────────────────────
    // Excluded files are not units: no record, no failure.
    let files: Vec<SourceFile> = match &config.extensions {
        Some(allowed) => files
            .into_iter()
            .filter(|f| allowed.iter().any(|a| normalize_ext(a) == f.extension))
            .collect(),
        None => files,
    };

    // ── Step 4: Resolve external tools ───────────────────────────────────
    let tools = match config.tools {
        Some(t) => t,
        None => ToolSet::detect().await,
    };
    let missing = tools.missing();
    if !missing.is_empty() {
        warn!(
            "Converters not on PATH: {} (formats that need them fall back or fail per unit)",
            missing.join(", ")
        );
    }

    // ── Step 5: Build the work set ───────────────────────────────────────
    let units: Vec<ConvertUnit> = files
        .into_iter()
        .map(|f| {
            let dst = dst_root.join(&f.rel_path).with_extension("md");
            ConvertUnit {
                kind: AdapterKind::for_extension(&f.extension),
                src: f.path,
                rel_path: f.rel_path,
                extension: f.extension,
                dst,
            }
        })
        .collect();
    debug!("{} units scheduled", units.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(units.len());
    }

    // ── Step 6: Convert through the scheduler ────────────────────────────
    let mut records =
        scheduler::run_units(units, config.workers, |unit| convert_one(unit, config, &tools))
            .await;

    // Completion order is arbitrary under fan-out; reports read better sorted.
    records.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    // ── Step 7: Assemble the report ──────────────────────────────────────
    let report = RunReport::from_records(records, total_start.elapsed().as_millis() as u64);
    info!(
        "Conversion complete: {} converted, {} skipped, {} failed in {}ms",
        report.converted, report.skipped, report.failed, report.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(report.records.len(), report.converted);
    }

    Ok(report)
}

/// One file scheduled for conversion.
struct ConvertUnit {
    src: PathBuf,
    rel_path: PathBuf,
    dst: PathBuf,
    extension: String,
    kind: AdapterKind,
}

/// Convert a single unit, containing every failure in the returned record.
///
/// Only two paths bypass the strategy chain: the freshness skip, and a
/// destination directory that cannot be created.
async fn convert_one(
    unit: ConvertUnit,
    config: &ConvertConfig,
    tools: &ToolSet,
) -> ConversionRecord {
    let start = Instant::now();

    if !config.force && up_to_date(&unit.src, &unit.dst) {
        debug!("{}: output up to date, skipping", unit.rel_path.display());
        if let Some(ref cb) = config.progress_callback {
            cb.on_unit_skipped(&unit.rel_path);
        }
        return finish(unit, ConversionStatus::SkippedUpToDate, start);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_unit_start(&unit.rel_path);
    }

    // The strategy runners publish into the unit's directory; it has to
    // exist before any of them runs.
    if let Some(parent) = unit.dst.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            let error = UnitError::io(parent, &e);
            warn!("{}: {}", unit.rel_path.display(), error);
            if let Some(ref cb) = config.progress_callback {
                cb.on_unit_error(&unit.rel_path, error.to_string());
            }
            return finish(unit, ConversionStatus::Failed { error }, start);
        }
    }

    match adapter::run_chain(
        unit.kind,
        &unit.extension,
        &unit.src,
        &unit.dst,
        config.ocr,
        tools,
    )
    .await
    {
        Ok(strategy) => {
            // A fresh success supersedes any report from an earlier failure.
            let _ = tokio::fs::remove_file(error_report_path(&unit.dst)).await;
            let bytes = tokio::fs::metadata(&unit.dst)
                .await
                .map(|m| m.len() as usize)
                .unwrap_or(0);
            debug!(
                "{}: converted via '{}' ({} bytes)",
                unit.rel_path.display(),
                strategy,
                bytes
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_unit_complete(&unit.rel_path, bytes);
            }
            finish(
                unit,
                ConversionStatus::Converted {
                    strategy: strategy.to_string(),
                },
                start,
            )
        }
        Err(error) => {
            warn!("{}: conversion failed: {}", unit.rel_path.display(), error);
            if config.error_reports {
                write_error_report(&unit, &error).await;
            }
            if let Some(ref cb) = config.progress_callback {
                cb.on_unit_error(&unit.rel_path, error.to_string());
            }
            finish(unit, ConversionStatus::Failed { error }, start)
        }
    }
}

fn finish(unit: ConvertUnit, status: ConversionStatus, start: Instant) -> ConversionRecord {
    ConversionRecord {
        rel_path: unit.rel_path,
        output: unit.dst,
        kind: unit.kind,
        status,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Where a unit's failure report lives: beside the output it should have
/// produced.
fn error_report_path(dst: &Path) -> PathBuf {
    dst.with_extension("error.txt")
}

/// Keep the failure cause on disk next to the missing output. Best-effort:
/// a report that cannot be written only logs.
async fn write_error_report(unit: &ConvertUnit, error: &UnitError) {
    let path = error_report_path(&unit.dst);
    let body = format!("Failed to convert {}:\n\n{}\n", unit.src.display(), error);
    if let Err(e) = tokio::fs::write(&path, body).await {
        warn!("{}: could not write error report: {}", path.display(), e);
    }
}
