//! Result records and run reports.
//!
//! Every unit's outcome — including failure — is a value, not a control
//! flow event. Engines collect one record per unit, and the reports
//! aggregate them for summaries, exit codes, and `--json` output. All
//! types serialise so a record written by one process can be inspected by
//! another.

use crate::error::UnitError;
use crate::pipeline::adapter::AdapterKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ── Conversion ───────────────────────────────────────────────────────────

/// Outcome of one conversion unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConversionStatus {
    /// Output written; names the strategy that produced it.
    Converted { strategy: String },
    /// Destination already at least as new as the source; nothing written.
    SkippedUpToDate,
    /// The unit failed. The batch continued without it.
    Failed { error: UnitError },
}

/// Per-unit record of a conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRecord {
    /// Source path relative to the source root.
    pub rel_path: PathBuf,
    /// Destination path (the mirrored `.md` file).
    pub output: PathBuf,
    /// Adapter family the unit dispatched to.
    pub kind: AdapterKind,
    pub status: ConversionStatus,
    pub duration_ms: u64,
}

impl ConversionRecord {
    pub fn error(&self) -> Option<&UnitError> {
        match &self.status {
            ConversionStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Aggregated outcome of a whole conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// One record per unit, sorted by relative path.
    pub records: Vec<ConversionRecord>,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

impl RunReport {
    pub(crate) fn from_records(records: Vec<ConversionRecord>, total_duration_ms: u64) -> Self {
        let mut converted = 0;
        let mut skipped = 0;
        let mut failed = 0;
        for r in &records {
            match r.status {
                ConversionStatus::Converted { .. } => converted += 1,
                ConversionStatus::SkippedUpToDate => skipped += 1,
                ConversionStatus::Failed { .. } => failed += 1,
            }
        }
        Self {
            records,
            converted,
            skipped,
            failed,
            total_duration_ms,
        }
    }

    /// Whether the process should exit non-zero.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Failure counts keyed by error kind label, sorted for stable output.
    pub fn error_kind_counts(&self) -> BTreeMap<&'static str, usize> {
        error_kind_counts(self.records.iter().filter_map(|r| r.error()))
    }
}

// ── Split ────────────────────────────────────────────────────────────────

/// Outcome of one split unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SplitStatus {
    /// Chapter files written (or planned, under dry-run).
    Split { chapters: usize },
    /// No boundary heading found; skip policy produced nothing.
    NoMatch,
    /// No boundary heading found; copy policy carried the source over.
    NoMatchCopied,
    /// Existing output already at least as new as the source.
    SkippedUpToDate,
    /// The unit failed. The batch continued without it.
    Failed { error: UnitError },
}

/// One output file of a split unit: where, and how many bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub bytes: usize,
}

/// Per-document record of a split run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRecord {
    /// Source path relative to the source root.
    pub rel_path: PathBuf,
    pub status: SplitStatus,
    /// The exact file set written — or, under dry-run, the set a real run
    /// would write. Empty for skips, no-match-skip, and failures.
    pub files: Vec<PlannedFile>,
    pub duration_ms: u64,
}

impl SplitRecord {
    pub fn error(&self) -> Option<&UnitError> {
        match &self.status {
            SplitStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Aggregated outcome of a whole split run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    /// One record per document, sorted by relative path.
    pub records: Vec<SplitRecord>,
    pub split: usize,
    pub copied: usize,
    pub unmatched: usize,
    pub skipped: usize,
    pub failed: usize,
    /// True when the run planned but did not write.
    pub dry_run: bool,
    pub total_duration_ms: u64,
}

impl SplitReport {
    pub(crate) fn from_records(
        records: Vec<SplitRecord>,
        dry_run: bool,
        total_duration_ms: u64,
    ) -> Self {
        let mut split = 0;
        let mut copied = 0;
        let mut unmatched = 0;
        let mut skipped = 0;
        let mut failed = 0;
        for r in &records {
            match r.status {
                SplitStatus::Split { .. } => split += 1,
                SplitStatus::NoMatchCopied => copied += 1,
                SplitStatus::NoMatch => unmatched += 1,
                SplitStatus::SkippedUpToDate => skipped += 1,
                SplitStatus::Failed { .. } => failed += 1,
            }
        }
        Self {
            records,
            split,
            copied,
            unmatched,
            skipped,
            failed,
            dry_run,
            total_duration_ms,
        }
    }

    /// Whether the process should exit non-zero.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Failure counts keyed by error kind label, sorted for stable output.
    pub fn error_kind_counts(&self) -> BTreeMap<&'static str, usize> {
        error_kind_counts(self.records.iter().filter_map(|r| r.error()))
    }
}

fn error_kind_counts<'a>(
    errors: impl Iterator<Item = &'a UnitError>,
) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for e in errors {
        *counts.entry(e.kind()).or_insert(0) += 1;
    }
    counts
}
