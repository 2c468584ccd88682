//! Error types for the mdcorpus library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CorpusError`] — **Fatal**: the batch cannot run at all (missing
//!   source directory, destination root not writable, invalid config).
//!   Returned as `Err(CorpusError)` from [`crate::convert_tree`] and
//!   [`crate::split_tree`].
//!
//! * [`UnitError`] — **Non-fatal**: a single work unit (one source file)
//!   failed but every other unit is unaffected. Stored inside
//!   [`crate::report::ConversionRecord`] / [`crate::report::SplitRecord`]
//!   so callers can inspect partial success rather than losing a whole
//!   overnight batch to one corrupt file.
//!
//! The separation enforces the batch contract: once the run has started,
//! nothing a single file does can abort it. The only run-level signal for a
//! unit failure is the process exit code chosen by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mdcorpus library.
///
/// Per-file failures use [`UnitError`] and are stored in the run report
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum CorpusError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source directory was not found at the given path.
    #[error("Source directory not found: '{path}'\nCheck the path exists and is readable.")]
    SourceDirMissing { path: PathBuf },

    /// The source path exists but is not a directory.
    #[error("Source path is not a directory: '{path}'")]
    SourceNotADirectory { path: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or access the destination root.
    #[error("Failed to prepare destination directory '{path}': {source}")]
    DestinationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single work unit.
///
/// Stored in [`crate::report::ConversionRecord`] or
/// [`crate::report::SplitRecord`] when a unit fails. The batch always runs
/// to completion regardless of how many units fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// No adapter is registered for the file's extension.
    #[error("unsupported format '.{extension}': no adapter registered")]
    UnsupportedFormat { extension: String },

    /// A conversion strategy needed an external tool that is not on PATH.
    #[error("required tool '{tool}' not found on PATH\nInstall it, or narrow the run with --extensions.")]
    ToolUnavailable { tool: String },

    /// An external tool ran but failed, or produced no usable output.
    #[error("{tool} failed: {detail}")]
    ConversionFailed { tool: String, detail: String },

    /// The source could not be parsed (splitter: not valid UTF-8).
    #[error("cannot parse source: {detail}")]
    ParseError { detail: String },

    /// Filesystem operation on the unit's paths failed.
    #[error("I/O error on '{path}': {detail}")]
    Io { path: PathBuf, detail: String },
}

impl UnitError {
    /// Stable machine-readable label, used for the per-kind failure counts
    /// in run summaries and in `--json` output.
    pub fn kind(&self) -> &'static str {
        match self {
            UnitError::UnsupportedFormat { .. } => "unsupported-format",
            UnitError::ToolUnavailable { .. } => "tool-unavailable",
            UnitError::ConversionFailed { .. } => "conversion-failed",
            UnitError::ParseError { .. } => "parse-error",
            UnitError::Io { .. } => "io-error",
        }
    }

    /// Whether a fallback chain should advance to its next strategy.
    ///
    /// Missing tools and failed tool runs are recoverable (another strategy
    /// may still produce output); I/O errors on the unit's own paths are
    /// not, since every strategy would hit the same filesystem state.
    pub(crate) fn is_recoverable(&self) -> bool {
        matches!(
            self,
            UnitError::ToolUnavailable { .. } | UnitError::ConversionFailed { .. }
        )
    }

    /// Convenience constructor for I/O failures on a unit path.
    pub(crate) fn io(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        UnitError::Io {
            path: path.into(),
            detail: source.to_string(),
        }
    }
}
