//! Configuration types for the conversion and split engines.
//!
//! Each engine takes one config struct ([`ConvertConfig`] /
//! [`SplitConfig`]), built via its builder. Keeping every knob in one
//! struct makes it trivial to share configs across worker futures, log
//! them, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A many-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely
//! on well-documented defaults for the rest.

use crate::error::CorpusError;
use crate::pipeline::tool::ToolSet;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a batch conversion run.
///
/// Built via [`ConvertConfig::builder()`] or using
/// [`ConvertConfig::default()`].
///
/// # Example
/// ```rust
/// use mdcorpus::ConvertConfig;
///
/// let config = ConvertConfig::builder()
///     .workers(4)
///     .extensions(["pdf", "epub"])
///     .force(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConvertConfig {
    /// Number of units converted concurrently. 0 = one per CPU core. Default: 0.
    ///
    /// Conversion work is dominated by external tool subprocesses, so the
    /// run spends its time waiting on children rather than burning CPU in
    /// this process. One worker per core keeps every core busy with a tool
    /// child without oversubscribing memory-hungry converters. Set 1 to
    /// debug a misbehaving file with clean, interleaving-free logs.
    pub workers: usize,

    /// Reconvert every unit even when its output is already up to date. Default: false.
    ///
    /// Without force, a unit is skipped when the destination exists and its
    /// mtime is not older than the source's. That makes re-running a large
    /// corpus after adding a handful of files nearly free.
    pub force: bool,

    /// Route PDFs through the OCR-capable strategy. Default: false.
    ///
    /// Scanned PDFs have no extractable text layer; the default PDF chain
    /// produces empty or garbage output for them. OCR is a per-run toggle
    /// rather than per-file detection because the caller usually knows what
    /// a corpus contains, and OCR on born-digital PDFs is strictly slower
    /// and worse.
    pub ocr: bool,

    /// Extension allow-list (lowercase, no leading dot). Default: None = all.
    ///
    /// When set, files with other extensions are excluded from the work set
    /// entirely — they produce no records and no failures. When unset, every
    /// non-hidden file is a unit and unknown extensions are recorded as
    /// failed, so nothing in the corpus goes silently unaccounted for.
    pub extensions: Option<Vec<String>>,

    /// Pre-resolved external tool availability. Default: None = probe PATH.
    ///
    /// Tests inject a synthetic [`ToolSet`] here to exercise chain fallback
    /// and tool-unavailable failures without any tools installed.
    pub tools: Option<ToolSet>,

    /// Write a `<output>.error.txt` report beside each failed output. Default: true.
    ///
    /// In a thousand-file overnight run, terminal scrollback is gone by
    /// morning. The report file keeps the failure cause next to where the
    /// output should have been; it is removed when a later run succeeds.
    pub error_reports: bool,

    /// Optional progress callback, invoked per unit and per batch.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            force: false,
            ocr: false,
            extensions: None,
            tools: None,
            error_reports: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConvertConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertConfig")
            .field("workers", &self.workers)
            .field("force", &self.force)
            .field("ocr", &self.ocr)
            .field("extensions", &self.extensions)
            .field("tools", &self.tools)
            .field("error_reports", &self.error_reports)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ConvertConfig {
    /// Create a new builder for `ConvertConfig`.
    pub fn builder() -> ConvertConfigBuilder {
        ConvertConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConvertConfig`].
#[derive(Debug)]
pub struct ConvertConfigBuilder {
    config: ConvertConfig,
}

impl ConvertConfigBuilder {
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn force(mut self, v: bool) -> Self {
        self.config.force = v;
        self
    }

    pub fn ocr(mut self, v: bool) -> Self {
        self.config.ocr = v;
        self
    }

    /// Restrict the run to the given extensions (case-insensitive, with or
    /// without a leading dot).
    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = exts.into_iter().map(|e| normalize_ext(&e.into())).collect();
        self.config.extensions = Some(list);
        self
    }

    pub fn tools(mut self, tools: ToolSet) -> Self {
        self.config.tools = Some(tools);
        self
    }

    pub fn error_reports(mut self, v: bool) -> Self {
        self.config.error_reports = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConvertConfig, CorpusError> {
        if let Some(ref exts) = self.config.extensions {
            if exts.is_empty() {
                return Err(CorpusError::InvalidConfig(
                    "Extension allow-list is empty; omit it to convert everything".into(),
                ));
            }
            if exts.iter().any(|e| e.is_empty()) {
                return Err(CorpusError::InvalidConfig(
                    "Extension allow-list contains an empty entry".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

/// Normalise an extension for allow-list matching: strip a leading dot,
/// lowercase. Matching everywhere else uses the same form.
pub(crate) fn normalize_ext(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Configuration for a batch split run.
///
/// Built via [`SplitConfig::builder()`] or using [`SplitConfig::default()`].
///
/// # Example
/// ```rust
/// use mdcorpus::{NoSplitAction, SplitConfig};
///
/// let config = SplitConfig::builder()
///     .level(2)
///     .no_split_action(NoSplitAction::Copy)
///     .dry_run(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SplitConfig {
    /// Heading depth that opens a new chapter. Range: 1–6. Default: 1.
    ///
    /// Only headings of *exactly* this depth are boundaries: at level 2,
    /// `## Title` splits while `#` and `###` lines flow into the current
    /// section unchanged.
    pub level: u8,

    /// Number of documents split concurrently. 0 = one per CPU core. Default: 1.
    ///
    /// Splitting is cheap (read, scan, write); the sequential default keeps
    /// log output ordered per document, which matters more than speed for
    /// the corpora this tool sees. Raise it for very large trees.
    pub workers: usize,

    /// Resplit documents whose chapter directory is already up to date. Default: false.
    ///
    /// Force also deletes the existing chapter directory first, so chapters
    /// from an earlier run with different boundaries cannot linger.
    pub force: bool,

    /// Plan everything, write nothing. Default: false.
    ///
    /// Dry-run shares every code path with the real run except the final
    /// filesystem step, so the reported plan is exactly what a real run
    /// would do.
    pub dry_run: bool,

    /// What to do with a document containing no boundary headings. Default: [`NoSplitAction::Skip`].
    pub no_split_action: NoSplitAction,

    /// What to do with content before the first boundary. Default: [`PreamblePolicy::Drop`].
    pub preamble: PreamblePolicy,

    /// Optional progress callback, invoked per unit and per batch.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            level: 1,
            workers: 1,
            force: false,
            dry_run: false,
            no_split_action: NoSplitAction::default(),
            preamble: PreamblePolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SplitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitConfig")
            .field("level", &self.level)
            .field("workers", &self.workers)
            .field("force", &self.force)
            .field("dry_run", &self.dry_run)
            .field("no_split_action", &self.no_split_action)
            .field("preamble", &self.preamble)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl SplitConfig {
    /// Create a new builder for `SplitConfig`.
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SplitConfig`].
#[derive(Debug)]
pub struct SplitConfigBuilder {
    config: SplitConfig,
}

impl SplitConfigBuilder {
    pub fn level(mut self, n: u8) -> Self {
        self.config.level = n.clamp(1, 6);
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn force(mut self, v: bool) -> Self {
        self.config.force = v;
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn no_split_action(mut self, action: NoSplitAction) -> Self {
        self.config.no_split_action = action;
        self
    }

    pub fn preamble(mut self, policy: PreamblePolicy) -> Self {
        self.config.preamble = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SplitConfig, CorpusError> {
        let c = &self.config;
        if c.level < 1 || c.level > 6 {
            return Err(CorpusError::InvalidConfig(format!(
                "Heading level must be 1–6, got {}",
                c.level
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Policy for documents with no heading at the boundary depth.
///
/// Two policies exist because corpora mix real books with loose notes.
/// `Skip` keeps the destination tree strictly "split output only"; `Copy`
/// carries unsplittable documents over byte-identically so the destination
/// remains a complete mirror of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoSplitAction {
    /// Produce no output for the document. (default)
    #[default]
    Skip,
    /// Copy the source unchanged to its mirrored path under the
    /// destination root.
    Copy,
}

/// Policy for content before the first boundary heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreamblePolicy {
    /// Discard the preamble; chapter files start at the first boundary. (default)
    #[default]
    Drop,
    /// Emit the preamble as chapter 0, titled "prologue".
    Keep,
}
