//! # mdcorpus
//!
//! Turn a mixed pile of documents into a clean Markdown corpus.
//!
//! ## Why this crate?
//!
//! Document collections worth indexing never arrive in one format: a
//! typical corpus mixes PDFs, EPUBs, Kindle files, and Office documents.
//! The individual converters for these formats already exist and are good;
//! what is missing is the machinery that runs them *safely at scale* —
//! mirroring a source tree, picking the right tool per format with
//! fallbacks, skipping what is already done, isolating per-file failures,
//! and fanning work out across cores. That machinery is this crate. A
//! second engine then cuts each converted document into per-chapter files
//! along heading boundaries, the shape downstream indexers want.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source tree                              markdown tree
//!  │                                        │
//!  ├─ 1. Discover  walk, mirror rel paths   ├─ 1. Discover  walk *.md
//!  ├─ 2. Dispatch  extension → adapter      ├─ 2. Outline   exact-depth headings
//!  ├─ 3. Convert   tool chain w/ fallback   ├─ 3. Cut       per-chapter line ranges
//!  └─ 4. Report    records + exit status    └─ 4. Report    records + exit status
//!        convert_tree                             split_tree
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdcorpus::{convert_tree, split_tree, ConvertConfig, SplitConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Mirror ./books as Markdown under ./books-md.
//!     let config = ConvertConfig::default();
//!     let report = convert_tree("books", "books-md", &config).await?;
//!     println!("{} converted, {} skipped, {} failed",
//!         report.converted, report.skipped, report.failed);
//!
//!     // Then cut each document into chapters at `#` headings.
//!     let config = SplitConfig::default();
//!     let report = split_tree("books-md", "books-chapters", &config).await?;
//!     println!("{} documents split", report.split);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `any2md` and `mdsplit` binaries (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! mdcorpus = { version = "0.4", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! The converter shells out to whichever of these are on `PATH`; missing
//! tools degrade per format (a later chain entry takes over) rather than
//! failing the run:
//!
//! | Tool | Formats | Role |
//! |------|---------|------|
//! | `unstructured` | PDF | primary structure-aware extractor |
//! | `pdftotext`    | PDF | plain-text fallback |
//! | `pandoc`       | EPUB, DOCX | primary converter |
//! | `ebook-convert`| EPUB, MOBI, AZW, AZW3, LIT | Kindle-family fallback |
//! | `libreoffice`  | DOC, DOCX | office fallback |
//!
//! Plain text needs no tool at all, so `convert_tree` works on a bare
//! machine — it just fails the units whose formats need help.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod scheduler;
pub mod split;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConvertConfig, ConvertConfigBuilder, NoSplitAction, PreamblePolicy, SplitConfig,
    SplitConfigBuilder,
};
pub use convert::convert_tree;
pub use error::{CorpusError, UnitError};
pub use pipeline::adapter::AdapterKind;
pub use pipeline::tool::ToolSet;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{
    ConversionRecord, ConversionStatus, PlannedFile, RunReport, SplitRecord, SplitReport,
    SplitStatus,
};
pub use split::split_tree;
