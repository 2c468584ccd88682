//! Format adapter registry.
//!
//! Maps file extensions to a closed set of adapter kinds, each carrying an
//! ordered chain of conversion strategies. Chains encode "best structure
//! first, plainest last": the head strategy produces the richest Markdown,
//! later entries trade fidelity for availability. A strategy is attempted
//! only when its tool is on PATH and it applies to the unit's extension;
//! the chain advances on recoverable failures and the unit fails with the
//! last error once the chain is exhausted.

use crate::error::UnitError;
use crate::pipeline::tool::{self, ToolSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// The closed set of format families the converter understands.
///
/// `Unsupported` is deliberately a member rather than an `Option`: an
/// unknown extension is a planned, reportable outcome of dispatch, not an
/// absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterKind {
    /// `.pdf` — structural extraction, optionally OCR.
    Pdf,
    /// `.epub`, `.mobi`, `.azw`, `.azw3`, `.lit` — e-book formats.
    EpubFamily,
    /// `.doc`, `.docx` — office documents.
    DocFamily,
    /// `.txt` — already plain; copied through.
    Text,
    /// Everything else; always fails with `unsupported-format`.
    Unsupported,
}

impl AdapterKind {
    /// Dispatch on a lowercased extension (no leading dot), as produced by
    /// discovery.
    pub fn for_extension(ext: &str) -> Self {
        match ext {
            "pdf" => AdapterKind::Pdf,
            "epub" | "mobi" | "azw" | "azw3" | "lit" => AdapterKind::EpubFamily,
            "doc" | "docx" => AdapterKind::DocFamily,
            "txt" => AdapterKind::Text,
            _ => AdapterKind::Unsupported,
        }
    }

    /// The kind's ordered fallback chain. The OCR toggle swaps the PDF
    /// chain wholesale: OCR output and text-layer output disagree on
    /// scanned documents, so mixing the two in one chain would make a
    /// run's results depend on which strategy happened to fail.
    pub(crate) fn strategies(&self, ocr: bool) -> &'static [Strategy] {
        match self {
            AdapterKind::Pdf => {
                if ocr {
                    &[Strategy::UnstructuredOcr]
                } else {
                    &[Strategy::Unstructured, Strategy::Pdftotext]
                }
            }
            AdapterKind::EpubFamily => &[Strategy::Pandoc, Strategy::EbookConvert],
            AdapterKind::DocFamily => &[Strategy::Pandoc, Strategy::Libreoffice],
            AdapterKind::Text => &[Strategy::CopyPlain],
            AdapterKind::Unsupported => &[],
        }
    }
}

/// One way of turning a source file into Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    Unstructured,
    UnstructuredOcr,
    Pdftotext,
    Pandoc,
    EbookConvert,
    Libreoffice,
    CopyPlain,
}

impl Strategy {
    /// Name recorded in results and logs.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Strategy::Unstructured => "unstructured",
            Strategy::UnstructuredOcr => "unstructured-ocr",
            Strategy::Pdftotext => "pdftotext",
            Strategy::Pandoc => "pandoc",
            Strategy::EbookConvert => "ebook-convert",
            Strategy::Libreoffice => "libreoffice",
            Strategy::CopyPlain => "copy",
        }
    }

    fn required_tool(&self) -> Option<&'static str> {
        match self {
            Strategy::Unstructured | Strategy::UnstructuredOcr => Some(tool::UNSTRUCTURED),
            Strategy::Pdftotext => Some(tool::PDFTOTEXT),
            Strategy::Pandoc => Some(tool::PANDOC),
            Strategy::EbookConvert => Some(tool::EBOOK_CONVERT),
            Strategy::Libreoffice => Some(tool::LIBREOFFICE),
            Strategy::CopyPlain => None,
        }
    }

    /// Whether the strategy can handle the given extension. Pandoc reads
    /// only the zip-packaged members of its families; the rest of each
    /// chain takes everything its kind routes to it.
    fn applies_to(&self, extension: &str) -> bool {
        match self {
            Strategy::Pandoc => matches!(extension, "epub" | "docx"),
            _ => true,
        }
    }

    async fn run(&self, src: &Path, dst: &Path) -> Result<(), UnitError> {
        match self {
            Strategy::Unstructured => tool::run_unstructured(src, dst, false).await,
            Strategy::UnstructuredOcr => tool::run_unstructured(src, dst, true).await,
            Strategy::Pdftotext => tool::run_pdftotext(src, dst).await,
            Strategy::Pandoc => tool::run_pandoc(src, dst).await,
            Strategy::EbookConvert => tool::run_ebook_convert(src, dst).await,
            Strategy::Libreoffice => tool::run_libreoffice(src, dst).await,
            Strategy::CopyPlain => tool::copy_plain(src, dst).await,
        }
    }
}

/// Walk a kind's chain until one strategy publishes `dst`.
///
/// Returns the name of the winning strategy. On exhaustion, the unit fails
/// with the last recoverable error — or `unsupported-format` when the kind
/// had no applicable strategy at all.
pub(crate) async fn run_chain(
    kind: AdapterKind,
    extension: &str,
    src: &Path,
    dst: &Path,
    ocr: bool,
    tools: &ToolSet,
) -> Result<&'static str, UnitError> {
    let mut last_err: Option<UnitError> = None;

    for strategy in kind.strategies(ocr) {
        if !strategy.applies_to(extension) {
            continue;
        }
        if let Some(required) = strategy.required_tool() {
            if !tools.has(required) {
                debug!(
                    "{}: skipping strategy '{}' ('{}' not on PATH)",
                    src.display(),
                    strategy.name(),
                    required
                );
                last_err = Some(UnitError::ToolUnavailable {
                    tool: required.to_string(),
                });
                continue;
            }
        }

        match strategy.run(src, dst).await {
            Ok(()) => return Ok(strategy.name()),
            Err(e) if e.is_recoverable() => {
                warn!(
                    "{}: strategy '{}' failed, trying next: {}",
                    src.display(),
                    strategy.name(),
                    e
                );
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| UnitError::UnsupportedFormat {
        extension: extension.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extension_dispatch_covers_the_closed_set() {
        assert_eq!(AdapterKind::for_extension("pdf"), AdapterKind::Pdf);
        for ext in ["epub", "mobi", "azw", "azw3", "lit"] {
            assert_eq!(AdapterKind::for_extension(ext), AdapterKind::EpubFamily);
        }
        for ext in ["doc", "docx"] {
            assert_eq!(AdapterKind::for_extension(ext), AdapterKind::DocFamily);
        }
        assert_eq!(AdapterKind::for_extension("txt"), AdapterKind::Text);
        assert_eq!(AdapterKind::for_extension("xyz"), AdapterKind::Unsupported);
        assert_eq!(AdapterKind::for_extension(""), AdapterKind::Unsupported);
    }

    #[test]
    fn pdf_chain_is_swapped_wholesale_by_ocr() {
        assert_eq!(
            AdapterKind::Pdf.strategies(false),
            &[Strategy::Unstructured, Strategy::Pdftotext]
        );
        assert_eq!(AdapterKind::Pdf.strategies(true), &[Strategy::UnstructuredOcr]);
    }

    #[test]
    fn chains_order_structure_before_plainness() {
        assert_eq!(
            AdapterKind::EpubFamily.strategies(false),
            &[Strategy::Pandoc, Strategy::EbookConvert]
        );
        assert_eq!(
            AdapterKind::DocFamily.strategies(false),
            &[Strategy::Pandoc, Strategy::Libreoffice]
        );
        assert_eq!(AdapterKind::Text.strategies(false), &[Strategy::CopyPlain]);
        assert!(AdapterKind::Unsupported.strategies(false).is_empty());
    }

    #[test]
    fn pandoc_applies_only_to_zip_packaged_members() {
        assert!(Strategy::Pandoc.applies_to("epub"));
        assert!(Strategy::Pandoc.applies_to("docx"));
        assert!(!Strategy::Pandoc.applies_to("mobi"));
        assert!(!Strategy::Pandoc.applies_to("doc"));
        assert!(Strategy::EbookConvert.applies_to("mobi"));
        assert!(Strategy::Libreoffice.applies_to("doc"));
    }

    #[tokio::test]
    async fn chain_without_tools_fails_as_tool_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("book.epub");
        let dst = dir.path().join("book.md");
        fs::write(&src, "not a real epub").unwrap();

        let err = run_chain(
            AdapterKind::EpubFamily,
            "epub",
            &src,
            &dst,
            false,
            &ToolSet::none(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "tool-unavailable");
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn unsupported_kind_fails_as_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("data.xyz");
        let dst = dir.path().join("data.md");
        fs::write(&src, "?").unwrap();

        let err = run_chain(
            AdapterKind::Unsupported,
            "xyz",
            &src,
            &dst,
            false,
            &ToolSet::all(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "unsupported-format");
    }

    #[tokio::test]
    async fn text_chain_needs_no_tools() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        let dst = dir.path().join("notes.md");
        fs::write(&src, "plain text\n").unwrap();

        let winner = run_chain(
            AdapterKind::Text,
            "txt",
            &src,
            &dst,
            false,
            &ToolSet::none(),
        )
        .await
        .unwrap();
        assert_eq!(winner, "copy");
        assert_eq!(fs::read_to_string(&dst).unwrap(), "plain text\n");
    }

    #[tokio::test]
    async fn mobi_reports_the_tool_it_actually_needed() {
        // Pandoc never applies to .mobi, so the failure must name
        // ebook-convert, not pandoc.
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("book.mobi");
        let dst = dir.path().join("book.md");
        fs::write(&src, "?").unwrap();

        let err = run_chain(
            AdapterKind::EpubFamily,
            "mobi",
            &src,
            &dst,
            false,
            &ToolSet::none(),
        )
        .await
        .unwrap_err();
        match err {
            UnitError::ToolUnavailable { tool } => assert_eq!(tool, "ebook-convert"),
            other => panic!("expected ToolUnavailable, got {other:?}"),
        }
    }
}
