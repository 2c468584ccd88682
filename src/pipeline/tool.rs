//! External converter invocations.
//!
//! Every supported tool is a black box with the same contract: given a
//! source path and an output path, produce Markdown (or a plain-text
//! approximation) or fail. This module owns the subprocess plumbing —
//! availability probes, argv construction, exit-status and empty-output
//! checks — so the adapter chains above it can treat strategies uniformly.
//!
//! All successful runs publish atomically: the tool writes to a temporary
//! path in the destination directory and the file is renamed into place
//! only after it is verified non-empty. A failed or killed run leaves no
//! partial destination file.

use crate::error::UnitError;
use crate::pipeline::write_atomic;
use std::path::Path;
use tokio::process::Command;

pub(crate) const UNSTRUCTURED: &str = "unstructured";
pub(crate) const PDFTOTEXT: &str = "pdftotext";
pub(crate) const PANDOC: &str = "pandoc";
pub(crate) const EBOOK_CONVERT: &str = "ebook-convert";
pub(crate) const LIBREOFFICE: &str = "libreoffice";

/// Which external converters are on PATH.
///
/// Resolved once per run via [`ToolSet::detect`], or injected directly
/// ([`ToolSet::none`], [`ToolSet::all`], or struct literal) by tests and
/// embedding applications that manage their own environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSet {
    pub unstructured: bool,
    pub pdftotext: bool,
    pub pandoc: bool,
    pub ebook_convert: bool,
    pub libreoffice: bool,
}

impl ToolSet {
    /// Every tool present. For tests and trusted environments.
    pub fn all() -> Self {
        Self {
            unstructured: true,
            pdftotext: true,
            pandoc: true,
            ebook_convert: true,
            libreoffice: true,
        }
    }

    /// No tool present. Built-in strategies (plain copy) still work.
    pub fn none() -> Self {
        Self {
            unstructured: false,
            pdftotext: false,
            pandoc: false,
            ebook_convert: false,
            libreoffice: false,
        }
    }

    /// Probe PATH for all five tools.
    pub async fn detect() -> Self {
        let (unstructured, pdftotext, pandoc, ebook_convert, libreoffice) = tokio::join!(
            probe(UNSTRUCTURED, "--help"),
            probe(PDFTOTEXT, "-v"),
            probe(PANDOC, "--version"),
            probe(EBOOK_CONVERT, "--version"),
            probe(LIBREOFFICE, "--version"),
        );
        Self {
            unstructured,
            pdftotext,
            pandoc,
            ebook_convert,
            libreoffice,
        }
    }

    pub(crate) fn has(&self, tool: &str) -> bool {
        match tool {
            UNSTRUCTURED => self.unstructured,
            PDFTOTEXT => self.pdftotext,
            PANDOC => self.pandoc,
            EBOOK_CONVERT => self.ebook_convert,
            LIBREOFFICE => self.libreoffice,
            _ => false,
        }
    }

    /// Names of the tools that were not found, for the preflight warning.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.unstructured {
            out.push(UNSTRUCTURED);
        }
        if !self.pdftotext {
            out.push(PDFTOTEXT);
        }
        if !self.pandoc {
            out.push(PANDOC);
        }
        if !self.ebook_convert {
            out.push(EBOOK_CONVERT);
        }
        if !self.libreoffice {
            out.push(LIBREOFFICE);
        }
        out
    }
}

/// Check whether `program` runs at all.
async fn probe(program: &str, arg: &str) -> bool {
    Command::new(program)
        .arg(arg)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

// ── Strategy runners ─────────────────────────────────────────────────────

/// PDF via the `unstructured` CLI. `ocr` routes through its OCR-only
/// strategy for scanned documents.
pub(crate) async fn run_unstructured(src: &Path, dst: &Path, ocr: bool) -> Result<(), UnitError> {
    let tmp = dst.with_extension("md.tmp");
    let mut cmd = Command::new(UNSTRUCTURED);
    cmd.arg("partition")
        .arg("pdf")
        .arg(src)
        .arg("--output-file")
        .arg(&tmp)
        .arg("--output-format")
        .arg("md")
        .arg("--chunking_strategy")
        .arg("by_title");
    if ocr {
        cmd.arg("--strategy").arg("ocr_only");
    }
    let run = run_tool(UNSTRUCTURED, &mut cmd).await;
    publish(UNSTRUCTURED, run, &tmp, dst).await
}

/// Plain-text PDF fallback via poppler's `pdftotext`.
pub(crate) async fn run_pdftotext(src: &Path, dst: &Path) -> Result<(), UnitError> {
    let tmp = dst.with_extension("md.tmp");
    let mut cmd = Command::new(PDFTOTEXT);
    cmd.arg("-layout")
        .arg("-nopgbrk")
        .arg("-enc")
        .arg("UTF-8")
        .arg(src)
        .arg(&tmp);
    let run = run_tool(PDFTOTEXT, &mut cmd).await;
    publish(PDFTOTEXT, run, &tmp, dst).await
}

/// EPUB or DOCX via pandoc. Input format is inferred from the source
/// extension; the output format must be explicit because the temp path
/// does not end in `.md`.
pub(crate) async fn run_pandoc(src: &Path, dst: &Path) -> Result<(), UnitError> {
    let tmp = dst.with_extension("md.tmp");
    let mut cmd = Command::new(PANDOC);
    cmd.arg(src).arg("-t").arg("markdown").arg("-o").arg(&tmp);
    let run = run_tool(PANDOC, &mut cmd).await;
    publish(PANDOC, run, &tmp, dst).await
}

/// Kindle-family formats via calibre's `ebook-convert`.
///
/// The tool derives its output plugin from the destination extension, so
/// it cannot write to a `.md.tmp` path. We hand it a dot-prefixed `.md`
/// temp file in the destination directory and persist on success; a leaked
/// temp is hidden and therefore invisible to later discovery walks.
pub(crate) async fn run_ebook_convert(src: &Path, dst: &Path) -> Result<(), UnitError> {
    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".ebook-convert-")
        .suffix(".md")
        .tempfile_in(parent)
        .map_err(|e| UnitError::io(parent, &e))?;

    let mut cmd = Command::new(EBOOK_CONVERT);
    cmd.arg(src).arg(tmp.path());
    run_tool(EBOOK_CONVERT, &mut cmd).await?;

    let size = tokio::fs::metadata(tmp.path())
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    if size == 0 {
        return Err(UnitError::ConversionFailed {
            tool: EBOOK_CONVERT.to_string(),
            detail: "produced no output".to_string(),
        });
    }

    tmp.persist(dst).map_err(|e| UnitError::io(dst, &e.error))?;
    Ok(())
}

/// Office documents via `libreoffice --headless`.
///
/// LibreOffice only converts "into a directory", naming the output after
/// the source stem, so it gets its own temp directory; the result is then
/// published atomically to the real destination.
pub(crate) async fn run_libreoffice(src: &Path, dst: &Path) -> Result<(), UnitError> {
    let outdir = tempfile::tempdir().map_err(|e| UnitError::io(dst, &e))?;

    let mut cmd = Command::new(LIBREOFFICE);
    cmd.arg("--headless")
        .arg("--convert-to")
        .arg("txt")
        .arg("--outdir")
        .arg(outdir.path())
        .arg(src);
    run_tool(LIBREOFFICE, &mut cmd).await?;

    // LibreOffice can exit 0 without producing anything (e.g. another
    // instance holds the profile lock); treat a missing file as a failure.
    let stem = src.file_stem().unwrap_or_default();
    let produced = outdir.path().join(stem).with_extension("txt");
    let text = tokio::fs::read(&produced)
        .await
        .map_err(|e| UnitError::ConversionFailed {
            tool: LIBREOFFICE.to_string(),
            detail: format!("no output file: {e}"),
        })?;
    if String::from_utf8_lossy(&text).trim().is_empty() {
        return Err(UnitError::ConversionFailed {
            tool: LIBREOFFICE.to_string(),
            detail: "produced no output".to_string(),
        });
    }

    write_atomic(dst, &text).await
}

/// Built-in strategy for plain text: byte-for-byte copy, atomically
/// published. An empty source legitimately yields an empty output.
pub(crate) async fn copy_plain(src: &Path, dst: &Path) -> Result<(), UnitError> {
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| UnitError::io(parent, &e))?;
    }
    let tmp = dst.with_extension("md.tmp");
    tokio::fs::copy(src, &tmp)
        .await
        .map_err(|e| UnitError::io(src, &e))?;
    if let Err(e) = tokio::fs::rename(&tmp, dst).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(UnitError::io(dst, &e));
    }
    Ok(())
}

// ── Subprocess plumbing ──────────────────────────────────────────────────

/// Run a prepared command, mapping the two interesting failure shapes:
/// binary not found → [`UnitError::ToolUnavailable`], non-zero exit →
/// [`UnitError::ConversionFailed`] with the stderr tail.
async fn run_tool(
    tool: &'static str,
    cmd: &mut Command,
) -> Result<std::process::Output, UnitError> {
    let output = match cmd.output().await {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UnitError::ToolUnavailable {
                tool: tool.to_string(),
            });
        }
        Err(e) => {
            return Err(UnitError::ConversionFailed {
                tool: tool.to_string(),
                detail: e.to_string(),
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let detail = if stderr.is_empty() {
            output.status.to_string()
        } else {
            // The end of a tool's stderr carries the actual error; the head
            // is usually banner noise.
            format!("{} — {}", output.status, tail(stderr, 400))
        };
        return Err(UnitError::ConversionFailed {
            tool: tool.to_string(),
            detail,
        });
    }

    Ok(output)
}

/// Verify the temp output and rename it into place, cleaning up on error.
async fn publish(
    tool: &'static str,
    run: Result<std::process::Output, UnitError>,
    tmp: &Path,
    dst: &Path,
) -> Result<(), UnitError> {
    if let Err(e) = run {
        let _ = tokio::fs::remove_file(tmp).await;
        return Err(e);
    }

    let size = tokio::fs::metadata(tmp).await.map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        let _ = tokio::fs::remove_file(tmp).await;
        return Err(UnitError::ConversionFailed {
            tool: tool.to_string(),
            detail: "produced no output".to_string(),
        });
    }

    tokio::fs::rename(tmp, dst)
        .await
        .map_err(|e| UnitError::io(dst, &e))
}

/// Last `max` bytes of `s`, adjusted to a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
