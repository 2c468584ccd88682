//! Batch converter binary for mdcorpus.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConvertConfig`, renders progress, and turns the run report into an
//! exit status.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mdcorpus::{convert_tree, BatchProgressCallback, ConvertConfig, ProgressCallback, RunReport};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and one log line
/// per unit using [indicatif]. Designed to work correctly when units
/// complete out-of-order (workers > 1).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-unit wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<PathBuf, Instant>>,
    /// Count of units that failed.
    errors: AtomicUsize,
    /// Count of units skipped as up to date.
    skips: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically by
    /// `on_batch_start` (called once discovery knows the unit count).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Discovering files…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
            skips: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_units: usize) {
        self.activate_bar(total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_units} files…"))
        ));
    }

    fn on_unit_start(&self, rel_path: &Path) {
        self.start_times
            .lock()
            .unwrap()
            .insert(rel_path.to_path_buf(), Instant::now());
        self.bar.set_message(rel_path.display().to_string());
    }

    fn on_unit_complete(&self, rel_path: &Path, output_bytes: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(rel_path)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            rel_path.display(),
            dim(&format!("{output_bytes:>7} bytes")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_unit_skipped(&self, rel_path: &Path) {
        self.skips.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            dim("·"),
            rel_path.display(),
            dim("up to date"),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, rel_path: &Path, error: String) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(rel_path)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let mut msg: String = error.chars().take(79).collect();
        if msg.len() < error.len() {
            msg.push('…');
        }

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            rel_path.display(),
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_units: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        let skipped = self.skips.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} files converted, {} up to date",
                green("✔"),
                bold(&succeeded.to_string()),
                skipped,
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed, {} up to date)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total_units,
                red(&failed.to_string()),
                skipped,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Mirror ./books as Markdown under ./books-md
  any2md books books-md

  # Reconvert everything, ignoring mtimes
  any2md --force books books-md

  # Only PDFs and EPUBs, four workers
  any2md --extensions pdf,epub --workers 4 books books-md

  # Scanned documents: OCR the PDFs
  any2md --ocr scans scans-md

  # Machine-readable run report
  any2md --json books books-md > report.json

SUPPORTED FORMATS:
  Extension               Chain (first success wins)
  ─────────────────────   ──────────────────────────────────────
  .pdf                    unstructured → pdftotext  (--ocr: OCR only)
  .epub                   pandoc → ebook-convert
  .mobi .azw .azw3 .lit   ebook-convert
  .docx                   pandoc → libreoffice
  .doc                    libreoffice
  .txt                    built-in copy (no tool needed)

  Anything else is recorded as failed (unsupported-format). Use
  --extensions to keep such files out of the run entirely.

EXTERNAL TOOLS:
  unstructured       pip install "unstructured[pdf]"
  pdftotext          poppler-utils
  pandoc             https://pandoc.org
  ebook-convert      calibre
  libreoffice        https://libreoffice.org

  Missing tools are reported at startup; affected units fall back to the
  next strategy in their chain or fail with tool-unavailable.

ENVIRONMENT VARIABLES:
  ANY2MD_WORKERS     Worker count (same as --workers)
  ANY2MD_EXTENSIONS  Extension allow-list (same as --extensions)
  RUST_LOG           Override the log filter entirely

EXIT STATUS:
  0  every unit converted or was up to date
  1  at least one unit failed — the cause sits beside each missing
     output in <output>.error.txt
"#;

/// Batch-convert a document tree to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "any2md",
    version,
    about = "Batch-convert a document tree (PDF, EPUB, Kindle, Office) to Markdown",
    long_about = "Walk a source tree and convert every document to Markdown, mirroring the \
directory layout under the destination. Formats dispatch to external converters through \
per-format fallback chains; unchanged files are skipped on re-runs, and one bad file never \
aborts the batch.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source directory to convert.
    src_dir: PathBuf,

    /// Destination directory for the Markdown mirror.
    dst_dir: PathBuf,

    /// Concurrent conversions (0 = one per CPU core).
    #[arg(short, long, env = "ANY2MD_WORKERS", default_value_t = 0)]
    workers: usize,

    /// Reconvert even when the output is already up to date.
    #[arg(short, long, env = "ANY2MD_FORCE")]
    force: bool,

    /// Route PDFs through the OCR strategy (for scanned documents).
    #[arg(long, env = "ANY2MD_OCR")]
    ocr: bool,

    /// Only convert these extensions (comma-separated, e.g. pdf,epub).
    #[arg(long, env = "ANY2MD_EXTENSIONS", value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// Skip writing <output>.error.txt reports for failed units.
    #[arg(long, env = "ANY2MD_NO_ERROR_REPORTS")]
    no_error_reports: bool,

    /// Output the run report as JSON instead of a text summary.
    #[arg(long, env = "ANY2MD_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "ANY2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ANY2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ANY2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar owns the terminal while active; suppress INFO-level
    // library logs underneath it so the two don't interleave.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let mut builder = ConvertConfig::builder()
        .workers(cli.workers)
        .force(cli.force)
        .ocr(cli.ocr)
        .error_reports(!cli.no_error_reports);
    if let Some(ref exts) = cli.extensions {
        builder = builder.extensions(exts.iter().map(String::as_str));
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run the batch ────────────────────────────────────────────────────
    let report = convert_tree(&cli.src_dir, &cli.dst_dir, &config)
        .await
        .context("Conversion run failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        print_summary(&report);
    } else if !cli.quiet {
        // The callback already printed the per-unit log and final tick;
        // add the failure breakdown when there is one.
        print_failures(&report);
    }

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Plain-text run summary for progress-less runs.
fn print_summary(report: &RunReport) {
    eprintln!(
        "Converted {} files, {} up to date, {} failed in {}ms",
        report.converted, report.skipped, report.failed, report.total_duration_ms
    );
    print_failures(report);
}

/// Per-kind failure breakdown plus the first few failing paths.
fn print_failures(report: &RunReport) {
    if report.failed == 0 {
        return;
    }

    let breakdown: Vec<String> = report
        .error_kind_counts()
        .iter()
        .map(|(kind, n)| format!("{n} {kind}"))
        .collect();
    eprintln!(
        "{} {}",
        red("✗"),
        bold(&format!("Failures: {}", breakdown.join(", ")))
    );

    let failed: Vec<_> = report.records.iter().filter(|r| r.error().is_some()).collect();
    for record in failed.iter().take(10) {
        if let Some(err) = record.error() {
            // First line only; some errors carry a multi-line install hint.
            let cause = err.to_string();
            let cause = cause.lines().next().unwrap_or_default().to_string();
            eprintln!("   {}  {}", record.rel_path.display(), dim(&cause));
        }
    }
    if failed.len() > 10 {
        eprintln!("   {}", dim(&format!("… and {} more", failed.len() - 10)));
    }
}
