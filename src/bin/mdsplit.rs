//! Chapter-splitter binary for mdcorpus.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `SplitConfig`, renders progress, and turns the run report into an
//! exit status.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mdcorpus::{
    split_tree, BatchProgressCallback, NoSplitAction, PreamblePolicy, ProgressCallback,
    SplitConfig, SplitReport,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

/// Terminal progress callback for split runs. Splitting is fast compared to
/// conversion, so this one skips per-unit timing and just logs outcomes.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
    skips: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Discovering documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
            skips: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Splitting");
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_units: usize) {
        self.activate_bar(total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Splitting {total_units} documents…"))
        ));
    }

    fn on_unit_start(&self, rel_path: &Path) {
        self.bar.set_message(rel_path.display().to_string());
    }

    fn on_unit_complete(&self, rel_path: &Path, output_bytes: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            rel_path.display(),
            dim(&format!("{output_bytes} bytes")),
        ));
        self.bar.inc(1);
    }

    fn on_unit_skipped(&self, rel_path: &Path) {
        self.skips.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} {}", dim("·"), rel_path.display()));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, rel_path: &Path, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            rel_path.display(),
            red(&error),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_units: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} of {} documents produced output",
                green("✔"),
                bold(&succeeded.to_string()),
                total_units,
            );
        } else {
            eprintln!(
                "{} {}/{} documents produced output  ({} failed)",
                cyan("⚠"),
                bold(&succeeded.to_string()),
                total_units,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split every book at `#` headings
  mdsplit --src books-md --dst books-chapters

  # Split at `##`, copying documents that have none
  mdsplit --src notes --dst notes-split --level 2 --no-split-action copy

  # Preview the plan without writing anything
  mdsplit --src books-md --dst books-chapters --dry-run

  # Re-split after boundary changes, wiping stale chapter files
  mdsplit --src books-md --dst books-chapters --force

  # Keep front matter as chapter zero
  mdsplit --src books-md --dst books-chapters --preamble keep

OUTPUT LAYOUT:
  <src>/guides/manual.md  →  <dst>/guides/manual/ch00_introduction.md
                             <dst>/guides/manual/ch01_setup.md
                             ...

  Chapter files are exact line ranges of the source: concatenating a
  document's chapters in order reproduces it byte-for-byte. A boundary is
  a heading of exactly the requested depth at the start of a line.

ENVIRONMENT VARIABLES:
  MDSPLIT_LEVEL     Heading depth (same as --level)
  MDSPLIT_WORKERS   Worker count (same as --workers)
  RUST_LOG          Override the log filter entirely

EXIT STATUS:
  0  every document split, copied, skipped, or had no boundary heading
  1  at least one document failed (unreadable, not UTF-8, write error);
     dry-run exits 1 only for such failures, never for planned writes
"#;

/// Split Markdown documents into per-chapter files.
#[derive(Parser, Debug)]
#[command(
    name = "mdsplit",
    version,
    about = "Split Markdown documents into chapter files at a fixed heading depth",
    long_about = "Walk a tree of Markdown documents and cut each one at headings of exactly \
the configured depth, producing one chNN_<slug>.md per section in a per-document directory \
that mirrors the source layout. Documents without a boundary heading follow the \
--no-split-action policy, and --dry-run reports the full plan without touching the \
filesystem.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source directory containing .md documents.
    #[arg(long, env = "MDSPLIT_SRC")]
    src: PathBuf,

    /// Destination root for chapter directories.
    #[arg(long, env = "MDSPLIT_DST")]
    dst: PathBuf,

    /// Heading depth that opens a new chapter (1 = '#', 2 = '##', ...).
    #[arg(short, long, env = "MDSPLIT_LEVEL", default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(1..=6))]
    level: u8,

    /// Concurrent documents (0 = one per CPU core).
    #[arg(short, long, env = "MDSPLIT_WORKERS", default_value_t = 1)]
    workers: usize,

    /// What to do with documents that contain no boundary heading.
    #[arg(long, env = "MDSPLIT_NO_SPLIT_ACTION", value_enum, default_value = "skip")]
    no_split_action: NoSplitActionArg,

    /// What to do with content before the first boundary heading.
    #[arg(long, env = "MDSPLIT_PREAMBLE", value_enum, default_value = "drop")]
    preamble: PreambleArg,

    /// Resplit documents whose chapters are already up to date.
    #[arg(short, long, env = "MDSPLIT_FORCE")]
    force: bool,

    /// Plan and report without writing anything.
    #[arg(long, env = "MDSPLIT_DRY_RUN")]
    dry_run: bool,

    /// Output the run report as JSON instead of a text summary.
    #[arg(long, env = "MDSPLIT_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "MDSPLIT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDSPLIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MDSPLIT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum NoSplitActionArg {
    Skip,
    Copy,
}

impl From<NoSplitActionArg> for NoSplitAction {
    fn from(v: NoSplitActionArg) -> Self {
        match v {
            NoSplitActionArg::Skip => NoSplitAction::Skip,
            NoSplitActionArg::Copy => NoSplitAction::Copy,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PreambleArg {
    Drop,
    Keep,
}

impl From<PreambleArg> for PreamblePolicy {
    fn from(v: PreambleArg) -> Self {
        match v {
            PreambleArg::Drop => PreamblePolicy::Drop,
            PreambleArg::Keep => PreamblePolicy::Keep,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    let mut builder = SplitConfig::builder()
        .level(cli.level)
        .workers(cli.workers)
        .force(cli.force)
        .dry_run(cli.dry_run)
        .no_split_action(cli.no_split_action.clone().into())
        .preamble(cli.preamble.clone().into());
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run the batch ────────────────────────────────────────────────────
    let report = split_tree(&cli.src, &cli.dst, &config)
        .await
        .context("Split run failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        // Dry-run: the planned file set goes to stdout so it can be piped.
        if report.dry_run && !cli.quiet {
            for file in report.records.iter().flat_map(|r| &r.files) {
                println!("{}", file.path.display());
            }
        }
        if !cli.quiet && !show_progress {
            print_summary(&report);
        } else if !cli.quiet {
            print_failures(&report);
        }
    }

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Plain-text run summary for progress-less runs.
fn print_summary(report: &SplitReport) {
    eprintln!(
        "Split {} documents{}, {} copied, {} without boundary, {} up to date, {} failed in {}ms",
        report.split,
        if report.dry_run { " (dry-run)" } else { "" },
        report.copied,
        report.unmatched,
        report.skipped,
        report.failed,
        report.total_duration_ms,
    );
    print_failures(report);
}

/// Per-kind failure breakdown plus the failing paths.
fn print_failures(report: &SplitReport) {
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

    for record in report.records.iter().filter(|r| r.error().is_some()) {
        if let Some(err) = record.error() {
            eprintln!("   {}  {}", record.rel_path.display(), dim(&err.to_string()));
        }
    }
}
