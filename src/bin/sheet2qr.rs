//! CLI binary for sheet2qr.
//!
//! A thin shim over the library crate that maps CLI flags onto
//! `PipelineConfig`, drives a progress bar and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sheet2qr::{
    CancelFlag, OutputFormat, PipelineConfig, PipelineProgressCallback, Processor,
    ProgressCallback, RunOutput, RunRequest, Stage,
};
use std::io;
use std::path::PathBuf;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar reused for every stage: a spinner while reading or writing the
/// document, a counter while encoding and composing. Units complete out of
/// order, so only counts are shown.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn spinner(&self, prefix: &'static str, msg: &'static str) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn counter(&self, prefix: &'static str, unit: &str, total: usize) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>5}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total: usize) {
        match stage {
            Stage::Read => self.spinner("Reading", "Opening spreadsheet…"),
            Stage::Encode => self.counter("Encoding", "codes", total),
            Stage::Compose => self.counter("Composing", "pages", total),
            Stage::Document => self.spinner("Document", "Writing Word document…"),
        }
    }

    fn on_unit_complete(&self, _stage: Stage, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_unit_error(&self, stage: Stage, index: usize, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {} #{:<4} {}",
            red("✗"),
            stage,
            index + 1,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage, total: usize, success_count: usize) {
        let (label, unit) = match stage {
            Stage::Read => ("Read", "records"),
            Stage::Encode => ("Encoded", "codes"),
            Stage::Compose => ("Composed", "pages"),
            Stage::Document => ("Wrote", "documents"),
        };
        let mark = if success_count == total {
            green("✓")
        } else {
            cyan("⚠")
        };
        let counts = if stage == Stage::Read {
            total.to_string()
        } else {
            format!("{success_count}/{total}")
        };
        self.bar
            .println(format!("{} {} {} {}", mark, label, bold(&counts), unit));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Values in column A below the header row, pages into the current directory
  sheet2qr serials.xlsx

  # Start at the 101st value, write into ./labels
  sheet2qr serials.xlsx 101 --output_dir labels

  # 2.5 cm codes, five values per code, custom title
  sheet2qr serials.xlsx --code-size 2.5 --group-size 5 --title "Lot 42"

  # Word document instead of page images
  sheet2qr serials.xlsx --format docx

  # Settings from a JSON file (any subset of PipelineConfig fields)
  sheet2qr serials.xlsx --config sheet2qr.json

  # Machine-readable run report
  sheet2qr serials.xlsx --json > report.json

OUTPUT:
  <output_dir>/temp_qr/qr_row_<s>_<e>.png   one QR code per group of values
  <output_dir>/<start>-<end>.png            one A4 page at 600 DPI
  <output_dir>/code_listing.docx            with --format docx

  Press Ctrl-C to stop; pages already written are kept.
"#;

/// Generate print-ready QR code pages from a spreadsheet column.
#[derive(Parser, Debug)]
#[command(
    name = "sheet2qr",
    version,
    about = "Generate print-ready QR code pages from a spreadsheet column",
    long_about = "Reads the first column of the first sheet of a workbook (xlsx, xlsm, xlsb, \
xls, ods) below its header row, joins every group of values into one QR code and lays the codes out on A4 pages \
at 600 DPI, or into a Word document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Spreadsheet path.
    input: PathBuf,

    /// 1-based data row of the first value; sheet row 1 is always the header.
    #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    start_row: u32,

    /// Directory for pages, documents and the working sub-directory.
    #[arg(long = "output_dir", visible_alias = "output-dir", short, env = "SHEET2QR_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Spreadsheet rows scanned per batch [default: 5000].
    #[arg(long = "batch_size", visible_alias = "batch-size", env = "SHEET2QR_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// JSON file with PipelineConfig fields; flags override it.
    #[arg(long, env = "SHEET2QR_CONFIG")]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "SHEET2QR_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// Printed side length of each code in centimetres [default: 3.0].
    #[arg(long, env = "SHEET2QR_CODE_SIZE")]
    code_size: Option<f64>,

    /// Page title [default: "Material S/N List"].
    #[arg(long, env = "SHEET2QR_TITLE", conflicts_with = "no_title")]
    title: Option<String>,

    /// Compose pages without a title.
    #[arg(long)]
    no_title: bool,

    /// Values joined into one QR code [default: 10].
    #[arg(long, env = "SHEET2QR_GROUP_SIZE")]
    group_size: Option<usize>,

    /// Concurrent QR encoders [default: available parallelism].
    #[arg(long, env = "SHEET2QR_ENCODE_WORKERS")]
    encode_workers: Option<usize>,

    /// Concurrent page composers [default: min(encode workers, 4)].
    #[arg(long, env = "SHEET2QR_COMPOSE_WORKERS")]
    compose_workers: Option<usize>,

    /// Delete the per-group QR images after composing.
    #[arg(long)]
    clean_temp: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "SHEET2QR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SHEET2QR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SHEET2QR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SHEET2QR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Image,
    Docx,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Image => OutputFormat::Image,
            FormatArg::Docx => OutputFormat::Docx,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    let config = build_config(&cli)?;

    // ── Processor ────────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let mut processor = Processor::new(config).context("Invalid configuration")?;
    if let Some(cb) = &progress {
        processor = processor.with_progress(Arc::clone(cb) as ProgressCallback);
    }

    // Ctrl-C stops submitting work; whatever finished is kept.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} Cancelling… waiting for running units", cyan("⚠"));
                cancel.cancel();
            }
        });
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let request = RunRequest::new(&cli.input, &cli.output_dir).start_row(cli.start_row);
    let result = processor.run(&request, &cancel).await;
    if let Some(cb) = &progress {
        cb.finish();
    }
    processor.shutdown().await;

    let output = result.with_context(|| format!("Failed to process {}", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&cli, &output);
    }

    if output.cancelled {
        anyhow::bail!("Cancelled before completion");
    }
    if !output.unit_errors.is_empty() {
        anyhow::bail!("{} unit(s) failed", output.unit_errors.len());
    }
    Ok(())
}

/// Map CLI args onto the defaults or the `--config` file.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(n) = cli.batch_size {
        config.read_batch_size = n;
    }
    if let Some(format) = cli.format {
        config.output_format = format.into();
    }
    if let Some(cm) = cli.code_size {
        config.code_side_cm = cm;
    }
    if cli.no_title {
        config.title = None;
    } else if let Some(title) = &cli.title {
        config.title = Some(title.clone());
    }
    if let Some(n) = cli.group_size {
        config.group_size = n;
    }
    if let Some(n) = cli.encode_workers {
        config.encode_workers = n;
        if cli.compose_workers.is_none() {
            config.compose_workers = config.compose_workers.min(n);
        }
    }
    if let Some(n) = cli.compose_workers {
        config.compose_workers = n;
    }
    if cli.clean_temp {
        config.keep_intermediate = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_summary(cli: &Cli, output: &RunOutput) {
    if output.is_empty() {
        eprintln!(
            "{} No data found in column A from data row {} of {}",
            cyan("ℹ"),
            cli.start_row,
            cli.input.display()
        );
        return;
    }

    for err in &output.unit_errors {
        eprintln!("  {} {}", red("✗"), err);
    }

    let stats = &output.stats;
    let ok = output.unit_errors.is_empty() && !output.cancelled;
    let written = match &output.document {
        Some(path) => path.display().to_string(),
        None => format!("{} pages", stats.pages_written),
    };
    eprintln!(
        "{}  {} records  →  {}/{} codes  →  {}  {}",
        if ok { green("✔") } else { cyan("⚠") },
        stats.records,
        stats.codes_written,
        stats.groups,
        bold(&written),
        dim(&format!("{}ms", stats.total_duration_ms)),
    );
    if output.format == OutputFormat::Image && !output.pages.is_empty() {
        eprintln!("   {}", dim(&cli.output_dir.display().to_string()));
    }
}
