//! Writes a workbook of random identifiers for load-testing `sheet2qr`.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sheet2qr::sample::write_sample_workbook;
use std::path::PathBuf;
use std::time::Duration;

/// Generate a test workbook: a `Data` header followed by random 18-character IDs.
#[derive(Parser, Debug)]
#[command(name = "sheet2qr-sample", version)]
struct Cli {
    /// Workbook to write.
    #[arg(default_value = "test_data.xlsx")]
    output: PathBuf,

    /// Number of identifiers.
    #[arg(short, long, default_value_t = 100_000)]
    rows: u32,

    /// Seed for reproducible data.
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let spinner = (!cli.quiet).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Writing {} rows to {}", cli.rows, cli.output.display()));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    write_sample_workbook(&cli.output, cli.rows, cli.seed)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
        let size = std::fs::metadata(&cli.output).map(|m| m.len()).unwrap_or(0);
        eprintln!(
            "Wrote {} rows to {} ({:.2} MB)",
            cli.rows,
            cli.output.display(),
            size as f64 / (1024.0 * 1024.0)
        );
    }
    Ok(())
}
