//! # sheet2qr
//!
//! Turn a spreadsheet column of short identifiers (serial numbers, lot
//! codes) into print-ready sheets of QR codes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! workbook
//!  │
//!  ├─ 1. Read     first column of the first sheet, below the header row
//!  ├─ 2. Encode   groups of 10 values joined with ';' → one QR PNG each
//!  ├─ 3. Compose  codes tiled row-major onto A4 pages at 600 DPI
//!  │              (or into a paginated .docx with the `docx` feature)
//!  └─ 4. Output   <start>-<end>.png per page + per-run stats
//! ```
//!
//! Encoding and composition run on two bounded worker pools owned by a
//! [`Processor`]; each stage returns its units in input order regardless of
//! which finished first, so reruns produce the same files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheet2qr::{generate, PipelineConfig, RunRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Sheet row 1 is the header; data row 1 is the first value.
//!     let request = RunRequest::new("serials.xlsx", "labels");
//!     let output = generate(&request, PipelineConfig::default()).await?;
//!     eprintln!("{} codes on {} pages", output.codes.len(), output.pages.len());
//!     for err in &output.unit_errors {
//!         eprintln!("  {err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `sheet2qr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `docx`   | on      | Word document output via `docx-rs` |
//! | `sample` | on      | [`sample`] module and the `sheet2qr-sample` binary |
//!
//! Without `docx`, a run configured for document output logs the problem and
//! composes image pages instead.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod log;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod processor;
pub mod progress;
#[cfg(feature = "sample")]
pub mod sample;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DocumentSettings, ErrorCorrection, OutputFormat, PageCapacity, PageSettings, PipelineConfig,
    PipelineConfigBuilder, QrSettings,
};
pub use error::{Sheet2QrError, Stage, UnitError};
pub use log::{Logger, MemoryLogger, TracingLogger};
pub use output::{CodeImage, PageImage, RunOutput, RunStats, StageOutput};
pub use pipeline::source::Record;
pub use pool::CancelFlag;
pub use processor::{generate, generate_sync, Processor, RunRequest};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
