//! The long-lived [`Processor`] and the top-level `generate*` entry points.
//!
//! A `Processor` owns the configuration and both worker pools, so several
//! runs can share them; [`generate`] is the one-shot convenience that builds
//! a processor, runs once and shuts it down.
//!
//! Stages run strictly one after another (read → encode → compose or
//! document); only the units *within* a stage run concurrently.

use crate::config::{OutputFormat, PipelineConfig};
use crate::error::{Sheet2QrError, Stage, UnitError};
use crate::log::{Logger, TracingLogger};
use crate::output::{CodeImage, PageImage, RunOutput, RunStats, StageOutput};
use crate::pipeline::compose::{self, PageComposer};
use crate::pipeline::document::{self, DocumentOutput};
use crate::pipeline::encode;
use crate::pipeline::layout::PageLayout;
use crate::pipeline::source::{self, Record};
use crate::pool::{CancelFlag, WorkerPool};
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where to read from and write to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Spreadsheet path.
    pub input: PathBuf,
    /// 1-based data row of the first value, counted below the header row. Default: 1.
    pub start_row: u32,
    /// Directory receiving the pages (or document) and the working sub-directory.
    pub output_dir: PathBuf,
}

impl RunRequest {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            start_row: 1,
            output_dir: output_dir.into(),
        }
    }

    pub fn start_row(mut self, row: u32) -> Self {
        self.start_row = row;
        self
    }
}

/// Runs the pipeline on its own encode and compose pools.
pub struct Processor {
    config: Arc<PipelineConfig>,
    encode_pool: WorkerPool,
    compose_pool: WorkerPool,
    logger: Arc<dyn Logger>,
    progress: Option<ProgressCallback>,
}

impl Processor {
    /// Validate `config` and create the worker pools.
    pub fn new(config: PipelineConfig) -> Result<Self, Sheet2QrError> {
        config.validate()?;
        let encode_pool = WorkerPool::new(Stage::Encode, config.encode_workers);
        let compose_pool = WorkerPool::new(Stage::Compose, config.compose_workers);
        debug!(
            "Processor ready: {} encode / {} compose workers",
            encode_pool.size(),
            compose_pool.size()
        );
        Ok(Self {
            config: Arc::new(config),
            encode_pool,
            compose_pool,
            logger: Arc::new(TracingLogger),
            progress: None,
        })
    }

    /// Replace the default [`TracingLogger`].
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read the first-column records of `input` from data row `start_row` on.
    pub async fn read_records(
        &self,
        input: &Path,
        start_row: u32,
    ) -> Result<Vec<Record>, Sheet2QrError> {
        if let Some(cb) = &self.progress {
            cb.on_stage_start(Stage::Read, 0);
        }

        let path = input.to_path_buf();
        let batch_size = self.config.read_batch_size;
        let records = tokio::task::spawn_blocking(move || {
            source::read_first_column(&path, start_row, batch_size)
        })
        .await
        .map_err(|e| Sheet2QrError::Internal(format!("Read task panicked: {e}")))??;

        if let Some(cb) = &self.progress {
            cb.on_stage_complete(Stage::Read, records.len(), records.len());
        }
        Ok(records)
    }

    /// Group `records` and render one QR PNG per group into `work_dir`.
    pub async fn encode(
        &self,
        records: &[Record],
        work_dir: &Path,
        cancel: &CancelFlag,
    ) -> StageOutput<CodeImage> {
        let groups = encode::plan_groups(records, self.config.group_size);
        let total = groups.len();
        if let Some(cb) = &self.progress {
            cb.on_stage_start(Stage::Encode, total);
        }

        let work_dir = work_dir.to_path_buf();
        let qr = self.config.qr;
        let dpi = self.config.dpi;
        let collected = self
            .encode_pool
            .run_ordered(
                groups,
                move |_, group| encode::encode_group(&group, &work_dir, &qr, dpi),
                cancel,
                |index, result| self.report(Stage::Encode, index, total, result),
            )
            .await;

        let out = StageOutput::from(collected);
        if let Some(cb) = &self.progress {
            cb.on_stage_complete(Stage::Encode, total, out.items.len());
        }
        out
    }

    /// Tile `codes` onto pages written into `output_dir`.
    pub async fn compose_pages(
        &self,
        codes: &[CodeImage],
        output_dir: &Path,
        cancel: &CancelFlag,
    ) -> StageOutput<PageImage> {
        let composer = PageComposer::new(&self.config);
        let layout = composer.layout();
        debug!(
            "Page grid {}x{} ({} per page), tile {} px",
            layout.cols,
            layout.rows,
            layout.capacity(),
            layout.tile_side
        );

        let plans = compose::plan_pages(codes, layout.capacity());
        let total = plans.len();
        if let Some(cb) = &self.progress {
            cb.on_stage_start(Stage::Compose, total);
        }

        let output_dir = output_dir.to_path_buf();
        let collected = self
            .compose_pool
            .run_ordered(
                plans,
                move |_, plan| composer.compose(&plan, &output_dir),
                cancel,
                |index, result| self.report(Stage::Compose, index, total, result),
            )
            .await;

        let out = StageOutput::from(collected);
        if let Some(cb) = &self.progress {
            cb.on_stage_complete(Stage::Compose, total, out.items.len());
        }
        out
    }

    /// Write `codes` into a `.docx` in `output_dir`.
    pub async fn compose_document(
        &self,
        codes: &[CodeImage],
        output_dir: &Path,
    ) -> Result<DocumentOutput, Sheet2QrError> {
        if !document::is_available() {
            return Err(Sheet2QrError::DocumentUnavailable);
        }
        if let Some(cb) = &self.progress {
            cb.on_stage_start(Stage::Document, 1);
        }

        let codes = codes.to_vec();
        let config = Arc::clone(&self.config);
        let output_dir = output_dir.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            document::compose_document(&codes, &config, &output_dir)
        })
        .await
        .map_err(|e| Sheet2QrError::Internal(format!("Document task panicked: {e}")))?;

        if let Some(cb) = &self.progress {
            match &result {
                Ok(_) => cb.on_unit_complete(Stage::Document, 0, 1),
                Err(e) => cb.on_unit_error(Stage::Document, 0, 1, &e.to_string()),
            }
            cb.on_stage_complete(Stage::Document, 1, usize::from(result.is_ok()));
        }
        result
    }

    /// Run the whole pipeline for one spreadsheet.
    ///
    /// Returns `Err` only for fatal problems (unreadable input, output
    /// directory not writable, invalid request). Per-group and per-page
    /// failures are reported in [`RunOutput::unit_errors`].
    pub async fn run(
        &self,
        request: &RunRequest,
        cancel: &CancelFlag,
    ) -> Result<RunOutput, Sheet2QrError> {
        let total_start = Instant::now();
        let mut stats = RunStats::default();
        let mut output = RunOutput {
            records: 0,
            codes: Vec::new(),
            pages: Vec::new(),
            document: None,
            format: OutputFormat::Image,
            stats: RunStats::default(),
            cancelled: false,
            unit_errors: Vec::new(),
        };

        // ── Step 1: Read ─────────────────────────────────────────────────
        self.logger
            .info(&format!("Reading '{}' from data row {}", request.input.display(), request.start_row));
        let read_start = Instant::now();
        let records = self.read_records(&request.input, request.start_row).await?;
        stats.read_duration_ms = read_start.elapsed().as_millis() as u64;
        stats.records = records.len();
        output.records = records.len();
        self.logger.info(&format!(
            "Read {} records in {}ms",
            records.len(),
            stats.read_duration_ms
        ));

        if records.is_empty() {
            self.logger.info("No data found; nothing to generate");
            stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
            output.stats = stats;
            return Ok(output);
        }

        // ── Step 2: Prepare directories ──────────────────────────────────
        let work_dir = request.output_dir.join(&self.config.work_dir_name);
        for dir in [&request.output_dir, &work_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Sheet2QrError::OutputDirFailed {
                    path: dir.clone(),
                    source: e,
                })?;
        }

        // ── Step 3: Encode ───────────────────────────────────────────────
        let encode_start = Instant::now();
        let encoded = self.encode(&records, &work_dir, cancel).await;
        stats.encode_duration_ms = encode_start.elapsed().as_millis() as u64;
        stats.groups = records.len().div_ceil(self.config.group_size);
        stats.codes_written = encoded.items.len();
        stats.code_errors = encoded.errors.len();
        self.logger.info(&format!(
            "Generated {}/{} QR codes in {}ms",
            encoded.items.len(),
            stats.groups,
            stats.encode_duration_ms
        ));
        output.unit_errors.extend(encoded.errors);
        output.codes = encoded.items;

        if encoded.cancelled || cancel.is_cancelled() {
            self.logger.info("Cancelled after encoding; no pages composed");
            output.cancelled = true;
            stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
            output.stats = stats;
            return Ok(output);
        }

        // ── Step 4: Compose ──────────────────────────────────────────────
        let compose_start = Instant::now();
        let mut wrote_document = false;
        if self.config.output_format == OutputFormat::Docx {
            match self.compose_document(&output.codes, &request.output_dir).await {
                Ok(doc) => {
                    for skipped in &doc.skipped {
                        self.logger
                            .error(&format!("Code image left out of document: {}", skipped.display()));
                    }
                    self.logger.info(&format!(
                        "Wrote {} ({} pages, {} codes)",
                        doc.path.display(),
                        doc.pages,
                        doc.placed
                    ));
                    stats.pages_planned = doc.pages;
                    stats.pages_written = doc.pages;
                    output.document = Some(doc.path);
                    output.format = OutputFormat::Docx;
                    wrote_document = true;
                }
                Err(e) => {
                    self.logger
                        .error(&format!("{e}; falling back to image pages"));
                }
            }
        }

        if !wrote_document {
            let pages = self
                .compose_pages(&output.codes, &request.output_dir, cancel)
                .await;
            stats.pages_planned = output
                .codes
                .len()
                .div_ceil(PageLayout::compute(&self.config).capacity());
            stats.pages_written = pages.items.len();
            stats.page_errors = pages.errors.len();
            self.logger.info(&format!(
                "Composed {}/{} pages in {}ms",
                pages.items.len(),
                stats.pages_planned,
                compose_start.elapsed().as_millis()
            ));
            output.unit_errors.extend(pages.errors);
            output.pages = pages.items;
            output.cancelled = pages.cancelled;
        }
        stats.compose_duration_ms = compose_start.elapsed().as_millis() as u64;

        // ── Step 5: Clean up ─────────────────────────────────────────────
        if !self.config.keep_intermediate {
            match tokio::fs::remove_dir_all(&work_dir).await {
                Ok(()) => debug!("Removed working directory {}", work_dir.display()),
                Err(e) => warn!("Could not remove '{}': {}", work_dir.display(), e),
            }
        }

        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Run complete: {} records, {} codes, {} pages, {}ms",
            stats.records, stats.codes_written, stats.pages_written, stats.total_duration_ms
        );
        output.stats = stats;
        Ok(output)
    }

    /// Wait for every in-flight unit and close both pools.
    pub async fn shutdown(self) {
        self.encode_pool.shutdown().await;
        self.compose_pool.shutdown().await;
    }

    fn report<T>(&self, stage: Stage, index: usize, total: usize, result: Result<&T, &UnitError>) {
        match result {
            Ok(_) => {
                if let Some(cb) = &self.progress {
                    cb.on_unit_complete(stage, index, total);
                }
            }
            Err(e) => {
                self.logger.error(&e.to_string());
                if let Some(cb) = &self.progress {
                    cb.on_unit_error(stage, index, total, &e.to_string());
                }
            }
        }
    }
}

/// Run the pipeline once with a fresh processor.
///
/// # Example
/// ```rust,no_run
/// use sheet2qr::{generate, PipelineConfig, RunRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let request = RunRequest::new("codes.xlsx", "out").start_row(2);
/// let output = generate(&request, PipelineConfig::default()).await?;
/// println!("{} pages", output.pages.len());
/// # Ok(())
/// # }
/// ```
pub async fn generate(
    request: &RunRequest,
    config: PipelineConfig,
) -> Result<RunOutput, Sheet2QrError> {
    let processor = Processor::new(config)?;
    let result = processor.run(request, &CancelFlag::new()).await;
    processor.shutdown().await;
    result
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    request: &RunRequest,
    config: PipelineConfig,
) -> Result<RunOutput, Sheet2QrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Sheet2QrError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(generate(request, config))
}
