//! Configuration types for a sheet-to-QR run.
//!
//! Every knob of the pipeline lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`] or loaded from a JSON file. The config is handed
//! to [`crate::Processor`] at construction and shared read-only by every
//! stage, so two runs with equal configs lay out identical pages.
//!
//! All structs use `#[serde(default)]`: a JSON file only needs the fields it
//! wants to change.

use crate::error::Sheet2QrError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Delimiter used to join the records of one code group.
pub const GROUP_DELIMITER: &str = ";";

/// Height of the title glyphs at 600 DPI (0.92 cm printed).
pub const DEFAULT_TITLE_PX: u32 = 217;

/// Default page title.
pub const DEFAULT_TITLE: &str = "Material S/N List";

/// Configuration for one or more pipeline runs.
///
/// # Example
/// ```rust
/// use sheet2qr::{PipelineConfig, OutputFormat};
///
/// let config = PipelineConfig::builder()
///     .group_size(10)
///     .code_side_cm(3.0)
///     .title(None::<String>)
///     .output_format(OutputFormat::Image)
///     .build()
///     .unwrap();
/// assert_eq!(config.group_size, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records joined into a single QR code. Default: 10.
    pub group_size: usize,

    /// QR symbol settings.
    pub qr: QrSettings,

    /// Resolution stamped on every PNG and used for cm → px conversion. Default: 600.
    pub dpi: u32,

    /// Raster page geometry.
    pub page: PageSettings,

    /// Printed side length of one code in centimetres. Default: 3.0.
    pub code_side_cm: f64,

    /// Title drawn at the top of every page and document. Default: "Material S/N List".
    pub title: Option<String>,

    /// TrueType/OpenType font for the title. If None, well-known system fonts are tried.
    pub title_font: Option<PathBuf>,

    /// Title glyph height in pixels. Default: 217.
    pub title_px: u32,

    /// Word document geometry.
    pub document: DocumentSettings,

    /// Encode pool size. Default: available parallelism.
    pub encode_workers: usize,

    /// Compose pool size. Pages are ~100 MB canvases, so this stays small. Default: min(encode_workers, 4).
    pub compose_workers: usize,

    /// Rows scanned per spreadsheet batch. Default: 5000.
    pub read_batch_size: usize,

    /// Working sub-directory (below the output directory) for per-group PNGs. Default: "temp_qr".
    pub work_dir_name: String,

    /// Keep per-group PNGs after composition. Default: true.
    pub keep_intermediate: bool,

    /// Raster pages or a Word document. Default: [`OutputFormat::Image`].
    pub output_format: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let encode_workers = default_encode_workers();
        Self {
            group_size: 10,
            qr: QrSettings::default(),
            dpi: 600,
            page: PageSettings::default(),
            code_side_cm: 3.0,
            title: Some(DEFAULT_TITLE.to_string()),
            title_font: None,
            title_px: DEFAULT_TITLE_PX,
            document: DocumentSettings::default(),
            encode_workers,
            compose_workers: encode_workers.min(4),
            read_batch_size: 5000,
            work_dir_name: "temp_qr".to_string(),
            keep_intermediate: true,
            output_format: OutputFormat::default(),
        }
    }
}

fn default_encode_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load a (possibly partial) JSON config file over the defaults and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Sheet2QrError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Sheet2QrError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: PipelineConfig = serde_json::from_str(&text).map_err(|e| {
            Sheet2QrError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Title text if one is configured and not blank.
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), Sheet2QrError> {
        let invalid = |msg: String| Err(Sheet2QrError::InvalidConfig(msg));

        if self.group_size == 0 {
            return invalid("group_size must be ≥ 1".into());
        }
        if !(1..=40).contains(&self.qr.version) {
            return invalid(format!("QR version must be 1–40, got {}", self.qr.version));
        }
        if self.qr.box_size == 0 {
            return invalid("QR box_size must be ≥ 1".into());
        }
        if self.dpi == 0 {
            return invalid("dpi must be ≥ 1".into());
        }
        if !(self.code_side_cm.is_finite() && self.code_side_cm > 0.0) {
            return invalid(format!(
                "code side length must be > 0 cm, got {}",
                self.code_side_cm
            ));
        }
        let p = &self.page;
        let fits = |side: u32| p.margin_px.checked_mul(2).is_some_and(|m| m < side);
        if !fits(p.width_px) || !fits(p.height_px) {
            return invalid(format!(
                "page {}x{} px leaves no room inside a {} px margin",
                p.width_px, p.height_px, p.margin_px
            ));
        }
        if self.title_text().is_some() && self.title_px >= p.height_px {
            return invalid(format!(
                "title_px must be below the page height ({} px), got {}",
                p.height_px, self.title_px
            ));
        }
        if let PageCapacity::Fixed { rows, cols } = p.capacity {
            if rows == 0 || cols == 0 {
                return invalid("fixed page capacity needs rows ≥ 1 and cols ≥ 1".into());
            }
        }
        let d = &self.document;
        if d.page_width_cm <= 2.0 * d.margin_cm || d.page_height_cm <= 2.0 * d.margin_cm {
            return invalid("document margins leave no usable area".into());
        }
        if d.gutter_cm < 0.0 {
            return invalid("document gutter must be ≥ 0".into());
        }
        if d.file_name.trim().is_empty() {
            return invalid("document file name must not be empty".into());
        }
        if self.encode_workers == 0 || self.compose_workers == 0 {
            return invalid("worker pool sizes must be ≥ 1".into());
        }
        if self.read_batch_size == 0 {
            return invalid("read_batch_size must be ≥ 1".into());
        }
        if self.work_dir_name.trim().is_empty() {
            return invalid("work_dir_name must not be empty".into());
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn group_size(mut self, n: usize) -> Self {
        self.config.group_size = n.max(1);
        self
    }

    pub fn qr(mut self, qr: QrSettings) -> Self {
        self.config.qr = qr;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.max(1);
        self
    }

    pub fn page(mut self, page: PageSettings) -> Self {
        self.config.page = page;
        self
    }

    pub fn page_capacity(mut self, capacity: PageCapacity) -> Self {
        self.config.page.capacity = capacity;
        self
    }

    pub fn code_side_cm(mut self, cm: f64) -> Self {
        self.config.code_side_cm = cm;
        self
    }

    pub fn title(mut self, title: Option<impl Into<String>>) -> Self {
        self.config.title = title.map(Into::into);
        self
    }

    pub fn title_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.title_font = Some(path.into());
        self
    }

    pub fn title_px(mut self, px: u32) -> Self {
        self.config.title_px = px.max(1);
        self
    }

    pub fn document(mut self, document: DocumentSettings) -> Self {
        self.config.document = document;
        self
    }

    pub fn encode_workers(mut self, n: usize) -> Self {
        self.config.encode_workers = n.max(1);
        self
    }

    pub fn compose_workers(mut self, n: usize) -> Self {
        self.config.compose_workers = n.max(1);
        self
    }

    pub fn read_batch_size(mut self, n: usize) -> Self {
        self.config.read_batch_size = n.max(1);
        self
    }

    pub fn work_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.work_dir_name = name.into();
        self
    }

    pub fn keep_intermediate(mut self, v: bool) -> Self {
        self.config.keep_intermediate = v;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Sheet2QrError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Nested settings ──────────────────────────────────────────────────────

/// QR symbol settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrSettings {
    /// Minimum symbol version (1–40). Larger versions are used when the data does not fit. Default: 2.
    pub version: i16,
    /// Error correction level. Default: High.
    pub error_correction: ErrorCorrection,
    /// Pixels per module. Default: 12.
    pub box_size: u32,
    /// Quiet zone width in modules. Default: 4.
    pub border: u32,
}

impl Default for QrSettings {
    fn default() -> Self {
        Self {
            version: 2,
            error_correction: ErrorCorrection::High,
            box_size: 12,
            border: 4,
        }
    }
}

/// QR error correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    /// ~7 % recovery.
    Low,
    /// ~15 % recovery.
    Medium,
    /// ~25 % recovery.
    Quartile,
    /// ~30 % recovery; survives smudged labels. (default)
    #[default]
    High,
}

/// Raster page geometry, in pixels at the configured DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSettings {
    /// Default: 4960 (A4 at 600 DPI).
    pub width_px: u32,
    /// Default: 7016 (A4 at 600 DPI).
    pub height_px: u32,
    /// Outer margin on every side. Default: 200.
    pub margin_px: u32,
    /// How many codes a page holds. Default: derived from the code side length.
    pub capacity: PageCapacity,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            width_px: 4960,
            height_px: 7016,
            margin_px: 200,
            capacity: PageCapacity::default(),
        }
    }
}

/// How the page grid is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCapacity {
    /// Fit as many `code_side_cm` codes as the usable area allows. (default)
    #[default]
    Derived,
    /// Fixed grid, e.g. 5 × 3 = 15 codes per page.
    Fixed { rows: u32, cols: u32 },
}

/// Word document geometry, in centimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Default: 21.0 (A4).
    pub page_width_cm: f64,
    /// Default: 29.7 (A4).
    pub page_height_cm: f64,
    /// Margin on every side. Default: 1.0.
    pub margin_cm: f64,
    /// Spacing added to each code when sizing table cells. Default: 0.5.
    pub gutter_cm: f64,
    /// File written into the output directory. Default: "code_listing.docx".
    pub file_name: String,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            page_width_cm: 21.0,
            page_height_cm: 29.7,
            margin_cm: 1.0,
            gutter_cm: 0.5,
            file_name: "code_listing.docx".to_string(),
        }
    }
}

/// Final output of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One PNG per page. (default)
    #[default]
    Image,
    /// One `.docx` with a table per page. Falls back to `Image` when unavailable.
    Docx,
}
