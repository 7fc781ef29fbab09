//! Output types returned by the processor and the top-level `generate*` functions.

use crate::config::OutputFormat;
use crate::error::UnitError;
use crate::pool::Collected;
use serde::Serialize;
use std::path::PathBuf;

/// One rendered QR code on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeImage {
    /// Group submission index (0-based).
    pub index: usize,
    pub path: PathBuf,
    /// 1-based record position of the first record in the group.
    pub start: usize,
    /// 1-based record position of the last record in the group, inclusive.
    pub end: usize,
}

impl CodeImage {
    pub fn range_label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// One composed page on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageImage {
    /// Page position (0-based).
    pub index: usize,
    pub path: PathBuf,
    /// `start` of the first code on the page.
    pub start: usize,
    /// `end` of the last code on the page.
    pub end: usize,
    /// Number of codes placed.
    pub codes: usize,
}

impl PageImage {
    pub fn range_label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Result of one pooled stage: successful units in submission order plus the
/// units that failed.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutput<T> {
    pub items: Vec<T>,
    pub errors: Vec<UnitError>,
    /// Cancellation was observed; `items` holds only units that completed.
    pub cancelled: bool,
}

impl<T> Default for StageOutput<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
            cancelled: false,
        }
    }
}

impl<T> From<Collected<T>> for StageOutput<T> {
    fn from(c: Collected<T>) -> Self {
        Self {
            items: c.items.into_iter().map(|(_, v)| v).collect(),
            errors: c.errors,
            cancelled: c.cancelled,
        }
    }
}

/// Complete result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// Records read from the spreadsheet.
    pub records: usize,
    /// Code images written, in group order.
    pub codes: Vec<CodeImage>,
    /// Pages written, in page order. Empty in document mode.
    pub pages: Vec<PageImage>,
    /// The `.docx` written, when document output succeeded.
    pub document: Option<PathBuf>,
    /// What was actually produced (document requests may fall back to images).
    pub format: OutputFormat,
    pub stats: RunStats,
    pub cancelled: bool,
    /// Every non-fatal unit failure of the run.
    pub unit_errors: Vec<UnitError>,
}

impl RunOutput {
    /// True when the spreadsheet held no records and nothing was written.
    pub fn is_empty(&self) -> bool {
        self.records == 0 && self.codes.is_empty() && self.pages.is_empty() && self.document.is_none()
    }
}

/// Counts and timings for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub records: usize,
    pub groups: usize,
    pub codes_written: usize,
    pub code_errors: usize,
    pub pages_planned: usize,
    pub pages_written: usize,
    pub page_errors: usize,
    pub read_duration_ms: u64,
    pub encode_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub total_duration_ms: u64,
}
