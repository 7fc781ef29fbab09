//! Error types for the sheet2qr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Sheet2QrError`]: **Fatal**: the run cannot proceed at all (spreadsheet
//!   missing or unreadable, output directory not writable, invalid
//!   configuration). Returned as `Err(Sheet2QrError)` from the processor and
//!   the top-level `generate*` functions.
//!
//! * [`UnitError`]: **Non-fatal**: a single code group or a single page
//!   failed, every sibling unit is fine. Collected into
//!   [`crate::output::StageOutput`] and [`crate::output::RunOutput`] so callers
//!   can inspect partial success rather than losing the whole run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the sheet2qr library.
#[derive(Debug, Error)]
pub enum Sheet2QrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Spreadsheet was not found at the given path.
    #[error("Spreadsheet not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is not a readable workbook.
    #[error("Failed to read spreadsheet '{path}': {detail}")]
    SourceRead { path: PathBuf, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the output or working directory.
    #[error("Failed to create directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write or move an output file into place.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document output was requested but the `docx` feature is not compiled in.
    #[error("Document output is unavailable: sheet2qr was built without the `docx` feature")]
    DocumentUnavailable,

    /// The document could not be assembled or packed.
    #[error("Failed to write document '{path}': {detail}")]
    DocumentWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or request validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Sheet2QrError {
    /// Classify an I/O error raised while opening the input spreadsheet.
    pub(crate) fn from_open(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Sheet2QrError::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => Sheet2QrError::PermissionDenied { path },
            _ => Sheet2QrError::SourceRead {
                path,
                detail: err.to_string(),
            },
        }
    }
}

/// Pipeline stage a [`UnitError`] or progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Spreadsheet scan.
    Read,
    /// QR rendering, one unit per code group.
    Encode,
    /// Page rendering, one unit per page.
    Compose,
    /// Word document assembly.
    Document,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Encode => "encode",
            Stage::Compose => "compose",
            Stage::Document => "document",
        };
        f.write_str(name)
    }
}

/// A non-fatal error for a single code group or page.
///
/// The failed unit is dropped from the stage result; the run continues.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum UnitError {
    /// A code group could not be rendered or saved.
    #[error("Group {group} ({range}): QR generation failed: {detail}")]
    Encode {
        group: usize,
        range: String,
        detail: String,
    },

    /// A page could not be composed or saved.
    #[error("Page {page} ({range}): composition failed: {detail}")]
    Compose {
        page: usize,
        range: String,
        detail: String,
    },

    /// The worker running the unit panicked.
    #[error("{stage} task {index} panicked: {detail}")]
    Panicked {
        stage: Stage,
        index: usize,
        detail: String,
    },
}

impl UnitError {
    /// Submission index of the unit that failed.
    pub fn index(&self) -> usize {
        match self {
            UnitError::Encode { group, .. } => *group,
            UnitError::Compose { page, .. } => *page,
            UnitError::Panicked { index, .. } => *index,
        }
    }
}
