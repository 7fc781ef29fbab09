//! Source reader: first-column values of the first sheet of a workbook.
//!
//! `calamine` parses the sheet into a `Range` once; the scan over that range
//! is done in windows of `batch_size` rows by [`FirstColumnBatches`] so the
//! extracted values are built up batch by batch rather than by materialising
//! a transformed copy of the whole sheet. Batch size is a performance knob
//! only: the output is identical for every batch size.
//!
//! Sheet row 1 is a header and never yields a record. The start row counts
//! data rows below it, so start row 1 is sheet row 2. Records keep their
//! absolute 1-based sheet row. `calamine` trims leading empty rows and columns
//! from a `Range`, so every lookup goes through `Range::get_value` with
//! absolute coordinates.

use crate::error::Sheet2QrError;
use calamine::{open_workbook_auto, Data, Range, Reader};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Sheet rows above the data.
pub const HEADER_ROWS: u32 = 1;

/// One non-empty first-column cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based sheet row the value came from.
    pub row: u32,
    /// Cell text.
    pub value: String,
}

/// Read every non-empty first-column value from data row `start_row` on.
///
/// `start_row` is 1-based and counts rows below the header.
///
/// Blocking; the processor calls it from `spawn_blocking`.
pub fn read_first_column(
    path: &Path,
    start_row: u32,
    batch_size: usize,
) -> Result<Vec<Record>, Sheet2QrError> {
    if start_row == 0 {
        return Err(Sheet2QrError::InvalidConfig(
            "start row is 1-based, got 0".into(),
        ));
    }
    if batch_size == 0 {
        return Err(Sheet2QrError::InvalidConfig("batch size must be ≥ 1".into()));
    }

    // Classify missing/unreadable files before calamine turns them into an
    // opaque format error.
    std::fs::File::open(path).map_err(|e| Sheet2QrError::from_open(path.to_path_buf(), e))?;

    let source_err = |detail: String| Sheet2QrError::SourceRead {
        path: path.to_path_buf(),
        detail,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| source_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| source_err("workbook has no sheets".into()))?
        .map_err(|e| source_err(e.to_string()))?;

    let mut records = Vec::new();
    for (n, batch) in FirstColumnBatches::new(&range, start_row, batch_size).enumerate() {
        debug!("Batch {}: {} values", n + 1, batch.len());
        records.extend(batch);
    }

    info!(
        "Read {} records from '{}' starting at data row {}",
        records.len(),
        path.display(),
        start_row
    );
    Ok(records)
}

/// Iterator over windows of `batch_size` sheet rows, yielding the non-empty
/// first-column values of each window. The header row is never scanned.
pub struct FirstColumnBatches<'a> {
    range: &'a Range<Data>,
    /// Next absolute 0-based row to scan.
    next_row: u32,
    /// One past the last absolute 0-based row.
    end_row: u32,
    batch_size: u32,
}

impl<'a> FirstColumnBatches<'a> {
    pub fn new(range: &'a Range<Data>, start_row: u32, batch_size: usize) -> Self {
        let batch_size = u32::try_from(batch_size).unwrap_or(u32::MAX).max(1);
        let (next_row, end_row) = match (range.start(), range.end()) {
            // Data row n (1-based) is absolute 0-based row n - 1 + HEADER_ROWS.
            (Some(start), Some(end)) => (
                start_row
                    .max(1)
                    .saturating_sub(1)
                    .saturating_add(HEADER_ROWS)
                    .max(start.0),
                end.0.saturating_add(1),
            ),
            _ => (0, 0),
        };
        Self {
            range,
            next_row,
            end_row,
            batch_size,
        }
    }
}

impl Iterator for FirstColumnBatches<'_> {
    type Item = Vec<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.end_row {
            return None;
        }
        let stop = self
            .next_row
            .saturating_add(self.batch_size)
            .min(self.end_row);

        let batch = (self.next_row..stop)
            .filter_map(|row| {
                let value = self.range.get_value((row, 0)).and_then(cell_text)?;
                Some(Record {
                    row: row + 1,
                    value,
                })
            })
            .collect();

        self.next_row = stop;
        Some(batch)
    }
}

/// Text of a cell, or None for empty cells, empty strings and cell errors.
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            Some(format!("{}", *f as i64))
        }
        Data::Error(e) => {
            debug!("Skipping cell error {:?}", e);
            None
        }
        other => Some(other.to_string()),
    }
}
