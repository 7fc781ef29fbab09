//! Pipeline stages for spreadsheet-to-QR generation.
//!
//! Each submodule implements exactly one transformation step; the
//! [`crate::Processor`] wires them together and runs the per-unit work on its
//! worker pools.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ encode ──▶ compose   (raster pages)
//! (xlsx)     (QR PNG)  └▶ document (docx, alternate)
//! ```
//!
//! 1. [`source`]: first-column values of the first sheet, scanned in batches
//! 2. [`encode`]: group records, render one QR PNG per group
//! 3. [`compose`]: tile code images onto fixed-size page PNGs
//! 4. [`document`]: tile code images into a paginated `.docx`
//!
//! [`layout`] holds the grid arithmetic shared by both composers, and
//! [`raster`] the PNG writer that stamps print resolution on every file.

use std::ops::Range;

pub mod compose;
pub mod document;
pub mod encode;
pub mod layout;
pub mod raster;
pub mod source;

/// Split `0..len` into consecutive ranges of at most `size` elements.
///
/// Every range but the last has exactly `size` elements; `len == 0` gives no
/// ranges. A `size` of 0 is treated as 1.
pub fn partition_ranges(len: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_without_gaps() {
        assert_eq!(partition_ranges(23, 10), vec![0..10, 10..20, 20..23]);
        assert_eq!(partition_ranges(20, 10), vec![0..10, 10..20]);
        assert_eq!(partition_ranges(3, 10), vec![0..3]);
    }

    #[test]
    fn empty_input_has_no_ranges() {
        assert!(partition_ranges(0, 10).is_empty());
    }

    #[test]
    fn zero_size_acts_as_one() {
        assert_eq!(partition_ranges(2, 0), vec![0..1, 1..2]);
    }
}
