//! QR encoding: one code group → one grayscale PNG in the working directory.
//!
//! Records are grouped in input order and joined with `;` so a single scan
//! yields a whole group. The file name carries the group's `(start, end)`
//! range, so the order is recoverable from the directory listing even though
//! the encode pool finishes groups out of order.
//!
//! The configured QR version is a minimum; it grows when a group's text does
//! not fit.

use crate::config::{ErrorCorrection, QrSettings, GROUP_DELIMITER};
use crate::error::UnitError;
use crate::output::CodeImage;
use crate::pipeline::partition_ranges;
use crate::pipeline::raster;
use crate::pipeline::source::Record;
use image::{GrayImage, Luma};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode, Version};
use std::path::Path;
use tracing::debug;

/// A contiguous run of records encoded into one code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeGroup {
    /// Submission index (0-based).
    pub index: usize,
    /// 1-based position of the first record in the record list.
    pub start: usize,
    /// 1-based position of the last record, inclusive.
    pub end: usize,
    /// Record values joined with [`GROUP_DELIMITER`].
    pub text: String,
}

impl CodeGroup {
    pub fn range_label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }

    /// File name of this group's PNG.
    pub fn file_name(&self) -> String {
        format!("qr_row_{}_{}.png", self.start, self.end)
    }
}

/// Partition records into groups of at most `group_size`, preserving order.
pub fn plan_groups(records: &[Record], group_size: usize) -> Vec<CodeGroup> {
    partition_ranges(records.len(), group_size)
        .into_iter()
        .enumerate()
        .map(|(index, range)| CodeGroup {
            index,
            start: range.start + 1,
            end: range.end,
            text: records[range]
                .iter()
                .map(|r| r.value.as_str())
                .collect::<Vec<_>>()
                .join(GROUP_DELIMITER),
        })
        .collect()
}

impl From<ErrorCorrection> for EcLevel {
    fn from(ec: ErrorCorrection) -> Self {
        match ec {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

/// Render `text` as a QR symbol with a white quiet zone of `settings.border` modules.
pub fn render_code(text: &str, settings: &QrSettings) -> Result<GrayImage, QrError> {
    let ec: EcLevel = settings.error_correction.into();
    let code = match QrCode::with_version(text.as_bytes(), Version::Normal(settings.version), ec) {
        Ok(code) => code,
        // The configured version is a floor; let the encoder pick the smallest that fits.
        Err(QrError::DataTooLong) => QrCode::with_error_correction_level(text.as_bytes(), ec)?,
        Err(e) => return Err(e),
    };

    let box_size = settings.box_size.max(1);
    let symbol = code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(box_size, box_size)
        .build();

    let pad = settings.border * box_size;
    let mut canvas = GrayImage::from_pixel(
        symbol.width() + 2 * pad,
        symbol.height() + 2 * pad,
        Luma([255]),
    );
    image::imageops::replace(&mut canvas, &symbol, i64::from(pad), i64::from(pad));
    Ok(canvas)
}

/// Render one group and save it into `work_dir`.
pub fn encode_group(
    group: &CodeGroup,
    work_dir: &Path,
    settings: &QrSettings,
    dpi: u32,
) -> Result<CodeImage, UnitError> {
    let fail = |detail: String| UnitError::Encode {
        group: group.index,
        range: group.range_label(),
        detail,
    };

    let img = render_code(&group.text, settings).map_err(|e| fail(e.to_string()))?;
    let path = work_dir.join(group.file_name());
    raster::save_gray(&img, &path, dpi).map_err(|e| fail(e.to_string()))?;

    debug!(
        "Encoded group {} → {} ({}x{} px)",
        group.range_label(),
        path.display(),
        img.width(),
        img.height()
    );

    Ok(CodeImage {
        index: group.index,
        path,
        start: group.start,
        end: group.end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn records(n: usize) -> Vec<Record> {
        (1..=n)
            .map(|i| Record {
                row: i as u32,
                value: format!("SN{i:04}"),
            })
            .collect()
    }

    #[test]
    fn twenty_three_records_make_three_groups() {
        let groups = plan_groups(&records(23), 10);
        let ranges: Vec<String> = groups.iter().map(CodeGroup::range_label).collect();
        assert_eq!(ranges, vec!["1-10", "11-20", "21-23"]);
        assert_eq!(groups[2].text, "SN0021;SN0022;SN0023");
        assert_eq!(groups[1].index, 1);
    }

    #[test]
    fn groups_reconstruct_input() {
        let input = records(41);
        for size in [1, 3, 10, 41, 100] {
            let groups = plan_groups(&input, size);
            assert_eq!(groups.len(), 41usize.div_ceil(size));
            let joined: Vec<String> = groups
                .iter()
                .flat_map(|g| g.text.split(GROUP_DELIMITER).map(str::to_string))
                .collect();
            let original: Vec<String> = input.iter().map(|r| r.value.clone()).collect();
            assert_eq!(joined, original, "size {size}");
            assert!(groups[..groups.len() - 1]
                .iter()
                .all(|g| g.end - g.start + 1 == size));
        }
    }

    #[test]
    fn no_records_no_groups() {
        assert!(plan_groups(&[], 10).is_empty());
    }

    #[test]
    fn short_text_uses_configured_version() {
        let img = render_code("A;B", &QrSettings::default()).unwrap();
        // version 2 = 25 modules, plus 4-module border each side, 12 px per module
        assert_eq!(img.dimensions(), ((25 + 8) * 12, (25 + 8) * 12));
        // border is white, finder pattern corner is black
        assert_eq!(img.get_pixel(0, 0), &Luma([255]));
        assert_eq!(img.get_pixel(4 * 12, 4 * 12), &Luma([0]));
    }

    #[test]
    fn long_text_grows_version() {
        let text = (0..10)
            .map(|i| format!("ABCDEFGHJKLMNP{i:04}"))
            .collect::<Vec<_>>()
            .join(";");
        let img = render_code(&text, &QrSettings::default()).unwrap();
        assert!(img.width() > 33 * 12, "width {}", img.width());
    }

    #[test]
    fn border_and_box_size_are_honoured() {
        let settings = QrSettings {
            version: 1,
            error_correction: ErrorCorrection::Low,
            box_size: 2,
            border: 0,
        };
        let img = render_code("x", &settings).unwrap();
        assert_eq!(img.width(), 21 * 2);
    }

    #[test]
    fn encode_group_writes_named_png() {
        let dir = TempDir::new().unwrap();
        let group = &plan_groups(&records(12), 10)[1];

        let code = encode_group(group, dir.path(), &QrSettings::default(), 600).unwrap();

        assert_eq!(code.path, dir.path().join("qr_row_11_12.png"));
        assert_eq!((code.start, code.end, code.index), (11, 12, 1));
        assert_eq!(raster::read_dpi(&code.path).unwrap(), Some(600));
    }

    #[test]
    fn encode_group_reports_write_failure() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let group = &plan_groups(&records(3), 10)[0];

        let err = encode_group(group, &missing, &QrSettings::default(), 600).unwrap_err();
        assert!(matches!(err, UnitError::Encode { group: 0, .. }));
        assert!(err.to_string().contains("1-3"));
    }
}
