//! PNG output with print resolution metadata.
//!
//! `image`'s PNG encoder has no way to set the `pHYs` chunk, and without it
//! print dialogs assume 72 or 96 DPI and scale a 4960 px page to ~1.7 m. Files
//! are therefore encoded with the `png` crate directly.
//!
//! Writes go to a temp file in the destination directory and are renamed into
//! place, so a failed or interrupted write never leaves a truncated PNG where
//! a previous run's file used to be.

use image::{GrayImage, RgbImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Failure while writing or inspecting a PNG.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("PNG decoding failed: {0}")]
    Decode(#[from] png::DecodingError),
}

/// Dots per inch → pixels per metre, the unit `pHYs` stores.
pub fn dpi_to_ppm(dpi: u32) -> u32 {
    (f64::from(dpi) / 0.0254).round() as u32
}

/// Save an 8-bit grayscale image with `dpi` stamped in the file.
pub fn save_gray(img: &GrayImage, path: &Path, dpi: u32) -> Result<(), RasterError> {
    write_png(
        path,
        img.width(),
        img.height(),
        png::ColorType::Grayscale,
        img.as_raw(),
        dpi,
    )
}

/// Save an 8-bit RGB image with `dpi` stamped in the file.
pub fn save_rgb(img: &RgbImage, path: &Path, dpi: u32) -> Result<(), RasterError> {
    write_png(
        path,
        img.width(),
        img.height(),
        png::ColorType::Rgb,
        img.as_raw(),
        dpi,
    )
}

fn write_png(
    path: &Path,
    width: u32,
    height: u32,
    color: png::ColorType,
    raw: &[u8],
    dpi: u32,
) -> Result<(), RasterError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir)?;

    {
        let mut encoder = png::Encoder::new(tmp.as_file(), width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        let ppm = dpi_to_ppm(dpi);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header()?;
        writer.write_image_data(raw)?;
        writer.finish()?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Resolution stored in a PNG's `pHYs` chunk, rounded to whole DPI.
pub fn read_dpi(path: &Path) -> Result<Option<u32>, RasterError> {
    let decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    let reader = decoder.read_info()?;
    Ok(reader.info().pixel_dims.and_then(|dims| match dims.unit {
        png::Unit::Meter => Some((f64::from(dims.xppu) * 0.0254).round() as u32),
        png::Unit::Unspecified => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use tempfile::TempDir;

    #[test]
    fn ppm_conversion() {
        assert_eq!(dpi_to_ppm(600), 23622);
        assert_eq!(dpi_to_ppm(72), 2835);
    }

    #[test]
    fn gray_png_carries_dpi_and_decodes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("g.png");
        let img = GrayImage::from_pixel(7, 5, Luma([0]));

        save_gray(&img, &path, 600).unwrap();

        assert_eq!(read_dpi(&path).unwrap(), Some(600));
        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(back.dimensions(), (7, 5));
        assert_eq!(back.get_pixel(3, 3), &Luma([0]));
    }

    #[test]
    fn rgb_png_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.png");
        std::fs::write(&path, b"stale").unwrap();

        save_rgb(&RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])), &path, 300).unwrap();

        assert_eq!(read_dpi(&path).unwrap(), Some(300));
        assert_eq!(image::open(&path).unwrap().to_rgb8().dimensions(), (4, 4));
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("x.png");
        let err = save_gray(&GrayImage::new(1, 1), &path, 600).unwrap_err();
        assert!(matches!(err, RasterError::Io(_)));
    }
}
