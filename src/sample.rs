//! Sample workbook generator for load testing.
//!
//! Writes a single sheet with a `Data` header in A1 followed by `rows` random
//! 18-character identifiers (uppercase letters and digits), the shape the
//! reader expects.

use crate::error::Sheet2QrError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tracing::info;

/// Header written into A1.
pub const SAMPLE_HEADER: &str = "Data";

/// Length of every generated identifier.
pub const SAMPLE_ID_LEN: usize = 18;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// One random identifier.
pub fn random_id<R: Rng>(rng: &mut R) -> String {
    (0..SAMPLE_ID_LEN)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// Write `rows` identifiers below a header into `path`.
///
/// The same `seed` always produces the same identifiers; `None` seeds from
/// the OS.
pub fn write_sample_workbook(
    path: &Path,
    rows: u32,
    seed: Option<u64>,
) -> Result<(), Sheet2QrError> {
    let write_failed = |e: rust_xlsxwriter::XlsxError| Sheet2QrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    };

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, SAMPLE_HEADER).map_err(write_failed)?;
    for row in 1..=rows {
        sheet
            .write_string(row, 0, random_id(&mut rng))
            .map_err(write_failed)?;
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let io_failed = |source: std::io::Error| Sheet2QrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_failed)?;
    workbook
        .save_to_writer(tmp.as_file_mut())
        .map_err(write_failed)?;
    tmp.persist(path).map_err(|e| io_failed(e.error))?;

    info!("Wrote {} sample rows to {}", rows, path.display());
    Ok(())
}
