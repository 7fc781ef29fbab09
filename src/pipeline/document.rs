//! Word document output: the same code images laid out as one table per page.
//!
//! Only compiled with the `docx` feature; [`is_available`] lets the processor
//! decide before invoking whether to fall back to raster pages.

use crate::config::PipelineConfig;
use crate::error::Sheet2QrError;
use crate::output::CodeImage;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What a document run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOutput {
    pub path: PathBuf,
    /// Tables (pages) written.
    pub pages: usize,
    /// Code images placed.
    pub placed: usize,
    /// Code images that could not be read and were left out.
    pub skipped: Vec<PathBuf>,
}

/// Whether document output is compiled in.
pub fn is_available() -> bool {
    cfg!(feature = "docx")
}

#[cfg(feature = "docx")]
pub use imp::compose_document;

/// Document output without the `docx` feature: always unavailable.
#[cfg(not(feature = "docx"))]
pub fn compose_document(
    _codes: &[CodeImage],
    _config: &PipelineConfig,
    _output_dir: &Path,
) -> Result<DocumentOutput, Sheet2QrError> {
    Err(Sheet2QrError::DocumentUnavailable)
}

#[cfg(feature = "docx")]
mod imp {
    use super::*;
    use crate::pipeline::compose::plan_pages;
    use crate::pipeline::layout::DocumentLayout;
    use docx_rs::{
        AlignmentType, BreakType, Docx, PageMargin, Paragraph, Pic, Run, Style, StyleType, Table,
        TableAlignmentType, TableCell, TableRow, WidthType,
    };
    use tracing::{debug, warn};

    const EMU_PER_CM: f64 = 360_000.0;
    const TWIPS_PER_CM: f64 = 1440.0 / 2.54;
    /// Paragraph style of the document heading.
    const TITLE_STYLE_ID: &str = "Title";
    /// Title size in half-points (16 pt).
    const TITLE_HALF_POINTS: usize = 32;

    fn twips(cm: f64) -> u32 {
        (cm * TWIPS_PER_CM).round().max(0.0) as u32
    }

    fn emu(cm: f64) -> u32 {
        (cm * EMU_PER_CM).round().max(0.0) as u32
    }

    /// Write every code image into `<output_dir>/<document.file_name>`.
    ///
    /// Blocking. Unreadable code images are skipped and reported in
    /// [`DocumentOutput::skipped`]; the document is still written.
    pub fn compose_document(
        codes: &[CodeImage],
        config: &PipelineConfig,
        output_dir: &Path,
    ) -> Result<DocumentOutput, Sheet2QrError> {
        let settings = &config.document;
        let layout = DocumentLayout::compute(config);
        let path = output_dir.join(&settings.file_name);
        let write_failed = |detail: String| Sheet2QrError::DocumentWriteFailed {
            path: path.clone(),
            detail,
        };

        let margin = twips(settings.margin_cm) as i32;
        let mut docx = Docx::new()
            .page_size(twips(settings.page_width_cm), twips(settings.page_height_cm))
            .page_margin(
                PageMargin::new()
                    .top(margin)
                    .bottom(margin)
                    .left(margin)
                    .right(margin),
            );

        if let Some(title) = config.title_text() {
            docx = docx
                .add_style(
                    Style::new(TITLE_STYLE_ID, StyleType::Paragraph)
                        .name("Title")
                        .bold()
                        .size(TITLE_HALF_POINTS),
                )
                .add_paragraph(
                    Paragraph::new()
                        .style(TITLE_STYLE_ID)
                        .add_run(Run::new().add_text(title))
                        .align(AlignmentType::Center),
                );
        }

        let cols = layout.cols as usize;
        let cell_twips = twips(layout.cell_cm) as usize;
        let side_emu = emu(layout.code_cm);
        let pages = plan_pages(codes, layout.capacity());
        let mut placed = 0;
        let mut skipped = Vec::new();

        for page in &pages {
            if page.index > 0 {
                docx = docx.add_paragraph(
                    Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
                );
            }

            let rows: Vec<TableRow> = page
                .codes
                .chunks(cols)
                .map(|row| {
                    let mut cells: Vec<TableCell> = row
                        .iter()
                        .map(|code| {
                            let mut paragraph = Paragraph::new().align(AlignmentType::Center);
                            match read_image(&code.path) {
                                Ok(bytes) => {
                                    paragraph = paragraph.add_run(
                                        Run::new().add_image(Pic::new(&bytes).size(side_emu, side_emu)),
                                    );
                                    placed += 1;
                                }
                                Err(e) => {
                                    warn!("Skipping code image '{}': {}", code.path.display(), e);
                                    skipped.push(code.path.clone());
                                }
                            }
                            TableCell::new()
                                .add_paragraph(paragraph)
                                .width(cell_twips, WidthType::Dxa)
                        })
                        .collect();
                    while cells.len() < cols {
                        cells.push(
                            TableCell::new()
                                .add_paragraph(Paragraph::new())
                                .width(cell_twips, WidthType::Dxa),
                        );
                    }
                    TableRow::new(cells)
                })
                .collect();

            docx = docx.add_table(
                Table::new(rows)
                    .set_grid(vec![cell_twips; cols])
                    .align(TableAlignmentType::Center),
            );
            debug!("Document page {}: {} codes", page.index + 1, page.codes.len());
        }

        let mut tmp = tempfile::NamedTempFile::new_in(output_dir)
            .map_err(|e| write_failed(e.to_string()))?;
        docx.build()
            .pack(tmp.as_file_mut())
            .map_err(|e| write_failed(e.to_string()))?;
        tmp.persist(&path).map_err(|e| write_failed(e.error.to_string()))?;

        Ok(DocumentOutput {
            path,
            pages: pages.len(),
            placed,
            skipped,
        })
    }

    /// Read and validate a code image; `Pic::new` cannot report undecodable bytes.
    fn read_image(path: &Path) -> Result<Vec<u8>, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        image::load_from_memory(&bytes).map_err(|e| e.to_string())?;
        Ok(bytes)
    }

}
