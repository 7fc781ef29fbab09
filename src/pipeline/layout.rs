//! Page grid arithmetic, computed once per run.
//!
//! ```text
//! ┌──────────────── width_px ────────────────┐
//! │ margin                                   │
//! │        ┌─ title (margin + 100) ─┐        │   title block =
//! │        └────────────────────────┘        │   title_px + 100 + 250
//! │  ┌──────┬──────┬──────┐                  │
//! │  │ cell │ cell │ cell │  row-major,      │
//! │  ├──────┼──────┼──────┤  top-left first  │
//! │  │ cell │ cell │ cell │                  │
//! │  └──────┴──────┴──────┘                  │
//! │ margin (+ extra margin when titled)      │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The title block is reserved from the layout whenever a title is
//! configured, whether or not a font ends up being available, so every page
//! of a run shares the same grid.

use crate::config::{PageCapacity, PipelineConfig};
use serde::Serialize;

/// Gap between the top margin and the title baseline box.
pub const TITLE_TOP_GAP: u32 = 100;
/// Gap between the title and the first grid row.
pub const TITLE_BOTTOM_GAP: u32 = 250;

/// Side length in pixels of a code printed `side_cm` wide at `dpi`.
pub fn code_side_px(side_cm: f64, dpi: u32) -> u32 {
    ((side_cm / 2.54 * f64::from(dpi)) as u32).max(1)
}

/// Raster page layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageLayout {
    pub page_width: u32,
    pub page_height: u32,
    pub margin: u32,
    /// Target code side derived from the configured centimetres.
    pub code_px: u32,
    pub rows: u32,
    pub cols: u32,
    /// Vertical space reserved above the grid for the title (0 without title).
    pub title_block: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    /// Side of the square each code is resized to.
    pub tile_side: u32,
}

impl PageLayout {
    pub fn compute(config: &PipelineConfig) -> Self {
        let page = &config.page;
        let margin = page.margin_px;
        let titled = config.title_text().is_some();

        let title_block = if titled {
            config
                .title_px
                .saturating_add(TITLE_TOP_GAP)
                .saturating_add(TITLE_BOTTOM_GAP)
        } else {
            0
        };
        let bottom_reserve = if titled { margin } else { 0 };
        let both_margins = margin.saturating_mul(2);

        let usable_width = page.width_px.saturating_sub(both_margins).max(1);
        let usable_height = page
            .height_px
            .saturating_sub(
                both_margins
                    .saturating_add(title_block)
                    .saturating_add(bottom_reserve),
            )
            .max(1);

        let code_px = code_side_px(config.code_side_cm, config.dpi);
        let (rows, cols) = match page.capacity {
            PageCapacity::Derived => (
                (usable_height / code_px).max(1),
                (usable_width / code_px).max(1),
            ),
            PageCapacity::Fixed { rows, cols } => (rows.max(1), cols.max(1)),
        };

        let cell_width = (usable_width / cols).max(1);
        let cell_height = (usable_height / rows).max(1);

        Self {
            page_width: page.width_px,
            page_height: page.height_px,
            margin,
            code_px,
            rows,
            cols,
            title_block,
            cell_width,
            cell_height,
            tile_side: cell_width.min(cell_height),
        }
    }

    /// Codes per page.
    pub fn capacity(&self) -> usize {
        (self.rows as usize) * (self.cols as usize)
    }

    /// Top edge of the title text.
    pub fn title_top(&self) -> u32 {
        self.margin.saturating_add(TITLE_TOP_GAP)
    }

    /// Top-left pixel of the tile in grid `slot` (row-major), centred in its cell.
    pub fn slot_origin(&self, slot: usize) -> (u32, u32) {
        let slot = slot as u32;
        let col = slot % self.cols;
        let row = slot / self.cols;
        let x = self
            .margin
            .saturating_add(col.saturating_mul(self.cell_width))
            .saturating_add((self.cell_width - self.tile_side) / 2);
        let y = self
            .margin
            .saturating_add(self.title_block)
            .saturating_add(row.saturating_mul(self.cell_height))
            .saturating_add((self.cell_height - self.tile_side) / 2);
        (x, y)
    }
}

/// Word document layout, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DocumentLayout {
    pub rows: u32,
    pub cols: u32,
    /// Printed code side.
    pub code_cm: f64,
    /// Table column width (code + gutter).
    pub cell_cm: f64,
}

impl DocumentLayout {
    pub fn compute(config: &PipelineConfig) -> Self {
        let d = &config.document;
        let cell_cm = config.code_side_cm + d.gutter_cm;
        let usable_width = d.page_width_cm - 2.0 * d.margin_cm;
        let usable_height = d.page_height_cm - 2.0 * d.margin_cm;

        Self {
            rows: ((usable_height / cell_cm).floor() as u32).max(1),
            cols: ((usable_width / cell_cm).floor() as u32).max(1),
            code_cm: config.code_side_cm,
            cell_cm,
        }
    }

    pub fn capacity(&self) -> usize {
        (self.rows as usize) * (self.cols as usize)
    }
}
