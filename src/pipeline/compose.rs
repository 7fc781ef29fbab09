//! Page composition: tile code images onto fixed-size white pages.
//!
//! Pages partition the code images in order; within a page codes fill the
//! grid row-major from the top-left. Every page of a run uses the same
//! [`PageLayout`], so a half-empty last page keeps the codes at the same
//! positions as a full one.
//!
//! A page is only written once every one of its codes has been placed: an
//! unreadable code image fails the page rather than leaving a gap in it.

use crate::config::PipelineConfig;
use crate::error::UnitError;
use crate::output::{CodeImage, PageImage};
use crate::pipeline::layout::PageLayout;
use crate::pipeline::partition_ranges;
use crate::pipeline::raster;
use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fonts tried, in order, when no title font is configured or it fails to load.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\simhei.ttf",
];

/// The codes assigned to one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    /// Page position (0-based).
    pub index: usize,
    pub codes: Vec<CodeImage>,
}

impl PagePlan {
    /// `start` of the first code.
    pub fn start(&self) -> usize {
        self.codes.first().map_or(0, |c| c.start)
    }

    /// `end` of the last code.
    pub fn end(&self) -> usize {
        self.codes.last().map_or(0, |c| c.end)
    }

    pub fn range_label(&self) -> String {
        format!("{}-{}", self.start(), self.end())
    }

    /// File name of the composed page.
    pub fn file_name(&self) -> String {
        format!("{}.png", self.range_label())
    }
}

/// Partition code images into pages of at most `capacity`, preserving order.
pub fn plan_pages(codes: &[CodeImage], capacity: usize) -> Vec<PagePlan> {
    partition_ranges(codes.len(), capacity)
        .into_iter()
        .enumerate()
        .map(|(index, range)| PagePlan {
            index,
            codes: codes[range].to_vec(),
        })
        .collect()
}

/// Load the title font from `configured`, falling back to well-known system fonts.
///
/// Returns None (after a warning) when nothing loads.
pub fn load_title_font(configured: Option<&Path>) -> Option<Arc<FontVec>> {
    locate_title_font(configured).map(|(_, font)| font)
}

/// Like [`load_title_font`], also returning the path the font came from.
pub fn locate_title_font(configured: Option<&Path>) -> Option<(PathBuf, Arc<FontVec>)> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                debug!("Title font: {}", path.display());
                return Some((path, Arc::new(font)));
            }
            Err(e) => warn!("Ignoring unusable font '{}': {}", path.display(), e),
        }
    }

    if let Some(path) = configured {
        warn!("Title font '{}' could not be loaded", path.display());
    }
    warn!("No usable title font found; pages will be composed without a title");
    None
}

/// Everything needed to draw pages; cheap to clone into worker closures.
#[derive(Clone)]
pub struct PageComposer {
    layout: PageLayout,
    title: Option<String>,
    font: Option<Arc<FontVec>>,
    title_px: u32,
    dpi: u32,
}

impl PageComposer {
    /// Compute the layout and load the title font once for the run.
    pub fn new(config: &PipelineConfig) -> Self {
        let title = config.title_text().map(str::to_string);
        let font = match title {
            Some(_) => load_title_font(config.title_font.as_deref()),
            None => None,
        };
        Self {
            layout: PageLayout::compute(config),
            title,
            font,
            title_px: config.title_px,
            dpi: config.dpi,
        }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Draw one page and save it as `<start>-<end>.png` in `output_dir`.
    pub fn compose(&self, plan: &PagePlan, output_dir: &Path) -> Result<PageImage, UnitError> {
        let fail = |detail: String| UnitError::Compose {
            page: plan.index,
            range: plan.range_label(),
            detail,
        };

        if plan.codes.len() > self.layout.capacity() {
            return Err(fail(format!(
                "{} codes exceed page capacity {}",
                plan.codes.len(),
                self.layout.capacity()
            )));
        }

        let canvas = self.draw(plan).map_err(fail)?;
        let path = output_dir.join(plan.file_name());
        raster::save_rgb(&canvas, &path, self.dpi).map_err(|e| fail(e.to_string()))?;

        debug!(
            "Composed page {} ({} codes) → {}",
            plan.index + 1,
            plan.codes.len(),
            path.display()
        );

        Ok(PageImage {
            index: plan.index,
            path,
            start: plan.start(),
            end: plan.end(),
            codes: plan.codes.len(),
        })
    }

    fn draw(&self, plan: &PagePlan) -> Result<RgbImage, String> {
        let l = &self.layout;
        let mut canvas = RgbImage::from_pixel(l.page_width, l.page_height, Rgb([255, 255, 255]));

        if let (Some(title), Some(font)) = (&self.title, &self.font) {
            let scale = PxScale::from(self.title_px as f32);
            let (text_w, _) = text_size(scale, &**font, title);
            let x = l.page_width.saturating_sub(text_w) / 2;
            draw_text_mut(
                &mut canvas,
                Rgb([0, 0, 0]),
                x as i32,
                l.title_top() as i32,
                scale,
                &**font,
                title,
            );
        }

        for (slot, code) in plan.codes.iter().enumerate() {
            let img = image::open(&code.path)
                .map_err(|e| format!("cannot read '{}': {}", code.path.display(), e))?
                .to_luma8();
            let tile = imageops::resize(&img, l.tile_side, l.tile_side, FilterType::Lanczos3);
            let tile = DynamicImage::ImageLuma8(tile).to_rgb8();
            let (x, y) = l.slot_origin(slot);
            imageops::replace(&mut canvas, &tile, i64::from(x), i64::from(y));
        }

        Ok(canvas)
    }
}
