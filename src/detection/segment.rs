use image::imageops::{self, FilterType};
use tracing::{debug, instrument};

use crate::detection::ScanConfig;
use crate::detection::binarize::MaskSet;
use crate::models::{BinaryMask, CellRect, CellVariant, GridSpec};

/// Candidate crop rectangles for one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellGeometry {
    /// Standard inset; also used for the emptiness test
    pub base: CellRect,
    /// Smaller horizontal inset for glyphs bleeding toward the padding
    pub wide: CellRect,
    /// Taller crop for the bottom row of 3x9 tickets, whose digits sit low
    pub tall: Option<CellRect>,
}

impl CellGeometry {
    /// Rectangles in the order variants are tried
    pub fn candidates(&self) -> Vec<CellRect> {
        let mut rects = vec![self.base, self.wide];
        rects.extend(self.tall);
        rects
    }
}

/// A grid cell with its emptiness verdict and variant plan
#[derive(Debug, Clone)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub ink_ratio: f32,
    pub empty: bool,
    pub rects: Vec<CellRect>,
}

impl Cell {
    /// Recognition variants, rendered one at a time as they are pulled.
    ///
    /// Masks form the outer loop (cleaned before raw, global before
    /// adaptive) and rectangles the inner loop. Empty cells yield nothing.
    pub fn variants<'a>(
        &'a self,
        masks: &'a MaskSet,
        config: &'a ScanConfig,
    ) -> impl Iterator<Item = CellVariant> + 'a {
        let rects: &'a [CellRect] = if self.empty { &[] } else { &self.rects };
        masks
            .in_order()
            .into_iter()
            .flat_map(move |mask| rects.iter().map(move |rect| render_variant(mask, rect, config)))
    }

    pub fn variant_count(&self) -> usize {
        if self.empty { 0 } else { self.rects.len() * 4 }
    }
}

/// Compute the padded crop rectangles for (row, col)
pub fn cell_geometry(
    grid: &GridSpec,
    row: u32,
    col: u32,
    mask_width: u32,
    mask_height: u32,
    config: &ScanConfig,
) -> CellGeometry {
    let cell_w = grid.cell_width as i64;
    let cell_h = grid.cell_height as i64;
    let x = col as i64 * cell_w;
    let y = row as i64 * cell_h;

    let pad_y_ratio = if grid.is_canonical() { config.pad_y_canonical } else { config.pad_y };
    let pad_y = floor(cell_h, pad_y_ratio);
    let edge_col = col == 0 || col + 1 == grid.cols;
    let pad_x = floor(cell_w, if edge_col { config.pad_x_edge } else { config.pad_x });
    let pad_x_wide = floor(cell_w, config.pad_x_wide).max(2);

    let low_row = grid.is_canonical() && row + 1 == grid.rows;
    let extra_y = if low_row { -floor(pad_y, 0.15) } else { 0 };
    let tall_up = if low_row { floor(cell_h, 0.06) } else { 0 };

    let (mw, mh) = (mask_width as i64, mask_height as i64);
    let rect_for = |px: i64, dy: i64, extra_h: i64| {
        let rx = (x + px).clamp(0, (mw - 1).max(0));
        let ry = (y + pad_y + extra_y + dy).clamp(0, (mh - 1).max(0));
        let rw = (cell_w - 2 * px).min(mw - rx).max(1);
        let rh = (cell_h - 2 * pad_y - extra_y - dy + extra_h).min(mh - ry).max(1);
        CellRect {
            x: rx as u32,
            y: ry as u32,
            width: rw as u32,
            height: rh as u32,
        }
    };

    CellGeometry {
        base: rect_for(pad_x, 0, 0),
        wide: rect_for(pad_x_wide, 0, 0),
        tall: (tall_up > 0).then(|| rect_for(pad_x, -tall_up, tall_up * 2)),
    }
}

fn floor(length: i64, ratio: f32) -> i64 {
    (length as f32 * ratio).floor() as i64
}

/// Cells below the ink threshold are blank and never sent to recognition
pub fn is_empty(ink_ratio: f32, threshold: f32) -> bool {
    ink_ratio < threshold
}

/// Crop, upscale to the working width and flip to dark ink on light paper
pub fn render_variant(mask: &BinaryMask, rect: &CellRect, config: &ScanConfig) -> CellVariant {
    let crop = imageops::crop_imm(&mask.image, rect.x, rect.y, rect.width, rect.height).to_image();
    let (crop_w, crop_h) = crop.dimensions();

    let target_w = config.variant_width;
    let target_h = ((target_w as f32 * crop_h as f32) / crop_w.max(1) as f32)
        .round()
        .max(config.variant_min_height as f32) as u32;

    let mut scaled = imageops::resize(&crop, target_w, target_h, FilterType::CatmullRom);
    imageops::invert(&mut scaled);

    CellVariant {
        image: scaled,
        source: mask.kind,
        state: mask.state,
        rect: *rect,
    }
}

/// Split the masks into grid cells and classify each one
#[instrument(skip_all, fields(rows = grid.rows, cols = grid.cols))]
pub fn segment(masks: &MaskSet, grid: &GridSpec, config: &ScanConfig) -> Vec<Cell> {
    let (width, height) = (masks.width(), masks.height());
    let mut cells = Vec::with_capacity(grid.cell_count());

    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let geometry = cell_geometry(grid, row, col, width, height, config);
            let ink_ratio = masks.cleaned_global.ink_ratio(&geometry.base);
            let empty = is_empty(ink_ratio, config.empty_ink_ratio);
            cells.push(Cell {
                row,
                col,
                ink_ratio,
                empty,
                rects: geometry.candidates(),
            });
        }
    }

    debug!(
        cells = cells.len(),
        empty = cells.iter().filter(|c| c.empty).count(),
        "Cells classified"
    );
    cells
}
