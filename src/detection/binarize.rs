use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument};

use crate::detection::{ScanConfig, preprocessing};
use crate::models::{BinaryMask, GridSpec, MaskKind, MaskState, NormalizedDocument};

const INK: Luma<u8> = Luma([255]);
const PAPER: Luma<u8> = Luma([0]);

/// The four masks segmentation draws variants from, in recognition order
#[derive(Debug, Clone)]
pub struct MaskSet {
    pub cleaned_global: BinaryMask,
    pub cleaned_adaptive: BinaryMask,
    pub raw_global: BinaryMask,
    pub raw_adaptive: BinaryMask,
}

impl MaskSet {
    /// Cleaned masks first, global before adaptive
    pub fn in_order(&self) -> [&BinaryMask; 4] {
        [
            &self.cleaned_global,
            &self.cleaned_adaptive,
            &self.raw_global,
            &self.raw_adaptive,
        ]
    }

    pub fn width(&self) -> u32 {
        self.raw_global.width()
    }

    pub fn height(&self) -> u32 {
        self.raw_global.height()
    }
}

/// Denoised grayscale of the normalized ticket
pub fn denoise(doc: &NormalizedDocument, config: &ScanConfig) -> GrayImage {
    let gray = preprocessing::to_grayscale(&doc.image);
    preprocessing::apply_median(&gray, config.median_radius)
}

/// Inverted Otsu threshold: pixels at or below the level become ink
pub fn global_threshold(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    debug!(level, "Otsu level");
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level { PAPER } else { INK }
    })
}

/// Inverted Gaussian-weighted local threshold.
///
/// A pixel is ink when it is no brighter than its neighbourhood mean minus
/// `bias`, which tolerates shadows and uneven lighting across the ticket.
pub fn adaptive_threshold(gray: &GrayImage, sigma: f32, bias: i16) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, sigma);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as i16;
        let threshold = local_mean.get_pixel(x, y)[0] as i16 - bias;
        if value > threshold { PAPER } else { INK }
    })
}

/// Pixels belonging to horizontal ink runs of at least `length`.
///
/// Equivalent to a morphological opening with a `length`x1 line kernel.
pub fn horizontal_runs(mask: &GrayImage, length: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let mut start = 0;
        while start < width {
            if mask.get_pixel(start, y)[0] == 0 {
                start += 1;
                continue;
            }
            let mut end = start;
            while end < width && mask.get_pixel(end, y)[0] > 0 {
                end += 1;
            }
            if end - start >= length {
                for x in start..end {
                    out.put_pixel(x, y, INK);
                }
            }
            start = end;
        }
    }
    out
}

/// Pixels belonging to vertical ink runs of at least `length`.
pub fn vertical_runs(mask: &GrayImage, length: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    for x in 0..width {
        let mut start = 0;
        while start < height {
            if mask.get_pixel(x, start)[0] == 0 {
                start += 1;
                continue;
            }
            let mut end = start;
            while end < height && mask.get_pixel(x, end)[0] > 0 {
                end += 1;
            }
            if end - start >= length {
                for y in start..end {
                    out.put_pixel(x, y, INK);
                }
            }
            start = end;
        }
    }
    out
}

/// Remove horizontal and vertical lines at least `h_len`/`v_len` long
fn subtract_lines(mask: &GrayImage, h_len: u32, v_len: u32) -> GrayImage {
    let horizontal = horizontal_runs(mask, h_len);
    let vertical = vertical_runs(mask, v_len);
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let on_line = horizontal.get_pixel(x, y)[0] > 0 || vertical.get_pixel(x, y)[0] > 0;
        if on_line { PAPER } else { *mask.get_pixel(x, y) }
    })
}

/// Strip printed grid lines.
///
/// The first pass only takes runs close to a full cell edge, so the stem of a
/// thin "1" survives; the second, shorter pass catches broken line fragments.
pub fn remove_grid_lines(mask: &GrayImage, grid: &GridSpec, config: &ScanConfig) -> GrayImage {
    let kernel = |pitch: u32, ratio: f32| ((pitch as f32 * ratio).floor() as u32).max(3);

    let first = subtract_lines(
        mask,
        kernel(grid.cell_width, config.line_kernel_primary),
        kernel(grid.cell_height, config.line_kernel_primary),
    );
    subtract_lines(
        &first,
        kernel(grid.cell_width, config.line_kernel_secondary),
        kernel(grid.cell_height, config.line_kernel_secondary),
    )
}

/// Produce the global and adaptive masks, raw and with grid lines removed
#[instrument(skip_all, fields(width = doc.width(), height = doc.height()))]
pub fn binarize(doc: &NormalizedDocument, grid: &GridSpec, config: &ScanConfig) -> MaskSet {
    let denoised = denoise(doc, config);
    let global = global_threshold(&denoised);
    let adaptive = adaptive_threshold(&denoised, config.adaptive_sigma(), config.adaptive_bias);

    let cleaned_global = remove_grid_lines(&global, grid, config);
    let cleaned_adaptive = remove_grid_lines(&adaptive, grid, config);
    debug!(
        cell_width = grid.cell_width,
        cell_height = grid.cell_height,
        "Grid lines removed"
    );

    MaskSet {
        cleaned_global: BinaryMask {
            kind: MaskKind::Global,
            state: MaskState::Cleaned,
            image: cleaned_global,
        },
        cleaned_adaptive: BinaryMask {
            kind: MaskKind::Adaptive,
            state: MaskState::Cleaned,
            image: cleaned_adaptive,
        },
        raw_global: BinaryMask {
            kind: MaskKind::Global,
            state: MaskState::Raw,
            image: global,
        },
        raw_adaptive: BinaryMask {
            kind: MaskKind::Adaptive,
            state: MaskState::Raw,
            image: adaptive,
        },
    }
}
