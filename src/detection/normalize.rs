use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::point::Point;
use tracing::{debug, info, instrument, warn};

use crate::detection::{ScanConfig, contours, preprocessing};
use crate::models::{NormalizedDocument, is_canonical_layout};

/// Ticket corners in output order.
///
/// Ordering by x+y assumes the photo is rotated less than 45 degrees; beyond
/// that the corners are assigned to the wrong sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedQuad {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_right: (f32, f32),
    pub bottom_left: (f32, f32),
}

impl OrderedQuad {
    pub fn from_points(points: [Point<i32>; 4]) -> Self {
        let mut pts: Vec<(f32, f32)> = points.iter().map(|p| (p.x as f32, p.y as f32)).collect();
        pts.sort_by(|a, b| (a.0 + a.1).total_cmp(&(b.0 + b.1)));

        let (top_right, bottom_left) = if pts[1].0 > pts[2].0 {
            (pts[1], pts[2])
        } else {
            (pts[2], pts[1])
        };

        Self {
            top_left: pts[0],
            top_right,
            bottom_right: pts[3],
            bottom_left,
        }
    }

    /// Width and height of the rectangle the quad is mapped onto
    pub fn target_size(&self) -> (u32, u32) {
        let width = distance(self.bottom_left, self.bottom_right)
            .max(distance(self.top_left, self.top_right));
        let height = distance(self.top_left, self.bottom_left)
            .max(distance(self.top_right, self.bottom_right));
        (width as u32, height as u32)
    }

    pub fn as_array(&self) -> [(f32, f32); 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Locate the ticket border and warp it to a top-down view.
///
/// Falls back to a clone of the input when no quadrilateral is found or the
/// transform is degenerate.
#[instrument(skip_all, fields(width = img.width(), height = img.height()))]
pub fn normalize_document(img: &DynamicImage, config: &ScanConfig) -> NormalizedDocument {
    let gray = preprocessing::to_grayscale(img);
    let blurred = preprocessing::apply_blur(&gray, config.blur_sigma);
    let edges = preprocessing::detect_edges(&blurred, config.canny_low, config.canny_high);

    let Some(points) = contours::find_largest_quadrilateral(&edges, config.polygon_tolerance) else {
        info!("No quadrilateral found; using the image as-is");
        return fallback(img);
    };

    let quad = OrderedQuad::from_points(points);
    let (out_w, out_h) = quad.target_size();
    debug!(?quad, out_w, out_h, "Ticket corners ordered");

    if out_w == 0 || out_h == 0 {
        warn!(out_w, out_h, "Degenerate quadrilateral; using the image as-is");
        return fallback(img);
    }

    let dest = [
        (0.0, 0.0),
        (out_w as f32, 0.0),
        (out_w as f32, out_h as f32),
        (0.0, out_h as f32),
    ];
    let Some(projection) = Projection::from_control_points(quad.as_array(), dest) else {
        warn!("Failed to compute projective transform; using the image as-is");
        return fallback(img);
    };

    let rgb = img.to_rgb8();
    let mut output = RgbImage::new(out_w, out_h);
    warp_into(&rgb, &projection, Interpolation::Bilinear, Rgb([0u8, 0, 0]), &mut output);

    info!(out_w, out_h, "Perspective correction applied");
    NormalizedDocument {
        image: DynamicImage::ImageRgb8(output),
        deskewed: true,
    }
}

fn fallback(img: &DynamicImage) -> NormalizedDocument {
    NormalizedDocument {
        image: img.clone(),
        deskewed: false,
    }
}

/// Drop the serial-number footer printed inside the border of 3x9 tickets
pub fn trim_footer(doc: NormalizedDocument, rows: u32, cols: u32, fraction: f32) -> NormalizedDocument {
    if !is_canonical_layout(rows, cols) || fraction <= 0.0 {
        return doc;
    }
    let (width, height) = (doc.width(), doc.height());
    let trim = (height as f32 * fraction).round() as u32;
    let kept = height.saturating_sub(trim).max(1);
    debug!(height, kept, "Trimmed ticket footer");
    NormalizedDocument {
        image: doc.image.crop_imm(0, 0, width, kept),
        deskewed: doc.deskewed,
    }
}
