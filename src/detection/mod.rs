pub mod preprocessing;
pub mod contours;
pub mod normalize;
pub mod binarize;
pub mod segment;
pub mod ocr;
pub mod reconcile;

use image::DynamicImage;

/// Tuning parameters for the ticket extraction pipeline
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Inputs narrower than this are upscaled before normalization
    pub working_width: u32,

    // Document normalization
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of the contour perimeter
    pub polygon_tolerance: f64,
    /// Fraction of the normalized height dropped from the bottom of 3x9 tickets
    pub footer_trim: f32,

    // Binarization
    pub median_radius: u32,
    pub adaptive_window: u32,
    pub adaptive_bias: i16,
    pub line_kernel_primary: f32,
    pub line_kernel_secondary: f32,

    // Segmentation
    pub pad_x: f32,
    pub pad_x_edge: f32,
    pub pad_x_wide: f32,
    pub pad_y_canonical: f32,
    pub pad_y: f32,
    pub empty_ink_ratio: f32,
    pub variant_width: u32,
    pub variant_min_height: u32,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self {
            working_width: 2200,
            blur_sigma: 1.1,
            canny_low: 50.0,
            canny_high: 150.0,
            polygon_tolerance: 0.02,
            footer_trim: 0.09,
            median_radius: 1,
            adaptive_window: 31,
            adaptive_bias: 5,
            line_kernel_primary: 0.90,
            line_kernel_secondary: 0.70,
            pad_x: 0.12,
            pad_x_edge: 0.08,
            pad_x_wide: 0.06,
            pad_y_canonical: 0.12,
            pad_y: 0.10,
            empty_ink_ratio: 0.012,
            variant_width: 160,
            variant_min_height: 40,
        }
    }

    pub fn with_working_width(mut self, width: u32) -> Self {
        self.working_width = width;
        self
    }

    pub fn with_footer_trim(mut self, fraction: f32) -> Self {
        self.footer_trim = fraction;
        self
    }

    pub fn with_empty_ink_ratio(mut self, ratio: f32) -> Self {
        self.empty_ink_ratio = ratio;
        self
    }

    /// Gaussian sigma matching an OpenCV Gaussian kernel of `adaptive_window` size
    pub fn adaptive_sigma(&self) -> f32 {
        let k = self.adaptive_window.max(3) as f32;
        0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Bring small inputs up to the working resolution
pub fn prepare_working_image(img: DynamicImage, config: &ScanConfig) -> DynamicImage {
    if config.working_width == 0 || img.width() == 0 || img.width() >= config.working_width {
        return img;
    }
    let scaled = preprocessing::upscale_to_width(&img, config.working_width);
    tracing::debug!(
        from_width = img.width(),
        to_width = scaled.width(),
        "Upscaled input to working resolution"
    );
    scaled
}
