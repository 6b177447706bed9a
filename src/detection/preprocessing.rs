use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Median filter; keeps stroke edges sharper than a Gaussian of similar size
pub fn apply_median(img: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return img.clone();
    }
    median_filter(img, radius, radius)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Resize to `target_width`, preserving aspect ratio
pub fn upscale_to_width(img: &DynamicImage, target_width: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let scale = target_width as f32 / width as f32;
    let target_height = ((height as f32 * scale).round() as u32).max(1);
    img.resize_exact(target_width, target_height, FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn median_removes_salt_noise() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([200]));
        img.put_pixel(4, 4, Luma([0]));
        let filtered = apply_median(&img, 1);
        assert_eq!(filtered.get_pixel(4, 4)[0], 200);
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = GrayImage::from_pixel(32, 32, Luma([128]));
        let edges = detect_edges(&apply_blur(&img, 1.1), 50.0, 150.0);
        assert!(edges.pixels().all(|p| p[0] == 0));
    }
}
