use bingoscan::{DigitRecognizer, ScanConfig, ScanError, ScanSession, ScriptedRecognizer, SegmentationMode};
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const TICKET_WIDTH: u32 = 940;
pub const TICKET_HEIGHT: u32 = 360;
const FRAME_INSET: i32 = 10;
const FRAME_THICKNESS: u32 = 6;
/// Approximate cell pitch of the normalized 3x9 ticket
const PITCH: i32 = 102;

/// White ticket with a dark rectangular border and nothing inside
pub fn blank_ticket() -> GrayImage {
    let mut img = GrayImage::from_pixel(TICKET_WIDTH, TICKET_HEIGHT, Luma([255u8]));
    let outer_w = TICKET_WIDTH - 2 * FRAME_INSET as u32;
    let outer_h = TICKET_HEIGHT - 2 * FRAME_INSET as u32;
    let t = FRAME_THICKNESS;
    let black = Luma([0u8]);

    draw_filled_rect_mut(&mut img, Rect::at(FRAME_INSET, FRAME_INSET).of_size(outer_w, t), black);
    draw_filled_rect_mut(
        &mut img,
        Rect::at(FRAME_INSET, FRAME_INSET + (outer_h - t) as i32).of_size(outer_w, t),
        black,
    );
    draw_filled_rect_mut(&mut img, Rect::at(FRAME_INSET, FRAME_INSET).of_size(t, outer_h), black);
    draw_filled_rect_mut(
        &mut img,
        Rect::at(FRAME_INSET + (outer_w - t) as i32, FRAME_INSET).of_size(t, outer_h),
        black,
    );
    img
}

/// Bordered ticket with a glyph-sized ink block centred in each listed (row, col)
pub fn ticket_with_marks(marks: &[(u32, u32)]) -> DynamicImage {
    let mut img = blank_ticket();
    for &(row, col) in marks {
        let cx = FRAME_INSET + col as i32 * PITCH + PITCH / 2;
        let cy = FRAME_INSET + row as i32 * PITCH + PITCH / 2;
        draw_filled_rect_mut(&mut img, Rect::at(cx - 14, cy - 22).of_size(28, 44), Luma([0u8]));
    }
    DynamicImage::ImageLuma8(img)
}

/// Marks in columns 0 and 5 of every row of a 3x9 ticket
pub fn two_column_ticket() -> DynamicImage {
    ticket_with_marks(&[(0, 0), (0, 5), (1, 0), (1, 5), (2, 0), (2, 5)])
}

/// Config for synthetic tickets, which are already at their working size
pub fn test_config() -> ScanConfig {
    ScanConfig::new().with_working_width(0)
}

/// Saves an image as PNG inside `dir` and returns its path
pub fn save_ticket(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    image
        .to_rgb8()
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test ticket");
    path
}

/// Image with zero area
pub fn empty_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(0, 0))
}

/// What the recognizer saw, readable after the session took ownership
#[derive(Debug, Default)]
pub struct RecognizerLog {
    pub calls: Vec<SegmentationMode>,
    pub terminations: usize,
}

/// Scripted recognizer that mirrors its calls into a shared log
pub struct LoggingRecognizer {
    inner: ScriptedRecognizer,
    log: Rc<RefCell<RecognizerLog>>,
}

impl DigitRecognizer for LoggingRecognizer {
    fn set_segmentation_mode(&mut self, mode: SegmentationMode) {
        self.inner.set_segmentation_mode(mode);
    }

    fn recognize(&mut self, image: &GrayImage) -> Result<String, ScanError> {
        let text = self.inner.recognize(image)?;
        if let Some(mode) = self.inner.calls.last() {
            self.log.borrow_mut().calls.push(*mode);
        }
        Ok(text)
    }

    fn terminate(&mut self) -> Result<(), ScanError> {
        self.log.borrow_mut().terminations += 1;
        self.inner.terminate()
    }
}

/// Session whose recognizer answers `fallback` to every crop
pub fn scripted_session(fallback: &str) -> (ScanSession, Rc<RefCell<RecognizerLog>>) {
    let log = Rc::new(RefCell::new(RecognizerLog::default()));
    let recognizer = LoggingRecognizer {
        inner: ScriptedRecognizer::new(fallback),
        log: log.clone(),
    };
    (ScanSession::with_recognizer(test_config(), Box::new(recognizer)), log)
}
