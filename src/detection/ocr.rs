use image::{GrayImage, Luma};
pub use ocrs::{ImageSource, OcrEngine}; // Re-export for use in other modules
use ocrs::OcrEngineParams;
use rten::Model;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::error::ScanError;

pub const DIGIT_WHITELIST: &str = "0123456789";

/// Layout hint for the next recognition calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationMode {
    /// One narrow glyph, taller than wide (first column)
    SingleChar,
    /// One horizontal line of text
    SingleLine,
}

impl SegmentationMode {
    pub fn for_column(col: u32) -> Self {
        if col == 0 { Self::SingleChar } else { Self::SingleLine }
    }
}

/// Engine options shared by all recognizers
#[derive(Debug, Clone)]
pub struct RecognizerOptions {
    pub char_whitelist: String,
    /// Informational. `ocrs` has no numeric recognition mode; restricting
    /// `char_whitelist` to digits is what makes recognition numeric.
    pub numeric_mode: bool,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            char_whitelist: DIGIT_WHITELIST.to_string(),
            numeric_mode: true,
        }
    }
}

impl RecognizerOptions {
    /// Drop every character outside the whitelist
    pub fn filter(&self, text: &str) -> String {
        text.chars()
            .filter(|c| self.char_whitelist.contains(*c))
            .collect()
    }
}

/// Adapter over an OCR engine.
///
/// One instance is initialized per session and reused for every cell; it is
/// not assumed safe for concurrent calls, hence `&mut self`.
pub trait DigitRecognizer {
    fn set_segmentation_mode(&mut self, mode: SegmentationMode);

    /// Recognize a dark-on-light crop. May return an empty string.
    fn recognize(&mut self, image: &GrayImage) -> Result<String, ScanError>;

    /// Release the engine. Further `recognize` calls fail.
    fn terminate(&mut self) -> Result<(), ScanError>;
}

/// Where to find the model files
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
    pub options: RecognizerOptions,
}

impl RecognizerConfig {
    /// Models from the standard ocrs cache location
    pub fn from_cache_dir() -> Result<Self, ScanError> {
        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ScanError::LibraryLoad {
                path: PathBuf::from("~/.cache/ocrs"),
                reason: "neither HOME nor USERPROFILE is set".to_string(),
            })?;
        Ok(Self::in_dir(Path::new(&home_dir).join(".cache/ocrs")))
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model: dir.join("text-detection.rten"),
            recognition_model: dir.join("text-recognition.rten"),
            options: RecognizerOptions::default(),
        }
    }
}

fn load_model(path: &Path) -> Result<Model, ScanError> {
    if !path.exists() {
        return Err(ScanError::LibraryLoad {
            path: path.to_path_buf(),
            reason: "file not found (run ocrs-cli once or download the models manually)".to_string(),
        });
    }
    Model::load_file(path).map_err(|e| ScanError::LibraryLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Recognizer backed by the `ocrs` engine
pub struct OcrsRecognizer {
    engine: Option<OcrEngine>,
    mode: SegmentationMode,
    options: RecognizerOptions,
}

impl OcrsRecognizer {
    /// Load both models and build the engine
    #[instrument(skip_all)]
    pub fn load(config: &RecognizerConfig) -> Result<Self, ScanError> {
        let detection_model = load_model(&config.detection_model)?;
        let recognition_model = load_model(&config.recognition_model)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            allowed_chars: Some(config.options.char_whitelist.clone()),
            ..Default::default()
        })
        .map_err(|e| ScanError::EngineInit(e.to_string()))?;

        info!(numeric_mode = config.options.numeric_mode, "OCR engine initialized");
        Ok(Self {
            engine: Some(engine),
            mode: SegmentationMode::SingleLine,
            options: config.options.clone(),
        })
    }
}

/// Centre a narrow glyph on a light canvas at least twice as wide as tall,
/// so the line detector sees it as a short text line.
pub fn widen_single_glyph(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let target_w = width.max(height * 2);
    if target_w == width {
        return image.clone();
    }
    let mut canvas = GrayImage::from_pixel(target_w, height, Luma([255u8]));
    let offset_x = (target_w - width) / 2;
    image::imageops::overlay(&mut canvas, image, offset_x.into(), 0);
    canvas
}

impl DigitRecognizer for OcrsRecognizer {
    fn set_segmentation_mode(&mut self, mode: SegmentationMode) {
        self.mode = mode;
    }

    fn recognize(&mut self, image: &GrayImage) -> Result<String, ScanError> {
        let engine = self.engine.as_ref().ok_or(ScanError::EngineTerminated)?;

        let prepared = match self.mode {
            SegmentationMode::SingleChar => widen_single_glyph(image),
            SegmentationMode::SingleLine => image.clone(),
        };
        // Convert to RGB8 format for OCR
        let rgb = image::DynamicImage::ImageLuma8(prepared).to_rgb8();

        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
            .map_err(|e| ScanError::Recognition(e.to_string()))?;
        let input = engine
            .prepare_input(source)
            .map_err(|e| ScanError::Recognition(e.to_string()))?;
        let text = engine
            .get_text(&input)
            .map_err(|e| ScanError::Recognition(e.to_string()))?;

        Ok(self.options.filter(&text))
    }

    fn terminate(&mut self) -> Result<(), ScanError> {
        match self.engine.take() {
            Some(engine) => {
                drop(engine);
                debug!("OCR engine released");
                Ok(())
            }
            None => Err(ScanError::EngineTermination("engine was already released".to_string())),
        }
    }
}

/// Returns pre-set texts in order, then a fallback.
///
/// Lets the scan pipeline run without model files (tests, dry runs). Every
/// call and the mode it was made in are recorded.
#[derive(Debug, Clone)]
pub struct ScriptedRecognizer {
    script: VecDeque<String>,
    fallback: String,
    mode: SegmentationMode,
    pub calls: Vec<SegmentationMode>,
    pub terminated: bool,
}

impl ScriptedRecognizer {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: fallback.into(),
            mode: SegmentationMode::SingleLine,
            calls: Vec::new(),
            terminated: false,
        }
    }

    pub fn with_script<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.extend(texts.into_iter().map(Into::into));
        self
    }
}

impl DigitRecognizer for ScriptedRecognizer {
    fn set_segmentation_mode(&mut self, mode: SegmentationMode) {
        self.mode = mode;
    }

    fn recognize(&mut self, _image: &GrayImage) -> Result<String, ScanError> {
        if self.terminated {
            return Err(ScanError::EngineTerminated);
        }
        self.calls.push(self.mode);
        Ok(self.script.pop_front().unwrap_or_else(|| self.fallback.clone()))
    }

    fn terminate(&mut self) -> Result<(), ScanError> {
        if self.terminated {
            return Err(ScanError::EngineTermination("already terminated".to_string()));
        }
        self.terminated = true;
        Ok(())
    }
}
