use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::detection::binarize::{self, MaskSet};
use crate::detection::ocr::{DigitRecognizer, OcrsRecognizer, RecognizerConfig, SegmentationMode};
use crate::detection::segment::{self, Cell};
use crate::detection::reconcile::{self, ColumnRange};
use crate::detection::{ScanConfig, normalize, prepare_working_image};
use crate::error::ScanError;
use crate::models::{GridSpec, ReconciledValue, ScanGrid};

/// Stages of one ticket scan, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Capturing,
    Normalizing,
    Binarizing,
    Segmenting,
    Recognizing { cell: usize },
    Done,
}

impl ScanStage {
    fn ordinal(&self) -> (u8, usize) {
        match self {
            Self::Capturing => (0, 0),
            Self::Normalizing => (1, 0),
            Self::Binarizing => (2, 0),
            Self::Segmenting => (3, 0),
            Self::Recognizing { cell } => (4, *cell),
            Self::Done => (5, 0),
        }
    }
}

/// Forward-only record of the stages a scan went through
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: ScanStage,
    history: Vec<ScanStage>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: ScanStage::Capturing,
            history: vec![ScanStage::Capturing],
        }
    }

    pub fn current(&self) -> ScanStage {
        self.current
    }

    pub fn history(&self) -> &[ScanStage] {
        &self.history
    }

    /// Move to `next`. Returns false, leaving the state unchanged, when
    /// `next` is not strictly after the current stage.
    #[must_use]
    pub fn advance(&mut self, next: ScanStage) -> bool {
        if next.ordinal() <= self.current.ordinal() {
            warn!(current = ?self.current, ?next, "Refusing backward stage transition");
            return false;
        }
        debug!(stage = ?next, "Scan stage");
        self.current = next;
        self.history.push(next);
        true
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives batch progress before each item is processed.
///
/// Errors are logged and never abort the batch.
pub trait ProgressListener {
    fn on_progress(&mut self, index: usize, total: usize, label: &str) -> anyhow::Result<()>;
}

impl<F> ProgressListener for F
where
    F: FnMut(usize, usize, &str) -> anyhow::Result<()>,
{
    fn on_progress(&mut self, index: usize, total: usize, label: &str) -> anyhow::Result<()> {
        self(index, total, label)
    }
}

/// Something that can produce a ticket image for a batch
pub trait TicketSource {
    fn label(&self) -> String;
    fn load(&self) -> Result<DynamicImage, ScanError>;
}

impl TicketSource for PathBuf {
    fn label(&self) -> String {
        self.as_path().label()
    }

    fn load(&self) -> Result<DynamicImage, ScanError> {
        self.as_path().load()
    }
}

impl TicketSource for &Path {
    fn label(&self) -> String {
        self.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }

    fn load(&self) -> Result<DynamicImage, ScanError> {
        image::open(self).map_err(|e| ScanError::ImageLoad {
            label: self.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// An already decoded image with a display label
#[derive(Debug, Clone)]
pub struct InMemoryTicket {
    pub label: String,
    pub image: DynamicImage,
}

impl TicketSource for InMemoryTicket {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn load(&self) -> Result<DynamicImage, ScanError> {
        Ok(self.image.clone())
    }
}

/// Explicit scanning context: configuration plus the one recognizer shared
/// by every cell of every scan. Close it with [`ScanSession::close`].
pub struct ScanSession {
    config: ScanConfig,
    recognizer: Box<dyn DigitRecognizer>,
    last_stages: Option<StageTracker>,
    closed: bool,
}

impl ScanSession {
    /// Load the OCR models. Failure here is fatal for any scan.
    pub fn load(config: ScanConfig, recognizer: &RecognizerConfig) -> Result<Self, ScanError> {
        let recognizer = OcrsRecognizer::load(recognizer)?;
        Ok(Self::with_recognizer(config, Box::new(recognizer)))
    }

    pub fn with_recognizer(config: ScanConfig, recognizer: Box<dyn DigitRecognizer>) -> Self {
        Self {
            config,
            recognizer,
            last_stages: None,
            closed: false,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Stages the most recent successful scan went through
    pub fn last_stages(&self) -> Option<&StageTracker> {
        self.last_stages.as_ref()
    }

    /// Scan one ticket photo into a rows x cols grid
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn scan(&mut self, image: DynamicImage, rows: u32, cols: u32) -> Result<ScanGrid, ScanError> {
        // Columns past the last representable number range cannot be reconciled
        if rows == 0 || cols == 0 || ColumnRange::for_column(cols - 1).is_none() {
            return Err(ScanError::InvalidGrid { rows, cols });
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(ScanError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }
        if self.closed {
            return Err(ScanError::EngineTerminated);
        }

        let mut stages = StageTracker::new();
        let enter = |stages: &mut StageTracker, next: ScanStage| {
            if !stages.advance(next) {
                warn!(?next, "Stage out of order");
            }
        };

        enter(&mut stages, ScanStage::Normalizing);
        let working = prepare_working_image(image, &self.config);
        let doc = normalize::normalize_document(&working, &self.config);
        drop(working);
        let doc = normalize::trim_footer(doc, rows, cols, self.config.footer_trim);

        enter(&mut stages, ScanStage::Binarizing);
        let grid = GridSpec::new(rows, cols, doc.width(), doc.height());
        let masks = binarize::binarize(&doc, &grid, &self.config);
        drop(doc);

        enter(&mut stages, ScanStage::Segmenting);
        let cells = segment::segment(&masks, &grid, &self.config);

        let mut result = ScanGrid::new(rows, cols);
        for (index, cell) in cells.iter().enumerate() {
            enter(&mut stages, ScanStage::Recognizing { cell: index });
            let value = self.recognize_cell(cell, &masks);
            result.set(cell.row, cell.col, value);
        }
        enter(&mut stages, ScanStage::Done);

        info!(
            filled = result.filled(),
            cells = grid.cell_count(),
            stage = ?stages.current(),
            transitions = stages.history().len(),
            "Scan complete"
        );
        self.last_stages = Some(stages);
        Ok(result)
    }

    /// Try each variant of a cell until one reconciles to an in-range value
    fn recognize_cell(&mut self, cell: &Cell, masks: &MaskSet) -> ReconciledValue {
        if cell.empty {
            return None;
        }

        for (attempt, variant) in cell.variants(masks, &self.config).enumerate() {
            self.recognizer
                .set_segmentation_mode(SegmentationMode::for_column(cell.col));
            let raw = match self.recognizer.recognize(&variant.image) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(row = cell.row, col = cell.col, attempt, error = %e, "Recognition failed");
                    continue;
                }
            };
            if let Some(value) = reconcile::reconcile(&raw, cell.col) {
                debug!(
                    row = cell.row,
                    col = cell.col,
                    attempt,
                    raw = %raw,
                    value,
                    source = ?variant.source,
                    state = ?variant.state,
                    "Cell resolved"
                );
                return Some(value);
            }
        }

        debug!(row = cell.row, col = cell.col, "Cell unresolved");
        None
    }

    /// Scan several tickets one after another.
    ///
    /// Items that fail to load or scan are logged and left out of the
    /// result; the batch always runs to the end.
    pub fn scan_batch<S: TicketSource>(
        &mut self,
        sources: &[S],
        rows: u32,
        cols: u32,
        mut listener: Option<&mut dyn ProgressListener>,
    ) -> Vec<ScanGrid> {
        let total = sources.len();
        let mut grids = Vec::with_capacity(total);

        for (i, source) in sources.iter().enumerate() {
            let label = source.label();
            if let Some(listener) = listener.as_deref_mut() {
                if let Err(e) = listener.on_progress(i + 1, total, &label) {
                    warn!(label = %label, error = %e, "Progress listener failed");
                }
            }

            let outcome = source.load().and_then(|image| self.scan(image, rows, cols));
            match outcome {
                Ok(grid) => grids.push(grid),
                Err(e) => warn!(label = %label, error = %e, "Skipping ticket"),
            }
        }

        info!(scanned = grids.len(), total, "Batch complete");
        grids
    }

    /// Shut down the recognition engine. Failures are logged only.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.recognizer.terminate() {
            warn!(error = %e, "Recognition engine did not shut down cleanly");
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
