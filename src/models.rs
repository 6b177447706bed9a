use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// A ticket number. Columns of a 90-ball ticket never exceed 90, wider
/// layouts still fit comfortably.
pub type TicketNumber = u16;

/// Value of one cell after reconciliation. `None` means unresolved or empty.
pub type ReconciledValue = Option<TicketNumber>;

/// Axis-aligned rectangle in mask coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Thresholding strategy that produced a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskKind {
    /// Otsu global threshold
    Global,
    /// Gaussian-weighted local mean threshold
    Adaptive,
}

/// Whether printed grid lines have been removed from a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskState {
    Cleaned,
    Raw,
}

/// Single-channel ink mask: 255 is ink, 0 is background.
#[derive(Debug, Clone)]
pub struct BinaryMask {
    pub kind: MaskKind,
    pub state: MaskState,
    pub image: GrayImage,
}

impl BinaryMask {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of ink pixels inside `rect`
    pub fn count_ink(&self, rect: &CellRect) -> u64 {
        let x_end = (rect.x + rect.width).min(self.width());
        let y_end = (rect.y + rect.height).min(self.height());
        let mut count = 0u64;
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                if self.image.get_pixel(x, y)[0] > 0 {
                    count += 1;
                }
            }
        }
        count
    }

    /// Fraction of ink pixels inside `rect`
    pub fn ink_ratio(&self, rect: &CellRect) -> f32 {
        let area = rect.area();
        if area == 0 {
            return 0.0;
        }
        self.count_ink(rect) as f32 / area as f32
    }
}

/// Deskewed, top-down view of the ticket
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub image: DynamicImage,
    /// False when no quadrilateral was found and `image` is the input as-is
    pub deskewed: bool,
}

impl NormalizedDocument {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Grid geometry for one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub rows: u32,
    pub cols: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl GridSpec {
    pub fn new(rows: u32, cols: u32, mask_width: u32, mask_height: u32) -> Self {
        Self {
            rows,
            cols,
            cell_width: mask_width / cols.max(1),
            cell_height: mask_height / rows.max(1),
        }
    }

    /// The classic 3x9 ticket, which gets footer and bottom-row tuning
    pub fn is_canonical(&self) -> bool {
        is_canonical_layout(self.rows, self.cols)
    }

    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

pub fn is_canonical_layout(rows: u32, cols: u32) -> bool {
    rows == 3 && cols == 9
}

/// One upscaled, dark-on-light crop handed to the recognizer
#[derive(Debug, Clone)]
pub struct CellVariant {
    pub image: GrayImage,
    pub source: MaskKind,
    pub state: MaskState,
    pub rect: CellRect,
}

/// Result of scanning one ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanGrid {
    pub rows: u32,
    pub cols: u32,
    pub cells: Vec<Vec<ReconciledValue>>,
}

impl ScanGrid {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![None; cols as usize]; rows as usize],
        }
    }

    pub fn get(&self, row: u32, col: u32) -> ReconciledValue {
        self.cells
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .copied()
            .flatten()
    }

    pub fn set(&mut self, row: u32, col: u32, value: ReconciledValue) {
        if let Some(cell) = self
            .cells
            .get_mut(row as usize)
            .and_then(|r| r.get_mut(col as usize))
        {
            *cell = value;
        }
    }

    /// Number of cells holding a value
    pub fn filled(&self) -> usize {
        self.cells.iter().flatten().filter(|v| v.is_some()).count()
    }
}

impl std::fmt::Display for ScanGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.cells {
            let line: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Some(n) => format!("{:>3}", n),
                    None => "  .".to_string(),
                })
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
