use crate::models::{ReconciledValue, TicketNumber};

/// Index of the column that extends up to 90 on a 90-ball ticket
pub const LAST_COLUMN: u32 = 8;

/// Inclusive range of numbers a column may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRange {
    pub min: TicketNumber,
    pub max: TicketNumber,
}

impl ColumnRange {
    /// `None` when the column's numbers do not fit a [`TicketNumber`]
    pub fn for_column(col: u32) -> Option<Self> {
        let min = if col == 0 { 1 } else { col.checked_mul(10)? };
        let max = if col == LAST_COLUMN { 90 } else { min.checked_add(9)? };
        Some(Self {
            min: TicketNumber::try_from(min).ok()?,
            max: TicketNumber::try_from(max).ok()?,
        })
    }

    pub fn contains(&self, n: TicketNumber) -> bool {
        n >= self.min && n <= self.max
    }

    /// Midpoint, rounded half up
    pub fn center(&self) -> TicketNumber {
        (self.min + self.max + 1) / 2
    }
}

/// Every 1- and 2-digit window of `digits`, deduplicated in first-seen order
fn candidates(digits: &str) -> Vec<TicketNumber> {
    let mut found: Vec<TicketNumber> = Vec::new();
    let mut push = |window: &str| {
        if let Ok(n) = window.parse::<TicketNumber>() {
            if !found.contains(&n) {
                found.push(n);
            }
        }
    };
    for i in 0..digits.len() {
        push(&digits[i..i + 1]);
        if i + 2 <= digits.len() {
            push(&digits[i..i + 2]);
        }
    }
    found
}

/// Map noisy recognized text to a number valid for `col`, or `None`.
///
/// Among the in-range windows the one closest to the column's midpoint wins;
/// a reading like "951" in column 5 resolves to 51. Out-of-range numbers are
/// never returned.
pub fn reconcile(raw_text: &str, col: u32) -> ReconciledValue {
    let digits: String = raw_text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let range = ColumnRange::for_column(col)?;
    let center = range.center();

    let best = candidates(&digits)
        .into_iter()
        .filter(|n| range.contains(*n))
        .min_by_key(|n| n.abs_diff(center));
    if best.is_some() {
        return best;
    }

    if digits.len() >= 2 {
        let last_two = digits[digits.len() - 2..].parse::<TicketNumber>().ok()?;
        if range.contains(last_two) {
            return Some(last_two);
        }
    }
    None
}
