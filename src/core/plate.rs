use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{ScanGrid, TicketNumber};

pub const PLATE_ROWS: usize = 3;
pub const PLATE_COLS: usize = 9;
const NUMBERS_PER_COLUMN: usize = 3;
const BLANKS_PER_ROW: usize = 4;

/// A ticket kept for scoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plate {
    pub id: Uuid,
    pub cells: Vec<Vec<Option<TicketNumber>>>,
}

impl Plate {
    pub fn new(cells: Vec<Vec<Option<TicketNumber>>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cells,
        }
    }

    pub fn from_grid(grid: &ScanGrid) -> Self {
        Self::new(grid.cells.clone())
    }

    /// Number of present cells whose value has been called
    pub fn score_against(&self, called: &HashSet<TicketNumber>) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter_map(|v| *v)
            .filter(|n| called.contains(n))
            .count()
    }
}

/// Random 3x9 plates.
///
/// Each column first receives three sorted numbers from its decade, then
/// every row independently blanks four columns. Nothing forces each column to
/// keep at least one number; see DESIGN.md.
pub struct PlateGenerator {
    rng: StdRng,
}

impl PlateGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Numbers column `col` draws from: 1..=10, 11..=20, ..., 81..=90
    pub fn column_pool(col: usize) -> (TicketNumber, TicketNumber) {
        let start = col as TicketNumber * 10 + 1;
        let end = if col == PLATE_COLS - 1 { 90 } else { col as TicketNumber * 10 + 10 };
        (start, end)
    }

    pub fn generate_plate(&mut self) -> Plate {
        let mut cells = vec![vec![None; PLATE_COLS]; PLATE_ROWS];

        for col in 0..PLATE_COLS {
            let (start, end) = Self::column_pool(col);
            let pool = (end - start + 1) as usize;
            let mut numbers: Vec<TicketNumber> = index::sample(&mut self.rng, pool, NUMBERS_PER_COLUMN)
                .into_iter()
                .map(|i| start + i as TicketNumber)
                .collect();
            numbers.sort_unstable();
            for (row, n) in numbers.into_iter().enumerate() {
                cells[row][col] = Some(n);
            }
        }

        for row in cells.iter_mut() {
            for col in index::sample(&mut self.rng, PLATE_COLS, BLANKS_PER_ROW) {
                row[col] = None;
            }
        }

        Plate::new(cells)
    }

    pub fn generate(&mut self, count: usize) -> Vec<Plate> {
        (0..count).map(|_| self.generate_plate()).collect()
    }
}

impl Default for PlateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_counts_called_present_cells() {
        let plate = Plate::new(vec![
            vec![Some(1), None, Some(23)],
            vec![None, Some(15), Some(27)],
        ]);
        let called: HashSet<TicketNumber> = [1, 27, 15, 99].into_iter().collect();
        assert_eq!(plate.score_against(&called), 3);
        assert_eq!(plate.score_against(&HashSet::new()), 0);
    }

    #[test]
    fn plate_from_grid_copies_cells() {
        let mut grid = ScanGrid::new(3, 9);
        grid.set(0, 0, Some(4));
        grid.set(2, 8, Some(88));
        let plate = Plate::from_grid(&grid);
        assert_eq!(plate.cells, grid.cells);
    }

    #[test]
    fn generated_rows_keep_five_numbers_in_column_pools() {
        let mut generator = PlateGenerator::seeded(7);
        for plate in generator.generate(50) {
            assert_eq!(plate.cells.len(), PLATE_ROWS);
            for row in &plate.cells {
                assert_eq!(row.len(), PLATE_COLS);
                assert_eq!(row.iter().filter(|v| v.is_some()).count(), PLATE_COLS - BLANKS_PER_ROW);
                for (col, value) in row.iter().enumerate() {
                    if let Some(n) = value {
                        let (start, end) = PlateGenerator::column_pool(col);
                        assert!((start..=end).contains(n));
                    }
                }
            }
            for col in 0..PLATE_COLS {
                let column: Vec<TicketNumber> = plate.cells.iter().filter_map(|r| r[col]).collect();
                assert!(column.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let a: Vec<_> = PlateGenerator::seeded(42).generate(3).into_iter().map(|p| p.cells).collect();
        let b: Vec<_> = PlateGenerator::seeded(42).generate(3).into_iter().map(|p| p.cells).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn last_column_pool_ends_at_ninety() {
        assert_eq!(PlateGenerator::column_pool(0), (1, 10));
        assert_eq!(PlateGenerator::column_pool(8), (81, 90));
    }

    #[test]
    fn plates_serialize_as_id_and_cells() {
        let plate = Plate::new(vec![vec![Some(5), None]]);
        let json = serde_json::to_value(&plate).unwrap();
        assert_eq!(json["cells"], serde_json::json!([[5, null]]));
        assert_eq!(json["id"], serde_json::json!(plate.id.to_string()));
    }
}
