//! Rules engine for a grid-based single-player mine-clearing round: the
//! grid data model, randomized mine placement with a first-click safety
//! guarantee, adjacency counts, the flood-fill cascade, flag bookkeeping,
//! and win/loss detection as a small state machine.
//!
//! Rendering, input binding, and timer display live outside this crate;
//! they feed row/column coordinates in and consume the structured reports
//! coming back from [`RulesEngine::reveal`] and [`RulesEngine::toggle_flag`].

use serde::{Deserialize, Serialize};

pub use board::*;
pub use cell::*;
pub use engine::*;
pub use error::*;
pub use session::*;
pub use types::*;

mod board;
mod cell;
mod engine;
mod error;
mod session;
mod types;

/// Difficulty parameters for a round, supplied by the (external) preset
/// layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub rows: Coord,
    pub cols: Coord,
    pub mines: CellCount,
}

impl GameConfig {
    pub const fn new_unchecked(rows: Coord, cols: Coord, mines: CellCount) -> Self {
        Self { rows, cols, mines }
    }

    /// Clamps dimensions to at least 1x1 and the mine count to below the
    /// cell total; a zero-mine round is valid.
    pub fn new((rows, cols): Coord2, mines: CellCount) -> Self {
        let rows = rows.clamp(1, Coord::MAX);
        let cols = cols.clamp(1, Coord::MAX);
        let mines = mines.min(mult(rows, cols) - 1);
        Self::new_unchecked(rows, cols, mines)
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_clamps_dimensions_and_mine_count() {
        let config = GameConfig::new((0, 3), 5);
        assert_eq!((config.rows, config.cols), (1, 3));
        assert_eq!(config.mines, 2);
    }

    #[test]
    fn config_allows_zero_mines() {
        assert_eq!(GameConfig::new((4, 4), 0).mines, 0);
    }
}
