use serde::{Deserialize, Serialize};

use crate::types::{Coord, Coord2};

/// A single grid square. Owned exclusively by the [`Board`](crate::Board);
/// the coordinate is baked in at construction and never changes so the
/// cascade can re-derive neighbor positions without scanning the grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    row: Coord,
    col: Coord,
    is_mine: bool,
    is_revealed: bool,
    is_flagged: bool,
    adjacent_mines: u8,
}

impl Cell {
    pub(crate) const fn blank(row: Coord, col: Coord) -> Self {
        Self {
            row,
            col,
            is_mine: false,
            is_revealed: false,
            is_flagged: false,
            adjacent_mines: 0,
        }
    }

    pub const fn row(&self) -> Coord {
        self.row
    }

    pub const fn col(&self) -> Coord {
        self.col
    }

    pub const fn coords(&self) -> Coord2 {
        (self.row, self.col)
    }

    pub const fn is_mine(&self) -> bool {
        self.is_mine
    }

    pub const fn is_revealed(&self) -> bool {
        self.is_revealed
    }

    pub const fn is_flagged(&self) -> bool {
        self.is_flagged
    }

    /// Valid only after adjacency computation has run.
    pub const fn adjacent_mines(&self) -> u8 {
        self.adjacent_mines
    }

    pub(crate) fn set_mine(&mut self, is_mine: bool) {
        self.is_mine = is_mine;
    }

    /// A count outside `0..=8` indicates a consistency bug upstream and
    /// aborts rather than clamping.
    pub(crate) fn set_adjacent_mines(&mut self, count: u8) {
        assert!(count <= 8, "adjacency count {count} out of range");
        self.adjacent_mines = count;
    }

    /// Revealing is monotonic within a round; only a full reset blanks it.
    pub(crate) fn mark_revealed(&mut self) {
        self.is_revealed = true;
    }

    pub(crate) fn set_flagged(&mut self, is_flagged: bool) {
        self.is_flagged = is_flagged;
    }

    /// Returns the cell to the blank state, keeping its coordinate.
    pub(crate) fn reset(&mut self) {
        *self = Self::blank(self.row, self.col);
    }
}
