use std::collections::HashSet;

use ndarray::Array2;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::error::{GameError, Result};
use crate::types::{mult, CellCount, Coord, Coord2, Neighbors, ToNdIndex};

/// The minefield grid. Exclusive owner of every [`Cell`]; provides
/// bounds-checked access, 8-neighbor enumeration, randomized mine placement
/// with a first-click safety zone, and adjacency derivation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: Coord,
    cols: Coord,
    mine_count: CellCount,
    cells: Array2<Cell>,
}

impl Board {
    /// Builds a blank board. Mines are not placed here; placement happens
    /// lazily on the first reveal so it can honor first-click safety.
    pub fn new(rows: Coord, cols: Coord, mine_count: CellCount) -> Self {
        let cells = Array2::from_shape_fn((rows as usize, cols as usize), |(row, col)| {
            Cell::blank(row as Coord, col as Coord)
        });
        Self {
            rows,
            cols,
            mine_count,
            cells,
        }
    }

    /// Builds a board with a fixed mine layout, adjacency already computed.
    /// Mainly for deterministic setups; random rounds go through
    /// [`Board::place_mines`].
    pub fn with_mines(rows: Coord, cols: Coord, mine_coords: &[Coord2]) -> Result<Self> {
        let mut board = Self::new(rows, cols, 0);

        for &coords in mine_coords {
            let coords = board.validate_coords(coords)?;
            board.cells[coords.to_nd_index()].set_mine(true);
        }

        board.mine_count = board.placed_mine_count();
        board.compute_adjacency();
        Ok(board)
    }

    pub fn rows(&self) -> Coord {
        self.rows
    }

    pub fn cols(&self) -> Coord {
        self.cols
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn total_cells(&self) -> CellCount {
        mult(self.rows, self.cols)
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn is_valid_position(&self, row: Coord, col: Coord) -> bool {
        row < self.rows && col < self.cols
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        if self.is_valid_position(coords.0, coords.1) {
            Ok(coords)
        } else {
            Err(GameError::InvalidPosition)
        }
    }

    /// Panics on out-of-bounds coordinates; use [`Board::get`] or
    /// [`Board::validate_coords`] for untrusted input.
    pub fn cell(&self, coords: Coord2) -> &Cell {
        &self.cells[coords.to_nd_index()]
    }

    pub fn get(&self, coords: Coord2) -> Option<&Cell> {
        self.cells.get(coords.to_nd_index())
    }

    pub(crate) fn cell_mut(&mut self, coords: Coord2) -> &mut Cell {
        &mut self.cells[coords.to_nd_index()]
    }

    /// In-bounds 8-neighborhood of a position, 3 to 8 elements.
    pub fn neighbors(&self, coords: Coord2) -> Neighbors {
        Neighbors::of(coords, (self.rows, self.cols))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn placed_mine_count(&self) -> CellCount {
        self.iter()
            .filter(|cell| cell.is_mine())
            .count()
            .try_into()
            .unwrap()
    }

    pub fn revealed_count(&self) -> CellCount {
        self.iter()
            .filter(|cell| cell.is_revealed())
            .count()
            .try_into()
            .unwrap()
    }

    /// Blanks every cell in place, keeping dimensions and the mine target.
    pub(crate) fn reset_cells(&mut self) {
        for cell in self.cells.iter_mut() {
            cell.reset();
        }
    }

    pub(crate) fn set_mine_count(&mut self, mine_count: CellCount) {
        self.mine_count = mine_count;
    }

    /// Clears any previous layout and scatters mines uniformly over every
    /// position outside the 3x3 safety zone around `exclude`, then derives
    /// adjacency counts. Returns the number of mines actually placed, which
    /// differs from the configured count only when clamped.
    pub(crate) fn place_mines<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        exclude: Option<Coord2>,
    ) -> CellCount {
        let max_mines = self.total_cells().saturating_sub(1);
        if self.mine_count > max_mines {
            log::warn!(
                "requested {} mines but the board only fits {}, clamping",
                self.mine_count,
                max_mines
            );
            self.mine_count = max_mines;
        }

        for cell in self.cells.iter_mut() {
            cell.set_mine(false);
        }

        let safety_zone: HashSet<Coord2> = match exclude {
            Some(center) => {
                debug_assert!(self.is_valid_position(center.0, center.1));
                self.neighbors(center).chain([center]).collect()
            }
            None => HashSet::new(),
        };

        let mut positions: Vec<Coord2> = Vec::with_capacity(self.cells.len());
        for row in 0..self.rows {
            for col in 0..self.cols {
                if !safety_zone.contains(&(row, col)) {
                    positions.push((row, col));
                }
            }
        }

        positions.shuffle(rng);

        let placed: CellCount = positions
            .len()
            .min(self.mine_count as usize)
            .try_into()
            .unwrap();
        for &coords in &positions[..placed as usize] {
            self.cells[coords.to_nd_index()].set_mine(true);
        }

        if placed != self.mine_count {
            log::warn!(
                "safety zone left room for only {} of {} mines",
                placed,
                self.mine_count
            );
            self.mine_count = placed;
        }

        self.compute_adjacency();
        placed
    }

    /// Full-grid recompute of every cell's adjacent-mine count. Idempotent;
    /// correctness over partial-update micro-optimizations.
    pub fn compute_adjacency(&mut self) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let count: u8 = self
                    .neighbors((row, col))
                    .filter(|&pos| self.cells[pos.to_nd_index()].is_mine())
                    .count()
                    .try_into()
                    .unwrap();
                self.cells[(row, col).to_nd_index()].set_adjacent_mines(count);
            }
        }
    }
}
