use std::collections::{HashSet, VecDeque};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::cell::Cell;
use crate::error::{GameError, Result};
use crate::session::{Phase, SessionState};
use crate::types::{CellCount, Coord, Coord2};
use crate::GameConfig;

/// Whether the end-of-round mine listing includes mines the player already
/// flagged correctly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MineRevealPolicy {
    IncludeFlagged,
    SkipFlagged,
}

impl Default for MineRevealPolicy {
    fn default() -> Self {
        Self::IncludeFlagged
    }
}

/// Outcome of a successful reveal action.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Safe reveal, round continues
    Continue,
    /// Every non-mine cell is now revealed
    Won,
    /// The revealed cell was a mine
    Lost,
}

impl RevealOutcome {
    pub const fn is_won(self) -> bool {
        matches!(self, Self::Won)
    }

    pub const fn is_lost(self) -> bool {
        matches!(self, Self::Lost)
    }

    pub const fn ends_round(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// What a reveal action changed: the outcome plus every cell newly revealed
/// by it, cascade included. On a loss the list contains exactly the one
/// mine cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealReport {
    pub outcome: RevealOutcome,
    pub revealed: Vec<Coord2>,
}

/// What a flag toggle changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FlagReport {
    pub flagged: bool,
    pub mines_remaining: i32,
}

fn entropy_rng() -> SmallRng {
    SmallRng::from_os_rng()
}

/// Orchestrates one [`Board`] and one [`SessionState`] per round,
/// implementing the two player actions, the flood-fill cascade, and
/// win/loss detection. Invoked once per discrete player action; never
/// initiates actions itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RulesEngine {
    board: Board,
    session: SessionState,
    /// Gates first-click handling; deliberately separate from the board's
    /// own mine state.
    mines_placed: bool,
    revealed_count: CellCount,
    reveal_policy: MineRevealPolicy,
    #[serde(skip, default = "entropy_rng")]
    rng: SmallRng,
}

impl RulesEngine {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, entropy_rng())
    }

    /// Deterministic construction; identical seeds replay identical mine
    /// layouts for the same first click.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: SmallRng) -> Self {
        Self {
            board: Board::new(config.rows, config.cols, config.mines),
            session: SessionState::new(config.mines),
            mines_placed: false,
            revealed_count: 0,
            reveal_policy: Default::default(),
            rng,
        }
    }

    /// Adopts a board whose mines are already laid out, skipping lazy
    /// placement. The first reveal still starts the round.
    pub fn with_board(board: Board) -> Self {
        let session = SessionState::new(board.mine_count());
        Self {
            board,
            session,
            mines_placed: true,
            revealed_count: 0,
            reveal_policy: Default::default(),
            rng: entropy_rng(),
        }
    }

    pub fn set_reveal_policy(&mut self, policy: MineRevealPolicy) {
        self.reveal_policy = policy;
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> GameConfig {
        GameConfig::new_unchecked(self.board.rows(), self.board.cols(), self.board.mine_count())
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn mines_remaining(&self) -> i32 {
        self.session.mines_remaining()
    }

    pub fn elapsed(&self) -> u32 {
        self.session.elapsed()
    }

    pub fn cell(&self, coords: Coord2) -> Option<&Cell> {
        self.board.get(coords)
    }

    /// Host-driven once-per-second pulse; a no-op outside the Active phase,
    /// so late ticks after a terminal transition change nothing.
    pub fn tick(&mut self) {
        self.session.tick();
    }

    /// Reveals a cell. The first reveal of a round places the mines with
    /// this coordinate as the safety-zone center and starts the clock.
    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealReport> {
        let coords = self.board.validate_coords(coords)?;
        if self.session.is_ended() {
            return Err(GameError::GameEnded);
        }

        let cell = self.board.cell(coords);
        if cell.is_flagged() {
            return Err(GameError::CellFlagged);
        }
        if cell.is_revealed() {
            return Err(GameError::AlreadyRevealed);
        }

        if !self.mines_placed {
            let placed = self.board.place_mines(&mut self.rng, Some(coords));
            if placed != self.session.total_mines() {
                self.session.adjust_total_mines(placed);
            }
            self.mines_placed = true;
        }
        self.session.start();

        if self.board.cell(coords).is_mine() {
            self.board.cell_mut(coords).mark_revealed();
            self.session.lose();
            log::debug!("mine hit at {coords:?}");
            return Ok(RevealReport {
                outcome: RevealOutcome::Lost,
                revealed: vec![coords],
            });
        }

        let revealed = self.cascade_from(coords);

        let outcome = if self.revealed_count == self.board.safe_cell_count() {
            self.session.win();
            RevealOutcome::Won
        } else {
            RevealOutcome::Continue
        };

        Ok(RevealReport { outcome, revealed })
    }

    /// Breadth-first flood fill. Reveals the seed, then expands layer by
    /// layer through zero-count cells, stopping at the ring of numbered
    /// cells bordering each blank region. Never reveals a mine or a flagged
    /// cell.
    fn cascade_from(&mut self, seed: Coord2) -> Vec<Coord2> {
        let mut revealed = Vec::new();
        self.reveal_one(seed, &mut revealed);

        if self.board.cell(seed).adjacent_mines() > 0 {
            return revealed;
        }

        let mut visited = HashSet::from([seed]);
        let mut to_visit: VecDeque<Coord2> = self.board.neighbors(seed).collect();
        log::trace!("flood fill from {seed:?}, frontier {to_visit:?}");

        while let Some(coords) = to_visit.pop_front() {
            if !visited.insert(coords) {
                continue;
            }

            // flagged cells and (defensively) mines stop the flood
            let cell = self.board.cell(coords);
            if cell.is_revealed() || cell.is_flagged() || cell.is_mine() {
                continue;
            }

            self.reveal_one(coords, &mut revealed);

            if self.board.cell(coords).adjacent_mines() == 0 {
                let neighbors = self.board.neighbors(coords);
                to_visit.extend(neighbors.filter(|pos| {
                    !visited.contains(pos) && !self.board.cell(*pos).is_revealed()
                }));
            }
        }

        revealed
    }

    fn reveal_one(&mut self, coords: Coord2, revealed: &mut Vec<Coord2>) {
        self.board.cell_mut(coords).mark_revealed();
        self.revealed_count += 1;
        revealed.push(coords);
        log::trace!(
            "revealed {coords:?}, adjacent mines {}",
            self.board.cell(coords).adjacent_mines()
        );
    }

    /// Toggles the flag on an unrevealed cell and tracks the remaining-mine
    /// counter: down on flag with no floor, up on unflag clamped at the
    /// round total.
    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<FlagReport> {
        let coords = self.board.validate_coords(coords)?;
        if self.session.is_ended() {
            return Err(GameError::GameEnded);
        }
        if self.board.cell(coords).is_revealed() {
            return Err(GameError::CannotFlagRevealed);
        }

        let flagged = !self.board.cell(coords).is_flagged();
        self.board.cell_mut(coords).set_flagged(flagged);
        if flagged {
            self.session.flag_added();
        } else {
            self.session.flag_removed();
        }

        Ok(FlagReport {
            flagged,
            mines_remaining: self.session.mines_remaining(),
        })
    }

    /// Starts a new round on the same grid, optionally with a new mine
    /// total. Blanks every cell; mines are placed again on the next first
    /// reveal.
    pub fn reset(&mut self, total_mines: Option<CellCount>) {
        self.board.reset_cells();
        if let Some(total) = total_mines {
            self.board.set_mine_count(total);
        }
        self.session.reset(total_mines);
        self.mines_placed = false;
        self.revealed_count = 0;
        log::debug!("round reset, {} mines", self.board.mine_count());
    }

    /// Resizes the grid and starts a new round.
    pub fn change_difficulty(&mut self, rows: Coord, cols: Coord, mine_count: CellCount) {
        let config = GameConfig::new((rows, cols), mine_count);
        self.board = Board::new(config.rows, config.cols, config.mines);
        self.session.reset(Some(config.mines));
        self.mines_placed = false;
        self.revealed_count = 0;
        log::debug!(
            "difficulty changed to {}x{} with {} mines",
            config.rows,
            config.cols,
            config.mines
        );
    }

    /// Mines still hidden at round end, for the reveal-all sweep. Whether
    /// correctly flagged mines are listed follows the configured
    /// [`MineRevealPolicy`].
    pub fn unrevealed_mines(&self) -> Vec<Coord2> {
        self.board
            .iter()
            .filter(|cell| cell.is_mine() && !cell.is_revealed())
            .filter(|cell| match self.reveal_policy {
                MineRevealPolicy::IncludeFlagged => true,
                MineRevealPolicy::SkipFlagged => !cell.is_flagged(),
            })
            .map(Cell::coords)
            .collect()
    }

    /// Flagged cells that are not mines, for "incorrect flag" feedback.
    pub fn incorrect_flags(&self) -> Vec<Coord2> {
        self.board
            .iter()
            .filter(|cell| cell.is_flagged() && !cell.is_mine())
            .map(Cell::coords)
            .collect()
    }

    /// Mines the player never flagged, for "missed mines" feedback.
    pub fn missed_mines(&self) -> Vec<Coord2> {
        self.board
            .iter()
            .filter(|cell| cell.is_mine() && !cell.is_flagged())
            .map(Cell::coords)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(rows: Coord, cols: Coord, mines: &[Coord2]) -> RulesEngine {
        RulesEngine::with_board(Board::with_mines(rows, cols, mines).unwrap())
    }

    fn mine_coords(board: &Board) -> Vec<Coord2> {
        board
            .iter()
            .filter(|cell| cell.is_mine())
            .map(Cell::coords)
            .collect()
    }

    #[test]
    fn first_reveal_places_mines_outside_the_safety_zone() {
        let mut engine = RulesEngine::with_seed(GameConfig::new((9, 9), 10), 11);
        assert_eq!(engine.phase(), Phase::Idle);

        let report = engine.reveal((4, 4)).unwrap();

        // the safety zone makes a first-click loss impossible
        assert!(!report.outcome.is_lost());
        assert_ne!(engine.phase(), Phase::Idle);
        assert_ne!(engine.phase(), Phase::Lost);
        assert_eq!(engine.board().placed_mine_count(), 10);
        assert!(!engine.board().cell((4, 4)).is_mine());
        for pos in engine.board().neighbors((4, 4)) {
            assert!(!engine.board().cell(pos).is_mine());
        }
    }

    #[test]
    fn mines_are_placed_once_per_round() {
        let mut engine = RulesEngine::with_seed(GameConfig::new((9, 9), 10), 5);
        engine.reveal((4, 4)).unwrap();
        let layout = mine_coords(engine.board());

        // a later reveal must not reshuffle the layout
        let target = engine
            .board()
            .iter()
            .find(|cell| !cell.is_revealed() && !cell.is_mine())
            .map(Cell::coords);
        if let Some(target) = target {
            engine.reveal(target).unwrap();
        }

        assert_eq!(mine_coords(engine.board()), layout);
    }

    #[test]
    fn identical_seeds_replay_identical_layouts() {
        let config = GameConfig::new((9, 9), 10);
        let mut a = RulesEngine::with_seed(config, 99);
        let mut b = RulesEngine::with_seed(config, 99);

        a.reveal((4, 4)).unwrap();
        b.reveal((4, 4)).unwrap();

        assert_eq!(mine_coords(a.board()), mine_coords(b.board()));
    }

    #[test]
    fn revealing_a_mine_loses_with_exactly_that_cell() {
        let mut engine = engine(2, 2, &[(0, 0)]);

        let report = engine.reveal((0, 0)).unwrap();

        assert_eq!(report.outcome, RevealOutcome::Lost);
        assert_eq!(report.revealed, [(0, 0)]);
        assert_eq!(engine.phase(), Phase::Lost);
        assert!(engine.board().cell((0, 0)).is_revealed());
        assert_eq!(engine.board().revealed_count(), 1);
    }

    #[test]
    fn no_moves_are_accepted_after_the_round_ends() {
        let mut engine = engine(2, 2, &[(0, 0)]);
        engine.reveal((0, 0)).unwrap();
        let remaining = engine.mines_remaining();

        assert_eq!(engine.reveal((1, 1)).unwrap_err(), GameError::GameEnded);
        assert_eq!(engine.toggle_flag((1, 1)).unwrap_err(), GameError::GameEnded);
        assert!(!engine.board().cell((1, 1)).is_revealed());
        assert!(!engine.board().cell((1, 1)).is_flagged());
        assert_eq!(engine.mines_remaining(), remaining);
    }

    #[test]
    fn reveal_rejects_bad_targets_with_the_expected_errors() {
        let mut engine = engine(2, 2, &[(0, 0)]);

        assert_eq!(engine.reveal((2, 0)).unwrap_err(), GameError::InvalidPosition);

        engine.toggle_flag((0, 1)).unwrap();
        assert_eq!(engine.reveal((0, 1)).unwrap_err(), GameError::CellFlagged);

        engine.reveal((1, 0)).unwrap();
        assert_eq!(engine.reveal((1, 0)).unwrap_err(), GameError::AlreadyRevealed);

        assert_eq!(
            engine.toggle_flag((1, 0)).unwrap_err(),
            GameError::CannotFlagRevealed
        );
    }

    #[test]
    fn cascade_opens_the_blank_region_and_one_numbered_ring() {
        // 1x7 strip, mine in the middle: reveal at one end must stop at the
        // numbered cell next to the mine
        let mut engine = engine(1, 7, &[(0, 3)]);

        let report = engine.reveal((0, 0)).unwrap();

        assert_eq!(report.outcome, RevealOutcome::Continue);
        let mut revealed = report.revealed.clone();
        revealed.sort_unstable();
        assert_eq!(revealed, [(0, 0), (0, 1), (0, 2)]);
        for col in 4..7 {
            assert!(!engine.board().cell((0, col)).is_revealed());
        }
    }

    #[test]
    fn cascade_never_opens_a_flagged_cell() {
        let mut engine = engine(1, 7, &[(0, 3)]);
        engine.toggle_flag((0, 1)).unwrap();

        let report = engine.reveal((0, 0)).unwrap();

        assert_eq!(report.revealed, [(0, 0)]);
        assert!(engine.board().cell((0, 1)).is_flagged());
        assert!(!engine.board().cell((0, 1)).is_revealed());
    }

    #[test]
    fn single_cascade_covering_every_safe_cell_wins_immediately() {
        let mut engine = engine(5, 5, &[(4, 4)]);

        let report = engine.reveal((0, 0)).unwrap();

        assert_eq!(report.outcome, RevealOutcome::Won);
        assert_eq!(report.revealed.len(), 24);
        assert_eq!(engine.phase(), Phase::Won);
        assert!(!engine.board().cell((4, 4)).is_revealed());
        // the ring around the mine carries its count
        assert_eq!(engine.board().cell((3, 3)).adjacent_mines(), 1);
        assert!(engine.board().cell((3, 3)).is_revealed());
    }

    #[test]
    fn zero_mine_round_is_won_on_the_first_reveal() {
        let mut engine = RulesEngine::with_seed(GameConfig::new((3, 3), 0), 1);

        let report = engine.reveal((1, 1)).unwrap();

        assert_eq!(report.outcome, RevealOutcome::Won);
        assert_eq!(report.revealed.len(), 9);
        assert_eq!(engine.phase(), Phase::Won);
    }

    #[test]
    fn win_fires_exactly_when_the_last_safe_cell_opens() {
        let mut engine = engine(2, 2, &[(0, 0)]);

        assert_eq!(engine.reveal((0, 1)).unwrap().outcome, RevealOutcome::Continue);
        assert_eq!(engine.reveal((1, 0)).unwrap().outcome, RevealOutcome::Continue);
        assert_eq!(engine.phase(), Phase::Active);

        assert_eq!(engine.reveal((1, 1)).unwrap().outcome, RevealOutcome::Won);
        assert_eq!(engine.phase(), Phase::Won);
    }

    #[test]
    fn flag_toggle_is_symmetric() {
        let mut engine = engine(2, 2, &[(0, 0)]);
        let initial = engine.mines_remaining();

        let on = engine.toggle_flag((1, 1)).unwrap();
        assert!(on.flagged);
        assert_eq!(on.mines_remaining, initial - 1);

        let off = engine.toggle_flag((1, 1)).unwrap();
        assert!(!off.flagged);
        assert_eq!(off.mines_remaining, initial);
        assert!(!engine.board().cell((1, 1)).is_flagged());
    }

    #[test]
    fn over_flagging_drives_the_counter_negative() {
        let mut engine = engine(2, 2, &[(0, 0)]);

        engine.toggle_flag((0, 1)).unwrap();
        engine.toggle_flag((1, 0)).unwrap();
        let report = engine.toggle_flag((1, 1)).unwrap();

        assert_eq!(report.mines_remaining, -2);
    }

    #[test]
    fn clock_ticks_only_during_the_active_phase() {
        let mut engine = engine(2, 2, &[(0, 0)]);

        engine.tick();
        assert_eq!(engine.elapsed(), 0);

        engine.reveal((1, 1)).unwrap();
        engine.tick();
        engine.tick();
        assert_eq!(engine.elapsed(), 2);

        engine.reveal((0, 0)).unwrap();
        engine.tick();
        assert_eq!(engine.elapsed(), 2);
    }

    #[test]
    fn reset_starts_a_fresh_round_on_the_same_grid() {
        let mut engine = RulesEngine::with_seed(GameConfig::new((9, 9), 10), 21);
        engine.reveal((4, 4)).unwrap();
        engine.tick();
        engine.toggle_flag((0, 0)).unwrap();

        engine.reset(None);

        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.elapsed(), 0);
        assert_eq!(engine.mines_remaining(), 10);
        assert_eq!(engine.board().revealed_count(), 0);
        assert_eq!(engine.board().placed_mine_count(), 0);

        // the next first reveal places mines again
        engine.reveal((4, 4)).unwrap();
        assert_eq!(engine.board().placed_mine_count(), 10);
        assert_ne!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn reset_accepts_a_new_mine_total() {
        let mut engine = RulesEngine::with_seed(GameConfig::new((9, 9), 10), 2);
        engine.reset(Some(20));

        assert_eq!(engine.mines_remaining(), 20);
        engine.reveal((4, 4)).unwrap();
        assert_eq!(engine.board().placed_mine_count(), 20);
    }

    #[test]
    fn changing_difficulty_resizes_and_resets() {
        let mut engine = RulesEngine::with_seed(GameConfig::new((9, 9), 10), 3);
        engine.reveal((4, 4)).unwrap();

        engine.change_difficulty(5, 5, 26);

        assert_eq!((engine.board().rows(), engine.board().cols()), (5, 5));
        // the mine count is clamped below the cell total
        assert_eq!(engine.board().mine_count(), 24);
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.board().revealed_count(), 0);
    }

    #[test]
    fn end_of_round_queries_follow_the_reveal_policy() {
        let mut engine = engine(1, 4, &[(0, 0), (0, 1)]);
        engine.toggle_flag((0, 0)).unwrap();
        engine.toggle_flag((0, 2)).unwrap();

        let mut listed = engine.unrevealed_mines();
        listed.sort_unstable();
        assert_eq!(listed, [(0, 0), (0, 1)]);

        engine.set_reveal_policy(MineRevealPolicy::SkipFlagged);
        assert_eq!(engine.unrevealed_mines(), [(0, 1)]);

        assert_eq!(engine.incorrect_flags(), [(0, 2)]);
        assert_eq!(engine.missed_mines(), [(0, 1)]);
    }

    #[test]
    fn a_round_serializes_and_restores_verbatim() {
        let mut engine = RulesEngine::with_seed(GameConfig::new((9, 9), 10), 77);
        engine.reveal((4, 4)).unwrap();
        engine.toggle_flag((0, 0)).unwrap();
        engine.tick();

        let saved = serde_json::to_string(&engine).unwrap();
        let restored: RulesEngine = serde_json::from_str(&saved).unwrap();

        assert_eq!(restored.board(), engine.board());
        assert_eq!(restored.phase(), engine.phase());
        assert_eq!(restored.mines_remaining(), engine.mines_remaining());
        assert_eq!(restored.elapsed(), engine.elapsed());
    }
}
