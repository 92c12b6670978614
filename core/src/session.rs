use serde::{Deserialize, Serialize};

use crate::types::CellCount;

/// Coarse lifecycle stage of a round.
///
/// Valid transitions:
/// - Idle -> Active on start
/// - Active -> Won on win
/// - Active -> Lost on lose
/// - any -> Idle on reset
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Initial state, before the first reveal
    Idle,
    /// Round started, timer running
    Active,
    /// Round ended and player won
    Won,
    /// Round ended and player lost
    Lost,
}

impl Phase {
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Indicates the round has ended and no moves are accepted anymore.
    pub const fn is_ended(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Per-round counters plus the phase machine. Pure data with transition
/// guards; all mutation is driven by the rules engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    phase: Phase,
    total_mines: CellCount,
    mines_remaining: i32,
    elapsed: u32,
}

impl SessionState {
    pub fn new(total_mines: CellCount) -> Self {
        Self {
            phase: Default::default(),
            total_mines,
            mines_remaining: total_mines.into(),
            elapsed: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase.is_ended()
    }

    pub fn total_mines(&self) -> CellCount {
        self.total_mines
    }

    /// Mines not flagged yet; negative when the player has over-flagged.
    pub fn mines_remaining(&self) -> i32 {
        self.mines_remaining
    }

    /// Whole seconds the round has been running, frozen outside Active.
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Host-driven periodic pulse; only advances the clock while Active.
    pub fn tick(&mut self) {
        if matches!(self.phase, Phase::Active) {
            self.elapsed += 1;
        }
    }

    /// Idle -> Active, no-op in any other phase.
    pub(crate) fn start(&mut self) {
        if matches!(self.phase, Phase::Idle) {
            log::debug!("round started");
            self.phase = Phase::Active;
        }
    }

    /// Active -> Won, no-op in any other phase.
    pub(crate) fn win(&mut self) {
        if matches!(self.phase, Phase::Active) {
            log::debug!("round won after {}s", self.elapsed);
            self.phase = Phase::Won;
        }
    }

    /// Active -> Lost, no-op in any other phase.
    pub(crate) fn lose(&mut self) {
        if matches!(self.phase, Phase::Active) {
            log::debug!("round lost after {}s", self.elapsed);
            self.phase = Phase::Lost;
        }
    }

    /// Unconditional return to Idle. Keeps the mine total unless a new one
    /// is supplied.
    pub(crate) fn reset(&mut self, total_mines: Option<CellCount>) {
        if let Some(total) = total_mines {
            self.total_mines = total;
        }
        self.phase = Phase::Idle;
        self.elapsed = 0;
        self.mines_remaining = self.total_mines.into();
    }

    pub(crate) fn flag_added(&mut self) {
        // no floor, over-flagging drives the counter negative
        self.mines_remaining -= 1;
    }

    pub(crate) fn flag_removed(&mut self) {
        self.mines_remaining = (self.mines_remaining + 1).min(self.total_mines.into());
    }

    /// Reconciles the total after placement clamped the configured count,
    /// shifting the remaining counter by the same amount so flags already
    /// placed keep their effect.
    pub(crate) fn adjust_total_mines(&mut self, actual: CellCount) {
        let delta = i32::from(actual) - i32::from(self.total_mines);
        if delta != 0 {
            log::debug!(
                "mine total adjusted from {} to {}",
                self.total_mines,
                actual
            );
            self.total_mines = actual;
            self.mines_remaining += delta;
        }
    }
}
