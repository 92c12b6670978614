use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Position is outside the board")]
    InvalidPosition,
    #[error("Round already ended, no new moves are accepted")]
    GameEnded,
    #[error("Cannot reveal a flagged cell")]
    CellFlagged,
    #[error("Cell is already revealed")]
    AlreadyRevealed,
    #[error("Cannot flag a revealed cell")]
    CannotFlagRevealed,
}

pub type Result<T> = core::result::Result<T, GameError>;
