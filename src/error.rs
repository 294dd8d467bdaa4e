use thiserror::Error;

use crate::position::{Action, Move};

/// Errors raised by the board engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("invalid dice roll: ({0}, {1})")]
    InvalidDice(u8, u8),

    #[error("point index out of range: {0}")]
    PointOutOfRange(u8),

    #[error("illegal move {mv}: {reason}")]
    IllegalMove { mv: Move, reason: MoveError },

    #[error("action {0} is not legal in this position")]
    IllegalAction(Action),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Why a single checker move was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("no own checker on the source point")]
    EmptySource,
    #[error("checkers on the bar must enter first")]
    MustEnter,
    #[error("destination holds two or more opposing checkers")]
    Blocked,
    #[error("distance does not match the die face")]
    WrongDistance,
    #[error("bearing off before all checkers are home")]
    NotHome,
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, GameError>;
