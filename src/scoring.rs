//! Pip counts and terminal scoring.

use crate::constants::SIDE_A_HOME;
use crate::position::{Position, Side};

/// Pips `side` still has to travel, summed over its checkers on the points.
///
/// Reads only the point array; bar checkers and dice are ignored.
pub fn pip_score(pos: &Position, side: Side) -> u32 {
    pos.occupied(side)
        .iter()
        .map(|&pt| {
            let count = (pos.points()[pt as usize] * side.sign()) as u32;
            count * side.distance_home(pt)
        })
        .sum()
}

/// Pip count with each bar checker charged the full board length.
pub fn race_pips(pos: &Position, side: Side) -> u32 {
    pip_score(pos, side) + pos.on_bar(side) as u32 * SIDE_A_HOME as u32
}

/// +1 if `side` has borne everything off, -1 if its opponent has, 0 otherwise.
pub fn endgame_score(pos: &Position, side: Side) -> f64 {
    match pos.winner() {
        Some(w) if w == side => 1.0,
        Some(_) => -1.0,
        None => 0.0,
    }
}

/// Per-side reward for arriving at `next`.
pub fn immediate_reward(next: &Position) -> [f64; 2] {
    [
        endgame_score(next, Side::A),
        endgame_score(next, Side::B),
    ]
}
