//! Rollout policies and depth-limited playouts.
//!
//! A playout plays policy moves from a position for at most `horizon` plies,
//! summing each side's discounted immediate rewards. If it stops short of a
//! terminal state the leaf evaluator's estimate is added at each side's discount.

use crate::bandit::argmax_tie_break;
use crate::config::PolicyKind;
use crate::error::Result;
use crate::movegen::legal_actions;
use crate::position::{Action, Position};
use crate::scoring::{immediate_reward, race_pips};
use crate::value::ValueFunction;

/// Pick an index into `actions` (never empty) with the given policy.
pub fn choose_action(
    policy: PolicyKind,
    pos: &Position,
    actions: &[Action],
    rng: &mut fastrand::Rng,
) -> usize {
    match policy {
        PolicyKind::Random => rng.usize(..actions.len()),
        PolicyKind::PipGreedy => pip_greedy(pos, actions, rng),
    }
}

/// Action maximising the mover's pip lead after it is played.
///
/// Bar checkers count as a full board length, so hits score well.
/// Ties are broken uniformly at random.
pub fn pip_greedy(pos: &Position, actions: &[Action], rng: &mut fastrand::Rng) -> usize {
    let side = pos.side_to_move();
    let scores: Vec<f64> = actions
        .iter()
        .map(|action| match pos.after_moves(action) {
            Ok(next) => {
                race_pips(&next, side.opponent()) as f64 - race_pips(&next, side) as f64
            }
            Err(_) => f64::NEG_INFINITY,
        })
        .collect();
    argmax_tie_break(&scores, rng).unwrap_or(0)
}

/// Play out up to `horizon` plies from `start` and return the discounted reward per side.
///
/// Each side keeps its own depth, counting the plies it has moved. A ply's
/// reward for a side is weighted by `discount^depth[side]` after the mover's
/// depth is advanced, and so is the leaf estimate when the horizon is hit.
pub fn rollout(
    start: &Position,
    policy: PolicyKind,
    horizon: u32,
    discount: f64,
    value_fn: &dyn ValueFunction,
    rng: &mut fastrand::Rng,
) -> Result<[f64; 2]> {
    let mut pos = start.clone();
    let mut total = [0.0; 2];
    let mut depth = [0i32; 2];

    for _ in 0..horizon {
        if pos.is_terminal() {
            return Ok(total);
        }
        let actions = legal_actions(&pos);
        let choice = choose_action(policy, &pos, &actions, rng);
        let next = pos.apply_unchecked(&actions[choice], rng)?;
        depth[pos.side_to_move().index()] += 1;
        for (i, r) in immediate_reward(&next).into_iter().enumerate() {
            total[i] += discount.powi(depth[i]) * r;
        }
        pos = next;
    }

    if !pos.is_terminal() {
        for (i, v) in value_fn.value(&pos).into_iter().enumerate() {
            total[i] += discount.powi(depth[i]) * v;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_POINTS;
    use crate::position::Side;
    use crate::value::{PipValue, ZeroValue};

    fn one_checker_left() -> Position {
        let mut points = [0i8; NUM_POINTS];
        points[24] = 1;
        points[25] = 14;
        points[3] = -15;
        Position::from_parts(points, [0, 0], [1, 2], Side::A).unwrap()
    }

    #[test]
    fn test_rollout_discounts_win() {
        let mut rng = fastrand::Rng::with_seed(11);
        let reward = rollout(
            &one_checker_left(),
            PolicyKind::Random,
            3,
            0.9,
            &ZeroValue,
            &mut rng,
        )
        .unwrap();
        // Only A has moved, so B's loss is undiscounted
        assert!((reward[0] - 0.9).abs() < 1e-12);
        assert!((reward[1] + 1.0).abs() < 1e-12);
    }

    /// A to move with no way home; B bears off its last checker on the next ply.
    fn b_wins_next() -> Position {
        let mut points = [0i8; NUM_POINTS];
        points[2] = 15;
        points[1] = -1;
        points[0] = -14;
        Position::from_parts(points, [0, 0], [1, 2], Side::A).unwrap()
    }

    #[test]
    fn test_rollout_discounts_each_side_by_own_depth() {
        let mut rng = fastrand::Rng::with_seed(17);
        let reward =
            rollout(&b_wins_next(), PolicyKind::Random, 3, 0.9, &ZeroValue, &mut rng).unwrap();
        // Each side moved once before the win
        assert!((reward[0] + 0.9).abs() < 1e-12);
        assert!((reward[1] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_rollout_leaf_value_uses_side_depth() {
        let mut rng = fastrand::Rng::with_seed(18);
        let reward =
            rollout(&b_wins_next(), PolicyKind::Random, 1, 0.9, &PipValue, &mut rng).unwrap();
        // A moved once and B not at all; the pip estimate is zero-sum
        assert!(reward[1] != 0.0);
        assert!((reward[0] + 0.9 * reward[1]).abs() < 1e-12);
    }

    #[test]
    fn test_rollout_from_terminal_is_zero() {
        let mut rng = fastrand::Rng::with_seed(12);
        let mut rng2 = fastrand::Rng::with_seed(13);
        let won = one_checker_left()
            .apply(&Action(vec![crate::position::Move::new(24, 25, 2)]), &mut rng2)
            .unwrap();
        assert!(won.is_terminal());
        let reward = rollout(&won, PolicyKind::PipGreedy, 3, 0.9, &PipValue, &mut rng).unwrap();
        assert_eq!(reward, [0.0, 0.0]);
    }

    #[test]
    fn test_rollout_zero_horizon_uses_leaf_value() {
        let mut rng = fastrand::Rng::with_seed(14);
        let pos = one_checker_left();
        let reward = rollout(&pos, PolicyKind::Random, 0, 0.9, &PipValue, &mut rng).unwrap();
        assert_eq!(reward, PipValue.value(&pos));
    }

    #[test]
    fn test_rollout_leaves_start_untouched() {
        let mut rng = fastrand::Rng::with_seed(15);
        let pos = Position::starting([6, 5]).unwrap();
        let before = pos.clone();
        rollout(&pos, PolicyKind::Random, 10, 0.9, &ZeroValue, &mut rng).unwrap();
        assert_eq!(pos, before);
    }

    #[test]
    fn test_pip_greedy_hits_blot() {
        let mut points = [0i8; NUM_POINTS];
        points[1] = 14;
        points[5] = 1;
        points[8] = -1;
        points[24] = -14;
        let pos = Position::from_parts(points, [0, 0], [3, 1], Side::A).unwrap();
        let actions = legal_actions(&pos);
        let mut rng = fastrand::Rng::with_seed(16);
        for _ in 0..20 {
            let i = choose_action(PolicyKind::PipGreedy, &pos, &actions, &mut rng);
            let next = pos.after_moves(&actions[i]).unwrap();
            assert_eq!(next.on_bar(Side::B), 1);
        }
    }
}
