//! Legal move-sequence generation.
//!
//! For a roll we grow a play tree: each node owns a copy of the board after
//! the moves on its path, and has one child per legal move of the next die
//! face. Every root-to-leaf path is a candidate sequence. Non-double rolls are
//! expanded once with the faces high-then-low and once low-then-high, and the
//! union is filtered so that:
//! - only sequences using the most dice survive, and
//! - when just one die can be played, the larger face is used if it can be.
//!
//! Move generation switches on the mover's situation at each node:
//! re-entry while anything is on the bar, bear-off once every checker is in
//! the home quadrant, ordinary movement otherwise.

use std::collections::HashSet;

use crate::constants::CHECKERS_BLOCKED;
use crate::error::Result;
use crate::position::{Action, Move, Position, Side};

/// Index into the play-tree arena.
type PlayId = usize;

struct PlayNode {
    parent: Option<PlayId>,
    children: Vec<PlayId>,
    position: Position,
    /// Move that produced this node from its parent
    mv: Option<Move>,
}

/// Scratch tree of partial plays for one roll ordering.
struct PlayTree {
    nodes: Vec<PlayNode>,
}

impl PlayTree {
    fn build(root: &Position, faces: &[u8]) -> Self {
        let mut tree = PlayTree {
            nodes: vec![PlayNode {
                parent: None,
                children: Vec::new(),
                position: root.clone(),
                mv: None,
            }],
        };
        tree.grow(0, faces);
        tree
    }

    /// Add one child per legal move of the next face, then recurse on the rest.
    fn grow(&mut self, id: PlayId, faces: &[u8]) {
        let Some((&face, rest)) = faces.split_first() else {
            return;
        };
        for mv in candidate_moves(&self.nodes[id].position, face) {
            let mut position = self.nodes[id].position.clone();
            if position.play_move(mv).is_err() {
                continue;
            }
            let child = self.nodes.len();
            self.nodes.push(PlayNode {
                parent: Some(id),
                children: Vec::new(),
                position,
                mv: Some(mv),
            });
            self.nodes[id].children.push(child);
            self.grow(child, rest);
        }
    }

    /// Every root-to-leaf move sequence, in depth-first order.
    ///
    /// Nodes are pushed in pre-order, so scanning the arena visits leaves
    /// depth-first; each path is recovered by walking parent links.
    fn sequences(&self) -> Vec<Action> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(leaf, _)| {
                let mut moves = Vec::new();
                let mut cursor = Some(leaf);
                while let Some(id) = cursor {
                    let node = &self.nodes[id];
                    if let Some(mv) = node.mv {
                        moves.push(mv);
                    }
                    cursor = node.parent;
                }
                moves.reverse();
                Action(moves)
            })
            .collect()
    }
}

#[inline]
fn is_blocked(pos: &Position, side: Side, to: u8) -> bool {
    pos.points()[to as usize] * -side.sign() >= CHECKERS_BLOCKED
}

/// Every single move of `face` the side to move may make from this board.
pub fn candidate_moves(pos: &Position, face: u8) -> Vec<Move> {
    let side = pos.side_to_move();
    let home = side.home();

    // Re-entry: the only candidate is entering from the bar
    if pos.on_bar(side) > 0 {
        let from = side.entry();
        let to = side.target(from, face) as u8;
        return if is_blocked(pos, side, to) {
            Vec::new()
        } else {
            vec![Move::new(from, to, face)]
        };
    }

    let bearing_off = pos.all_home(side);
    let exact_exists = bearing_off
        && pos
            .occupied(side)
            .iter()
            .any(|&pt| pt != home && side.target(pt, face) == home as i16);
    let rearmost = pos.rearmost(side);

    let mut moves = Vec::new();
    for &from in pos.occupied(side) {
        if from == home {
            continue;
        }
        let target = side.target(from, face);
        let overshoots = match side {
            Side::A => target > home as i16,
            Side::B => target < home as i16,
        };
        if target == home as i16 {
            if bearing_off {
                moves.push(Move::new(from, home, face));
            }
        } else if overshoots {
            if bearing_off && !exact_exists && rearmost == Some(from) {
                moves.push(Move::new(from, home, face));
            }
        } else if !is_blocked(pos, side, target as u8) {
            moves.push(Move::new(from, target as u8, face));
        }
    }
    moves
}

/// All maximal legal move sequences for the position's own dice.
///
/// Never empty: a roll with no playable move yields the single pass action.
/// The caller's position is never modified.
pub fn legal_actions(pos: &Position) -> Vec<Action> {
    if pos.is_terminal() {
        return vec![Action::pass()];
    }

    let [d1, d2] = pos.dice();
    let (hi, lo) = (d1.max(d2), d1.min(d2));
    let orders = if hi == lo {
        vec![pos.faces()]
    } else {
        vec![vec![hi, lo], vec![lo, hi]]
    };

    let mut seen = HashSet::new();
    let mut actions = Vec::new();
    for faces in orders {
        for action in PlayTree::build(pos, &faces).sequences() {
            if seen.insert(action.clone()) {
                actions.push(action);
            }
        }
    }

    // Play as many dice as possible
    let longest = actions.iter().map(Action::len).max().unwrap_or(0);
    actions.retain(|a| a.len() == longest);

    // With one playable die, prefer the larger face
    if longest == 1 && hi != lo && actions.iter().any(|a| a.moves()[0].face == hi) {
        actions.retain(|a| a.moves()[0].face == hi);
    }

    if actions.is_empty() {
        actions.push(Action::pass());
    }
    actions
}

/// Legal actions for `pos` under an explicit roll.
pub fn legal_actions_for(pos: &Position, dice: [u8; 2]) -> Result<Vec<Action>> {
    let mut rolled = pos.clone();
    rolled.set_dice(dice)?;
    Ok(legal_actions(&rolled))
}

/// True if `action` is one of the legal actions for this position.
pub fn is_legal(pos: &Position, action: &Action) -> bool {
    legal_actions(pos).contains(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_POINTS;

    fn board(
        cells: &[(usize, i8)],
        bar: [u8; 2],
        dice: [u8; 2],
        side: Side,
    ) -> Position {
        let mut points = [0i8; NUM_POINTS];
        for &(pt, n) in cells {
            points[pt] = n;
        }
        Position::from_parts(points, bar, dice, side).unwrap()
    }

    #[test]
    fn test_opening_sequences_use_both_dice() {
        let pos = Position::starting([6, 1]).unwrap();
        let actions = legal_actions(&pos);
        assert!(!actions.is_empty());
        for action in &actions {
            assert_eq!(action.len(), 2);
            let mut faces: Vec<u8> = action.moves().iter().map(|m| m.face).collect();
            faces.sort();
            assert_eq!(faces, vec![1, 6]);
        }
        // 17->23 then 23->24 lands on two B checkers: never generated
        assert!(!actions.iter().any(|a| a.moves().iter().any(|m| m.to == 24)));
        // The classic 12/18 17/18 point-making play is there in both orders
        let make_point = Action(vec![Move::new(12, 18, 6), Move::new(17, 18, 1)]);
        assert!(actions.contains(&make_point));
        let make_point = Action(vec![Move::new(17, 18, 1), Move::new(12, 18, 6)]);
        assert!(actions.contains(&make_point));
    }

    #[test]
    fn test_no_duplicate_sequences() {
        let pos = Position::starting([4, 2]).unwrap();
        let actions = legal_actions(&pos);
        let unique: HashSet<_> = actions.iter().collect();
        assert_eq!(unique.len(), actions.len());
    }

    #[test]
    fn test_closed_board_is_pass() {
        // B holds every entry point for A
        let pos = board(
            &[
                (1, -2),
                (2, -2),
                (3, -2),
                (4, -2),
                (5, -2),
                (6, -2),
                (10, -3),
                (12, 14),
            ],
            [1, 0],
            [3, 5],
            Side::A,
        );
        assert_eq!(legal_actions(&pos), vec![Action::pass()]);
    }

    #[test]
    fn test_larger_face_when_only_one_die_plays() {
        // A's last checker can use either die, but never both: 18 is blocked
        let pos = board(
            &[(10, 1), (25, 14), (18, -2), (3, -13)],
            [0, 0],
            [2, 6],
            Side::A,
        );
        let actions = legal_actions(&pos);
        assert_eq!(actions, vec![Action(vec![Move::new(10, 16, 6)])]);
    }

    #[test]
    fn test_order_forced_to_play_both_dice() {
        // The 6 is blocked from 10, so the 2 must go first
        let pos = board(
            &[(10, 1), (25, 14), (16, -2), (3, -13)],
            [0, 0],
            [6, 2],
            Side::A,
        );
        let actions = legal_actions(&pos);
        assert_eq!(
            actions,
            vec![Action(vec![Move::new(10, 12, 2), Move::new(12, 18, 6)])]
        );
    }

    #[test]
    fn test_bear_off_overshoot_from_rearmost() {
        let pos = board(
            &[(22, 1), (23, 1), (25, 13), (3, -15)],
            [0, 0],
            [6, 5],
            Side::A,
        );
        let actions = legal_actions(&pos);
        assert_eq!(actions.len(), 2);
        assert!(actions.contains(&Action(vec![Move::new(22, 25, 6), Move::new(23, 25, 5)])));
        assert!(actions.contains(&Action(vec![Move::new(22, 25, 5), Move::new(23, 25, 6)])));
        for action in &actions {
            let done = pos.after_moves(action).unwrap();
            assert_eq!(done.winner(), Some(Side::A));
        }
    }

    #[test]
    fn test_exact_bear_off_blocks_overshoot() {
        // A checker sits exactly 6 away, so nothing may overshoot with the 6
        let moves = candidate_moves(
            &board(&[(19, 1), (24, 1), (25, 13), (3, -15)], [0, 0], [6, 6], Side::A),
            6,
        );
        assert_eq!(moves, vec![Move::new(19, 25, 6)]);
    }

    #[test]
    fn test_side_b_moves_downwards() {
        let pos = Position::starting([3, 5]).unwrap();
        let pos_b = pos
            .apply_with_dice(&Action(vec![Move::new(1, 4, 3), Move::new(4, 9, 5)]), [2, 1])
            .unwrap();
        assert_eq!(pos_b.side_to_move(), Side::B);
        for action in legal_actions(&pos_b) {
            for mv in action.moves() {
                assert!(mv.to < mv.from);
            }
        }
    }

    #[test]
    fn test_caller_position_untouched() {
        let pos = Position::starting([5, 5]).unwrap();
        let before = pos.clone();
        let _ = legal_actions(&pos);
        assert_eq!(pos, before);
    }

    #[test]
    fn test_legal_actions_for_rejects_bad_dice() {
        let pos = Position::starting([1, 2]).unwrap();
        assert!(legal_actions_for(&pos, [0, 2]).is_err());
        let actions = legal_actions_for(&pos, [5, 5]).unwrap();
        assert!(actions.iter().all(|a| a.len() == 4));
        assert!(is_legal(&pos, &legal_actions(&pos)[0]));
    }
}
