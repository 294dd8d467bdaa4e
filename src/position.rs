//! Backgammon position representation and move execution.
//!
//! This module provides the core board logic:
//! - Board state as a signed 26-slot array (sign = owner, magnitude = stack height)
//! - Cached sorted occupancy per side, kept in step with the array
//! - Single checker moves with hitting and bar re-entry
//! - The transition function that applies a whole action and re-rolls the dice
//!
//! Side A owns positive counts and moves from low to high indices; side B owns
//! negative counts and moves from high to low. Each side's bear-off tray is its
//! home slot (25 for A, 0 for B) and checkers on its bar re-enter from the
//! opposing home slot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{GameError, MoveError, Result};
use crate::movegen::is_legal;

/// One of the two players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    /// Index into per-side arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Sign of this side's counts in the point array.
    #[inline]
    pub fn sign(self) -> i8 {
        match self {
            Side::A => 1,
            Side::B => -1,
        }
    }

    /// Bear-off slot.
    #[inline]
    pub fn home(self) -> u8 {
        match self {
            Side::A => SIDE_A_HOME,
            Side::B => SIDE_B_HOME,
        }
    }

    /// Slot that bar checkers re-enter from (the opponent's home slot).
    #[inline]
    pub fn entry(self) -> u8 {
        self.opponent().home()
    }

    /// Raw destination of a move of `face` pips from `from`; may overshoot the board.
    #[inline]
    pub fn target(self, from: u8, face: u8) -> i16 {
        match self {
            Side::A => from as i16 + face as i16,
            Side::B => from as i16 - face as i16,
        }
    }

    /// True if `pt` lies in this side's six-point home quadrant.
    #[inline]
    pub fn in_home_quadrant(self, pt: u8) -> bool {
        match self {
            Side::A => pt >= SIDE_A_HOME - HOME_QUADRANT && pt < SIDE_A_HOME,
            Side::B => pt > SIDE_B_HOME && pt <= SIDE_B_HOME + HOME_QUADRANT,
        }
    }

    /// Pips from `pt` to this side's home slot.
    #[inline]
    pub fn distance_home(self, pt: u8) -> u32 {
        (self.home() as i32 - pt as i32).unsigned_abs()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// A single checker move consuming one die face.
///
/// Bar entries use the opponent's home slot as `from`; bear-offs use the
/// mover's home slot as `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    pub face: u8,
}

impl Move {
    pub fn new(from: u8, to: u8, face: u8) -> Self {
        Self { from, to, face }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}({})", self.from, self.to, self.face)
    }
}

/// An ordered move sequence played for one dice roll. The empty sequence is a pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(pub Vec<Move>);

impl Action {
    /// The distinguished "no move" action.
    pub fn pass() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn is_pass(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn moves(&self) -> &[Move] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Move>> for Action {
    fn from(moves: Vec<Move>) -> Self {
        Self(moves)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pass() {
            return write!(f, "pass");
        }
        for (i, mv) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{mv}")?;
        }
        Ok(())
    }
}

/// Compact fingerprint of a position: everything that identifies a state.
///
/// Also serves as the serialized form of a position in match records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub points: [i8; NUM_POINTS],
    pub bar: [u8; 2],
    pub dice: [u8; 2],
    pub side_to_move: Side,
}

/// A backgammon position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    /// Signed checker counts: positive for side A, negative for side B
    points: [i8; NUM_POINTS],
    /// Sorted occupied slots per side, home slot included
    occupied: [Vec<u8>; 2],
    /// Checkers waiting to re-enter, per side
    bar: [u8; 2],
    dice: [u8; 2],
    side_to_move: Side,
}

impl Position {
    /// The standard opening layout with the given dice, side A to move.
    pub fn starting(dice: [u8; 2]) -> Result<Self> {
        Self::from_parts(opening_points(), [0, 0], dice, Side::A)
    }

    /// A fresh game with an opening roll drawn from `rng`.
    pub fn new_game(rng: &mut fastrand::Rng) -> Self {
        let points = opening_points();
        let occupied = build_occupancy(&points);
        Self {
            points,
            occupied,
            bar: [0, 0],
            dice: roll_dice(rng),
            side_to_move: Side::A,
        }
    }

    /// Build a position from raw parts, rejecting anything malformed.
    pub fn from_parts(
        points: [i8; NUM_POINTS],
        bar: [u8; 2],
        dice: [u8; 2],
        side_to_move: Side,
    ) -> Result<Self> {
        check_dice(dice)?;
        if points[SIDE_A_HOME as usize] < 0 || points[SIDE_B_HOME as usize] > 0 {
            return Err(GameError::InvariantViolation(
                "home slot holds opposing checkers".into(),
            ));
        }
        let pos = Self {
            points,
            occupied: build_occupancy(&points),
            bar,
            dice,
            side_to_move,
        };
        pos.validate()?;
        Ok(pos)
    }

    /// Rebuild a position from its fingerprint.
    pub fn from_key(key: &StateKey) -> Result<Self> {
        Self::from_parts(key.points, key.bar, key.dice, key.side_to_move)
    }

    pub fn key(&self) -> StateKey {
        StateKey {
            points: self.points,
            bar: self.bar,
            dice: self.dice,
            side_to_move: self.side_to_move,
        }
    }

    #[inline]
    pub fn points(&self) -> &[i8; NUM_POINTS] {
        &self.points
    }

    /// Signed checker count at a slot.
    pub fn checkers_at(&self, pt: u8) -> Result<i8> {
        self.points
            .get(pt as usize)
            .copied()
            .ok_or(GameError::PointOutOfRange(pt))
    }

    /// Sorted slots holding `side`'s checkers, its home slot included.
    #[inline]
    pub fn occupied(&self, side: Side) -> &[u8] {
        &self.occupied[side.index()]
    }

    #[inline]
    pub fn on_bar(&self, side: Side) -> u8 {
        self.bar[side.index()]
    }

    #[inline]
    pub fn dice(&self) -> [u8; 2] {
        self.dice
    }

    #[inline]
    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    /// Replace the dice, e.g. when setting up a test position.
    pub fn set_dice(&mut self, dice: [u8; 2]) -> Result<()> {
        check_dice(dice)?;
        self.dice = dice;
        Ok(())
    }

    /// Die faces available this turn, four copies for a double.
    pub fn faces(&self) -> Vec<u8> {
        let [a, b] = self.dice;
        if a == b {
            vec![a; DOUBLES_MULTIPLIER]
        } else {
            vec![a, b]
        }
    }

    /// Checkers `side` has borne off.
    pub fn borne_off(&self, side: Side) -> u32 {
        (self.points[side.home() as usize] * side.sign()).max(0) as u32
    }

    /// Checkers `side` has on the board, bar and tray.
    pub fn checker_count(&self, side: Side) -> u32 {
        let on_points: u32 = self
            .points
            .iter()
            .map(|&c| (c * side.sign()).max(0) as u32)
            .sum();
        on_points + self.on_bar(side) as u32
    }

    /// Check the fifteen-checkers-per-side invariant and the occupancy caches.
    pub fn validate(&self) -> Result<()> {
        for side in Side::BOTH {
            let count = self.checker_count(side);
            if count != CHECKERS_PER_SIDE {
                return Err(GameError::InvariantViolation(format!(
                    "side {side} has {count} checkers"
                )));
            }
        }
        if self.occupied != build_occupancy(&self.points) {
            return Err(GameError::InvariantViolation(
                "occupancy cache out of sync".into(),
            ));
        }
        Ok(())
    }

    /// The side that has borne off all its checkers, if any.
    pub fn winner(&self) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|&side| self.borne_off(side) == CHECKERS_PER_SIDE)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.winner().is_some()
    }

    /// True when `side` may bear off: nothing on the bar and every checker in its quadrant.
    pub fn all_home(&self, side: Side) -> bool {
        self.on_bar(side) == 0
            && self
                .occupied(side)
                .iter()
                .all(|&pt| pt == side.home() || side.in_home_quadrant(pt))
    }

    /// The checker of `side` furthest from its home, ignoring the bar.
    pub fn rearmost(&self, side: Side) -> Option<u8> {
        let mut on_board = self
            .occupied(side)
            .iter()
            .copied()
            .filter(|&pt| pt != side.home());
        match side {
            Side::A => on_board.next(),
            Side::B => on_board.last(),
        }
    }

    /// Play a single checker move for the side to move, without touching dice or turn.
    ///
    /// Checks the move mechanically: source ownership, bar-first entry, die distance,
    /// blocking and bear-off eligibility.
    pub fn play_move(&mut self, mv: Move) -> Result<()> {
        let side = self.side_to_move;
        let sign = side.sign();
        for pt in [mv.from, mv.to] {
            if pt as usize >= NUM_POINTS {
                return Err(GameError::PointOutOfRange(pt));
            }
        }
        let illegal = |reason| GameError::IllegalMove { mv, reason };

        // Source
        let entering = mv.from == side.entry();
        if entering {
            if self.on_bar(side) == 0 {
                return Err(illegal(MoveError::EmptySource));
            }
        } else {
            if self.on_bar(side) > 0 {
                return Err(illegal(MoveError::MustEnter));
            }
            if mv.from == side.home() || self.points[mv.from as usize] * sign <= 0 {
                return Err(illegal(MoveError::EmptySource));
            }
        }

        // Destination
        let target = side.target(mv.from, mv.face);
        if mv.to == side.home() {
            if entering || !self.all_home(side) {
                return Err(illegal(MoveError::NotHome));
            }
            let exact = target == mv.to as i16;
            let overshoot = match side {
                Side::A => target > mv.to as i16,
                Side::B => target < mv.to as i16,
            };
            if !exact && !(overshoot && self.rearmost(side) == Some(mv.from)) {
                return Err(illegal(MoveError::WrongDistance));
            }
        } else {
            if target != mv.to as i16 || mv.to == side.entry() {
                return Err(illegal(MoveError::WrongDistance));
            }
            if self.points[mv.to as usize] * -sign >= CHECKERS_BLOCKED {
                return Err(illegal(MoveError::Blocked));
            }
        }

        // Lift the checker
        if entering {
            self.bar[side.index()] -= 1;
        } else {
            self.points[mv.from as usize] -= sign;
            if self.points[mv.from as usize] == 0 {
                remove_sorted(&mut self.occupied[side.index()], mv.from);
            }
        }

        // Hit a lone opposing checker
        let to = mv.to as usize;
        if self.points[to] == -sign {
            let opp = side.opponent();
            self.points[to] = 0;
            remove_sorted(&mut self.occupied[opp.index()], mv.to);
            self.bar[opp.index()] += 1;
        }

        // Land
        if self.points[to] == 0 {
            insert_sorted(&mut self.occupied[side.index()], mv.to);
        }
        self.points[to] += sign;
        Ok(())
    }

    /// Play every move of `action` on a copy, keeping dice and side to move.
    pub fn after_moves(&self, action: &Action) -> Result<Position> {
        let mut next = self.clone();
        for &mv in action.moves() {
            next.play_move(mv)?;
        }
        next.validate()?;
        Ok(next)
    }

    /// Transition function: play `action`, re-roll the dice and pass the turn.
    ///
    /// Rejects anything that is not one of [`legal_actions`](crate::movegen::legal_actions)
    /// for this position.
    pub fn apply(&self, action: &Action, rng: &mut fastrand::Rng) -> Result<Position> {
        self.apply_with_dice(action, roll_dice(rng))
    }

    /// Transition with a recorded roll for the next turn instead of a fresh one.
    pub fn apply_with_dice(&self, action: &Action, dice: [u8; 2]) -> Result<Position> {
        if !is_legal(self, action) {
            return Err(GameError::IllegalAction(action.clone()));
        }
        self.apply_with_dice_unchecked(action, dice)
    }

    /// [`apply`](Self::apply) for an action already drawn from `legal_actions`.
    pub(crate) fn apply_unchecked(
        &self,
        action: &Action,
        rng: &mut fastrand::Rng,
    ) -> Result<Position> {
        self.apply_with_dice_unchecked(action, roll_dice(rng))
    }

    fn apply_with_dice_unchecked(&self, action: &Action, dice: [u8; 2]) -> Result<Position> {
        check_dice(dice)?;
        let mut next = self.after_moves(action)?;
        next.dice = dice;
        next.side_to_move = self.side_to_move.opponent();
        Ok(next)
    }
}

/// Roll two dice.
pub fn roll_dice(rng: &mut fastrand::Rng) -> [u8; 2] {
    [
        rng.u8(MIN_DICE_VALUE..=MAX_DICE_VALUE),
        rng.u8(MIN_DICE_VALUE..=MAX_DICE_VALUE),
    ]
}

fn opening_points() -> [i8; NUM_POINTS] {
    let mut points = [0i8; NUM_POINTS];
    for (pt, n) in INIT_BOARD_CONFIG {
        points[pt as usize] = n;
        points[(SIDE_A_HOME - pt) as usize] = -n;
    }
    points
}

fn check_dice(dice: [u8; 2]) -> Result<()> {
    let in_range = |d: u8| (MIN_DICE_VALUE..=MAX_DICE_VALUE).contains(&d);
    if in_range(dice[0]) && in_range(dice[1]) {
        Ok(())
    } else {
        Err(GameError::InvalidDice(dice[0], dice[1]))
    }
}

fn build_occupancy(points: &[i8; NUM_POINTS]) -> [Vec<u8>; 2] {
    let mut occupied = [Vec::new(), Vec::new()];
    for (pt, &c) in points.iter().enumerate() {
        if c > 0 {
            occupied[Side::A.index()].push(pt as u8);
        } else if c < 0 {
            occupied[Side::B.index()].push(pt as u8);
        }
    }
    occupied
}

fn insert_sorted(set: &mut Vec<u8>, pt: u8) {
    if let Err(i) = set.binary_search(&pt) {
        set.insert(i, pt);
    }
}

fn remove_sorted(set: &mut Vec<u8>, pt: u8) {
    if let Ok(i) = set.binary_search(&pt) {
        set.remove(i);
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pt, &c) in self.points.iter().enumerate() {
            let stack = match c {
                c if c > 0 => "A".repeat(c as usize),
                c if c < 0 => "B".repeat(c.unsigned_abs() as usize),
                _ => String::new(),
            };
            writeln!(f, "{pt:>2} {stack}")?;
        }
        writeln!(f, "BAR A:{} B:{}", self.bar[0], self.bar[1])?;
        write!(
            f,
            "DICE: {} {}  TO MOVE: {}",
            self.dice[0], self.dice[1], self.side_to_move
        )
    }
}
