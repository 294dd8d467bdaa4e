//! Constants for board geometry, dice, and engine parameters.
//!
//! The board is a 26-slot array. Slots 1..=24 are the playable points,
//! slot 0 is side B's home tray and slot 25 is side A's home tray. Side A
//! moves towards higher indices and side B towards lower ones, so each
//! side's re-entry origin is the other side's home slot.

// =============================================================================
// Board Geometry
// =============================================================================

/// Number of slots in the point array (24 points plus two home trays).
pub const NUM_POINTS: usize = 26;

/// Home (bear-off) slot for side A.
pub const SIDE_A_HOME: u8 = 25;

/// Home (bear-off) slot for side B.
pub const SIDE_B_HOME: u8 = 0;

/// Checkers per side.
pub const CHECKERS_PER_SIDE: u32 = 15;

/// Width of the home quadrant a side must gather in before bearing off.
pub const HOME_QUADRANT: u8 = 6;

/// A point holding this many opposing checkers is blocked.
pub const CHECKERS_BLOCKED: i8 = 2;

/// Starting layout for side A as (point, checkers). Side B is mirrored at `25 - point`.
pub const INIT_BOARD_CONFIG: [(u8, i8); 4] = [(1, 2), (12, 5), (17, 3), (19, 5)];

// =============================================================================
// Dice
// =============================================================================

pub const MIN_DICE_VALUE: u8 = 1;
pub const MAX_DICE_VALUE: u8 = 6;

/// Number of move-uses granted by a double.
pub const DOUBLES_MULTIPLIER: usize = 4;

// =============================================================================
// Search Parameters
// =============================================================================

/// Rollout horizon, counted in plies summed over both sides.
pub const SIMULATION_DEPTH: u32 = 3;

/// Default discount factor for rollout rewards.
pub const DISCOUNT_FACTOR: f64 = 0.9;

/// Default UCT exploration constant.
pub const DEFAULT_EXPLORE: f64 = 1.0;

/// Default epsilon for epsilon-greedy selection.
pub const DEFAULT_EPSILON: f64 = 0.5;

/// Default softmax temperature.
pub const DEFAULT_TAU: f64 = 1.0;

/// Default learning rate for the tabular TD value function.
pub const DEFAULT_ALPHA: f64 = 0.1;

// =============================================================================
// Turn Budgets
// =============================================================================

/// Search budget (seconds) on an agent's first turn.
pub const FIRST_TURN_TIME: f64 = 15.0;

/// Search budget (seconds) on every later turn.
pub const SUBSEQUENT_TURN_TIME: f64 = 1.0;

/// Safety margin (seconds) subtracted from each budget.
pub const BUFFER_TIME: f64 = 0.25;

/// Rejected actions an agent may submit before forfeiting.
pub const WARNING_LIMIT: u32 = 3;
