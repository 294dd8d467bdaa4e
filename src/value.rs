//! State-value estimators consumed by search and by the greedy agent.

use std::collections::HashMap;

use crate::config::ValueKind;
use crate::constants::DEFAULT_ALPHA;
use crate::position::{Position, Side, StateKey};
use crate::scoring::{endgame_score, race_pips};

/// Per-side value estimate of a state plus a learning hook.
pub trait ValueFunction {
    /// Estimated value of `pos` for each side, indexed by [`Side::index`].
    fn value(&self, pos: &Position) -> [f64; 2];

    /// Learn from an observed transition `pos -> next` taken by `side`.
    fn update(&mut self, pos: &Position, next: &Position, reward: [f64; 2], discount: f64, side: Side);

    fn name(&self) -> &'static str;
}

/// Values every state at zero; search then relies on rollout rewards alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroValue;

impl ValueFunction for ZeroValue {
    fn value(&self, _pos: &Position) -> [f64; 2] {
        [0.0, 0.0]
    }

    fn update(&mut self, _: &Position, _: &Position, _: [f64; 2], _: f64, _: Side) {}

    fn name(&self) -> &'static str {
        "zero"
    }
}

/// Race estimate from pip counts, in [-1, 1]. Terminal states use the endgame score.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipValue;

impl PipValue {
    fn race(pos: &Position, side: Side) -> f64 {
        if pos.is_terminal() {
            return endgame_score(pos, side);
        }
        let own = race_pips(pos, side) as f64;
        let opp = race_pips(pos, side.opponent()) as f64;
        let total = own + opp;
        if total == 0.0 {
            0.0
        } else {
            (opp - own) / total
        }
    }
}

impl ValueFunction for PipValue {
    fn value(&self, pos: &Position) -> [f64; 2] {
        [Self::race(pos, Side::A), Self::race(pos, Side::B)]
    }

    fn update(&mut self, _: &Position, _: &Position, _: [f64; 2], _: f64, _: Side) {}

    fn name(&self) -> &'static str {
        "pip"
    }
}

/// Lookup-table TD(0) estimator:
/// `V(s)[side] += alpha * (r[side] + discount * V(s')[side] - V(s)[side])`.
///
/// Terminal successors contribute their reward only. The dice are not part
/// of the table key, so afterstates reached under different rolls share an entry.
#[derive(Debug, Clone)]
pub struct TabularValue {
    alpha: f64,
    table: HashMap<StateKey, [f64; 2]>,
}

impl Default for TabularValue {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl TabularValue {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            table: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn table_key(pos: &Position) -> StateKey {
        StateKey {
            dice: [0, 0],
            ..pos.key()
        }
    }
}

impl ValueFunction for TabularValue {
    fn value(&self, pos: &Position) -> [f64; 2] {
        self.table.get(&Self::table_key(pos)).copied().unwrap_or([0.0, 0.0])
    }

    fn update(&mut self, pos: &Position, next: &Position, reward: [f64; 2], discount: f64, side: Side) {
        let i = side.index();
        let bootstrap = if next.is_terminal() {
            0.0
        } else {
            self.value(next)[i]
        };
        let entry = self.table.entry(Self::table_key(pos)).or_insert([0.0, 0.0]);
        entry[i] += self.alpha * (reward[i] + discount * bootstrap - entry[i]);
    }

    fn name(&self) -> &'static str {
        "tabular"
    }
}

/// Build the estimator named by `kind`.
pub fn from_kind(kind: ValueKind) -> Box<dyn ValueFunction> {
    match kind {
        ValueKind::Zero => Box::new(ZeroValue),
        ValueKind::Pip => Box::new(PipValue),
        ValueKind::Tabular => Box::new(TabularValue::default()),
    }
}
