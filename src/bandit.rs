//! Multi-armed bandit strategies for action selection.
//!
//! Strategies pick among candidate actions using Q(s,a) estimates held in a
//! [`QTable`]:
//! - [`Ucb1`]: optimism bonus from global action counts
//! - [`Uct`]: the tree form of UCB1, counts keyed by (state, action)
//! - [`Softmax`]: Boltzmann sampling over Q / tau
//! - [`EpsilonGreedy`]: random with probability epsilon, greedy otherwise
//!
//! UCB1 and UCT play every untried action once before applying their formula.
//! All argmax ties are broken uniformly at random.

use std::collections::HashMap;

use crate::config::BanditConfig;
use crate::position::{Action, StateKey};

/// Q(s,a) estimates with the visit counts that drive the sample-mean update.
#[derive(Debug, Default)]
pub struct QTable {
    values: HashMap<(StateKey, Action), f64>,
    state_visits: HashMap<StateKey, u32>,
    action_visits: HashMap<(StateKey, Action), u32>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current estimate; 0.0 for pairs never updated.
    pub fn q(&self, key: &StateKey, action: &Action) -> f64 {
        self.values
            .get(&(*key, action.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_q(&mut self, key: &StateKey, action: &Action, value: f64) {
        self.values.insert((*key, action.clone()), value);
    }

    /// N(s)
    pub fn visits(&self, key: &StateKey) -> u32 {
        self.state_visits.get(key).copied().unwrap_or(0)
    }

    /// N(s,a)
    pub fn action_visits(&self, key: &StateKey, action: &Action) -> u32 {
        self.action_visits
            .get(&(*key, action.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Count a visit and move Q(s,a) towards `target` by 1/N(s,a).
    pub fn update(&mut self, key: &StateKey, action: &Action, target: f64) {
        *self.state_visits.entry(*key).or_insert(0) += 1;
        let n = self.action_visits.entry((*key, action.clone())).or_insert(0);
        *n += 1;
        let n = *n as f64;
        let q = self.values.entry((*key, action.clone())).or_insert(0.0);
        *q += (target - *q) / n;
    }

    /// Index of the action with the highest Q, ties broken at random.
    pub fn arg_max(&self, key: &StateKey, actions: &[Action], rng: &mut fastrand::Rng) -> Option<usize> {
        let scores: Vec<f64> = actions.iter().map(|a| self.q(key, a)).collect();
        argmax_tie_break(&scores, rng)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Index of the largest score, choosing uniformly among exact ties.
pub fn argmax_tie_break(scores: &[f64], rng: &mut fastrand::Rng) -> Option<usize> {
    let mut best = f64::NEG_INFINITY;
    let mut ties: Vec<usize> = Vec::new();
    for (i, &s) in scores.iter().enumerate() {
        if s > best {
            best = s;
            ties.clear();
            ties.push(i);
        } else if s == best {
            ties.push(i);
        }
    }
    match ties.len() {
        0 => None,
        1 => Some(ties[0]),
        n => Some(ties[rng.usize(..n)]),
    }
}

/// Action-selection policy used in the tree and in rollouts.
pub trait Strategy {
    /// Pick one of `actions` (never empty) and return its index.
    fn select_action(
        &mut self,
        key: &StateKey,
        actions: &[Action],
        q: &QTable,
        rng: &mut fastrand::Rng,
    ) -> usize;

    fn name(&self) -> &'static str;
}

/// UCB1 with counts keyed by action alone.
#[derive(Debug, Default)]
pub struct Ucb1 {
    total: u32,
    times_selected: HashMap<Action, u32>,
}

impl Ucb1 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing selection counts.
    pub fn primed(counts: impl IntoIterator<Item = (Action, u32)>) -> Self {
        let times_selected: HashMap<Action, u32> = counts.into_iter().collect();
        let total = times_selected.values().sum();
        Self {
            total,
            times_selected,
        }
    }

    pub fn times_selected(&self, action: &Action) -> u32 {
        self.times_selected.get(action).copied().unwrap_or(0)
    }

    /// Q(s,a) + sqrt(2 ln N / N(a))
    pub fn score(&self, q: f64, action: &Action) -> f64 {
        let n = self.times_selected(action) as f64;
        q + (2.0 * (self.total as f64).ln() / n).sqrt()
    }
}

impl Strategy for Ucb1 {
    fn select_action(
        &mut self,
        key: &StateKey,
        actions: &[Action],
        q: &QTable,
        rng: &mut fastrand::Rng,
    ) -> usize {
        let choice = match actions
            .iter()
            .position(|a| !self.times_selected.contains_key(a))
        {
            Some(untried) => untried,
            None => {
                let scores: Vec<f64> = actions
                    .iter()
                    .map(|a| self.score(q.q(key, a), a))
                    .collect();
                argmax_tie_break(&scores, rng).unwrap_or(0)
            }
        };
        *self.times_selected.entry(actions[choice].clone()).or_insert(0) += 1;
        self.total += 1;
        choice
    }

    fn name(&self) -> &'static str {
        "ucb1"
    }
}

/// UCB1 applied per tree state, with an exploration constant.
#[derive(Debug)]
pub struct Uct {
    explore: f64,
    state_counts: HashMap<StateKey, u32>,
    pair_counts: HashMap<(StateKey, Action), u32>,
}

impl Uct {
    pub fn new(explore: f64) -> Self {
        Self {
            explore,
            state_counts: HashMap::new(),
            pair_counts: HashMap::new(),
        }
    }

    fn pair_count(&self, key: &StateKey, action: &Action) -> u32 {
        self.pair_counts
            .get(&(*key, action.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Q(s,a) + 2c * sqrt(2 ln N(s) / N(s,a))
    pub fn score(&self, key: &StateKey, q: f64, action: &Action) -> f64 {
        let n_s = self.state_counts.get(key).copied().unwrap_or(0) as f64;
        let n_sa = self.pair_count(key, action) as f64;
        q + 2.0 * self.explore * (2.0 * n_s.ln() / n_sa).sqrt()
    }
}

impl Strategy for Uct {
    fn select_action(
        &mut self,
        key: &StateKey,
        actions: &[Action],
        q: &QTable,
        rng: &mut fastrand::Rng,
    ) -> usize {
        let choice = match actions.iter().position(|a| self.pair_count(key, a) == 0) {
            Some(untried) => untried,
            None => {
                let scores: Vec<f64> = actions
                    .iter()
                    .map(|a| self.score(key, q.q(key, a), a))
                    .collect();
                argmax_tie_break(&scores, rng).unwrap_or(0)
            }
        };
        *self
            .pair_counts
            .entry((*key, actions[choice].clone()))
            .or_insert(0) += 1;
        *self.state_counts.entry(*key).or_insert(0) += 1;
        choice
    }

    fn name(&self) -> &'static str {
        "uct"
    }
}

/// Boltzmann exploration with temperature `tau`.
#[derive(Debug)]
pub struct Softmax {
    tau: f64,
}

impl Softmax {
    pub fn new(tau: f64) -> Self {
        Self { tau }
    }

    /// Selection probabilities for each action.
    pub fn probabilities(&self, key: &StateKey, actions: &[Action], q: &QTable) -> Vec<f64> {
        let logits: Vec<f64> = actions.iter().map(|a| q.q(key, a) / self.tau).collect();
        // Shifting by the max leaves the distribution unchanged and avoids overflow
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = weights.iter().sum();
        weights.iter().map(|w| w / total).collect()
    }
}

impl Strategy for Softmax {
    fn select_action(
        &mut self,
        key: &StateKey,
        actions: &[Action],
        q: &QTable,
        rng: &mut fastrand::Rng,
    ) -> usize {
        let draw = rng.f64();
        let mut cumulative = 0.0;
        for (i, p) in self.probabilities(key, actions, q).into_iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                return i;
            }
        }
        actions.len() - 1
    }

    fn name(&self) -> &'static str {
        "softmax"
    }
}

/// Uniform exploration with probability epsilon, otherwise greedy on Q.
#[derive(Debug)]
pub struct EpsilonGreedy {
    epsilon: f64,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }
}

impl Strategy for EpsilonGreedy {
    fn select_action(
        &mut self,
        key: &StateKey,
        actions: &[Action],
        q: &QTable,
        rng: &mut fastrand::Rng,
    ) -> usize {
        if rng.f64() < self.epsilon {
            return rng.usize(..actions.len());
        }
        q.arg_max(key, actions, rng).unwrap_or(0)
    }

    fn name(&self) -> &'static str {
        "epsilon_greedy"
    }
}

/// The configured strategy, chosen once per search.
#[derive(Debug)]
pub enum Bandit {
    Ucb1(Ucb1),
    Uct(Uct),
    Softmax(Softmax),
    EpsilonGreedy(EpsilonGreedy),
}

impl Bandit {
    pub fn from_config(config: &BanditConfig) -> Self {
        match *config {
            BanditConfig::Ucb1 => Bandit::Ucb1(Ucb1::new()),
            BanditConfig::Uct { explore } => Bandit::Uct(Uct::new(explore)),
            BanditConfig::Softmax { tau } => Bandit::Softmax(Softmax::new(tau)),
            BanditConfig::EpsilonGreedy { epsilon } => {
                Bandit::EpsilonGreedy(EpsilonGreedy::new(epsilon))
            }
        }
    }
}

impl Strategy for Bandit {
    fn select_action(
        &mut self,
        key: &StateKey,
        actions: &[Action],
        q: &QTable,
        rng: &mut fastrand::Rng,
    ) -> usize {
        match self {
            Bandit::Ucb1(s) => s.select_action(key, actions, q, rng),
            Bandit::Uct(s) => s.select_action(key, actions, q, rng),
            Bandit::Softmax(s) => s.select_action(key, actions, q, rng),
            Bandit::EpsilonGreedy(s) => s.select_action(key, actions, q, rng),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Bandit::Ucb1(s) => s.name(),
            Bandit::Uct(s) => s.name(),
            Bandit::Softmax(s) => s.name(),
            Bandit::EpsilonGreedy(s) => s.name(),
        }
    }
}
