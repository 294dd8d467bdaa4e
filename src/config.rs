//! Search and match configuration.
//!
//! Every struct derives serde and falls back to [`Default`] for missing keys,
//! so a TOML file only needs the values it changes:
//!
//! ```toml
//! [search]
//! horizon = 5
//! rollout = "pip_greedy"
//!
//! [search.bandit]
//! kind = "softmax"
//! tau = 0.5
//!
//! [game]
//! seed = 42
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::*;

/// Action-selection strategy used inside the search tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BanditConfig {
    Ucb1,
    Uct { explore: f64 },
    Softmax { tau: f64 },
    EpsilonGreedy { epsilon: f64 },
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self::uct()
    }
}

impl BanditConfig {
    pub fn uct() -> Self {
        BanditConfig::Uct {
            explore: DEFAULT_EXPLORE,
        }
    }

    pub fn softmax() -> Self {
        BanditConfig::Softmax { tau: DEFAULT_TAU }
    }

    pub fn epsilon_greedy() -> Self {
        BanditConfig::EpsilonGreedy {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Heuristic used to pick untried actions on expansion and moves in rollouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Random,
    PipGreedy,
}

/// Leaf evaluator applied when a rollout stops at the horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Zero,
    Pip,
    Tabular,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub bandit: BanditConfig,
    /// Maximum plies per rollout
    pub horizon: u32,
    /// Per-ply reward discount
    pub discount: f64,
    pub expansion: PolicyKind,
    pub rollout: PolicyKind,
    pub leaf_value: ValueKind,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bandit: BanditConfig::default(),
            horizon: SIMULATION_DEPTH,
            discount: DISCOUNT_FACTOR,
            expansion: PolicyKind::Random,
            rollout: PolicyKind::Random,
            leaf_value: ValueKind::Zero,
        }
    }
}

impl SearchConfig {
    pub fn with_bandit(mut self, bandit: BanditConfig) -> Self {
        self.bandit = bandit;
        self
    }

    pub fn with_horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_expansion(mut self, policy: PolicyKind) -> Self {
        self.expansion = policy;
        self
    }

    pub fn with_rollout(mut self, policy: PolicyKind) -> Self {
        self.rollout = policy;
        self
    }

    pub fn with_leaf_value(mut self, kind: ValueKind) -> Self {
        self.leaf_value = kind;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Rejected actions allowed before a side forfeits
    pub warning_limit: u32,
    pub first_turn_secs: f64,
    pub turn_secs: f64,
    /// Safety margin subtracted from every turn budget
    pub buffer_secs: f64,
    pub seed: Option<u64>,
    /// Stop the match undecided after this many turns
    pub max_turns: Option<u32>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            warning_limit: WARNING_LIMIT,
            first_turn_secs: FIRST_TURN_TIME,
            turn_secs: SUBSEQUENT_TURN_TIME,
            buffer_secs: BUFFER_TIME,
            seed: None,
            max_turns: None,
        }
    }
}

impl MatchConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    pub fn with_turn_secs(mut self, first: f64, subsequent: f64) -> Self {
        self.first_turn_secs = first;
        self.turn_secs = subsequent;
        self
    }

    pub fn with_buffer_secs(mut self, buffer: f64) -> Self {
        self.buffer_secs = buffer;
        self
    }

    pub fn with_warning_limit(mut self, limit: u32) -> Self {
        self.warning_limit = limit;
        self
    }

    /// Seconds allowed for an agent's `turn`-th decision (0-based).
    pub fn turn_secs(&self, turn: u32) -> f64 {
        if turn == 0 {
            self.first_turn_secs
        } else {
            self.turn_secs
        }
    }

    /// Thinking time for an agent's `turn`-th decision, buffer removed.
    pub fn turn_budget(&self, turn: u32) -> Duration {
        Duration::from_secs_f64((self.turn_secs(turn) - self.buffer_secs).max(0.0))
    }
}

/// Top-level file layout: `[search]` and `[game]` tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub game: MatchConfig,
}

/// Load an [`EngineConfig`] from a TOML file.
pub fn load_from_path(path: &Path) -> anyhow::Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: EngineConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    debug!(path = %path.display(), ?config, "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.horizon, 3);
        assert_eq!(config.bandit, BanditConfig::Uct { explore: 1.0 });
        assert_eq!(config.rollout, PolicyKind::Random);
        assert_eq!(MatchConfig::default().warning_limit, 3);
        assert_eq!(BanditConfig::softmax(), BanditConfig::Softmax { tau: 1.0 });
        assert_eq!(
            BanditConfig::epsilon_greedy(),
            BanditConfig::EpsilonGreedy { epsilon: 0.5 }
        );
    }

    #[test]
    fn test_builder() {
        let config = SearchConfig::default()
            .with_bandit(BanditConfig::Ucb1)
            .with_horizon(7)
            .with_discount(0.5)
            .with_rollout(PolicyKind::PipGreedy);
        assert_eq!(config.bandit, BanditConfig::Ucb1);
        assert_eq!(config.horizon, 7);
        assert_eq!(config.discount, 0.5);
        assert_eq!(config.rollout, PolicyKind::PipGreedy);
        assert_eq!(config.expansion, PolicyKind::Random);
    }

    #[test]
    fn test_turn_budget() {
        let config = MatchConfig::default();
        assert_eq!(config.turn_budget(0), Duration::from_secs_f64(14.75));
        assert_eq!(config.turn_budget(3), Duration::from_secs_f64(0.75));
        assert_eq!(config.turn_secs(0), FIRST_TURN_TIME);
        assert_eq!(config.turn_secs(5), SUBSEQUENT_TURN_TIME);
        let tight = config.with_turn_secs(0.1, 0.1);
        assert_eq!(tight.turn_budget(1), Duration::ZERO);
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [search]
            horizon = 5

            [search.bandit]
            kind = "epsilon_greedy"
            epsilon = 0.2

            [game]
            seed = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.search.horizon, 5);
        assert_eq!(config.search.bandit, BanditConfig::EpsilonGreedy { epsilon: 0.2 });
        assert_eq!(config.search.discount, DISCOUNT_FACTOR);
        assert_eq!(config.game.seed, Some(9));
        assert_eq!(config.game.warning_limit, WARNING_LIMIT);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nrollout = \"pip_greedy\"\nleaf_value = \"pip\"").unwrap();
        let config = load_from_path(file.path()).unwrap();
        assert_eq!(config.search.rollout, PolicyKind::PipGreedy);
        assert_eq!(config.search.leaf_value, ValueKind::Pip);

        assert!(load_from_path(Path::new("/nonexistent/engine.toml")).is_err());
    }
}
