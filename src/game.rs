//! Match runner, history records and deterministic replay.
//!
//! A match alternates the two agents from a fresh opening until one side has
//! borne off. An agent whose action is not legal, that fails, or that overruns
//! its thinking time gets a warning and a random legal action is played for
//! it instead; the warning limit forfeits the match.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::Agent;
use crate::config::MatchConfig;
use crate::error::{GameError, Result};
use crate::movegen::legal_actions;
use crate::position::{Action, Position, Side, StateKey};

/// One played turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn: u32,
    pub side: Side,
    /// Roll the action was played with
    pub dice: [u8; 2],
    pub action: Action,
    /// Roll handed to the opponent
    pub next_dice: [u8; 2],
    /// True if the agent's own choice was replaced
    #[serde(default)]
    pub fallback: bool,
}

/// Everything needed to inspect or replay a finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub seed: Option<u64>,
    pub agents: [String; 2],
    pub initial: StateKey,
    pub turns: Vec<TurnRecord>,
    pub winner: Option<Side>,
    pub forfeit: Option<Side>,
    pub warnings: [u32; 2],
}

impl MatchRecord {
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize match")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Every position of the match, starting with the opening.
    pub fn replay(&self) -> Result<Vec<Position>> {
        replay(&self.initial, &self.turns)
    }
}

/// Rebuild the positions of a recorded match from its opening.
///
/// Each recorded action must be legal for the reconstructed position and
/// roll; recorded dice are reused rather than re-rolled.
pub fn replay(initial: &StateKey, turns: &[TurnRecord]) -> Result<Vec<Position>> {
    let mut pos = Position::from_key(initial)?;
    let mut positions = Vec::with_capacity(turns.len() + 1);
    for record in turns {
        if pos.side_to_move() != record.side || pos.dice() != record.dice {
            return Err(GameError::InvariantViolation(format!(
                "turn {} expected side {} with {:?}, history says side {} with {:?}",
                record.turn,
                pos.side_to_move(),
                pos.dice(),
                record.side,
                record.dice
            )));
        }
        let next = pos.apply_with_dice(&record.action, record.next_dice)?;
        positions.push(pos);
        pos = next;
    }
    positions.push(pos);
    Ok(positions)
}

/// Wall-clock allowance for a turn; the buffer only shortens the agent's own budget.
fn time_allowed(config: &MatchConfig, turns_taken: u32) -> Duration {
    Duration::from_secs_f64(config.turn_secs(turns_taken).max(0.0))
}

/// Play one match between `agents[0]` (side A) and `agents[1]` (side B).
pub fn play_match(
    agents: &mut [Box<dyn Agent>; 2],
    config: &MatchConfig,
    rng: &mut fastrand::Rng,
) -> Result<MatchRecord> {
    let mut pos = Position::new_game(rng);
    let initial = pos.key();
    let names = [agents[0].name().to_string(), agents[1].name().to_string()];
    info!(a = %names[0], b = %names[1], seed = ?config.seed, "match started");

    let mut turns = Vec::new();
    let mut warnings = [0u32; 2];
    let mut turns_taken = [0u32; 2];
    let mut forfeit = None;
    let mut turn = 0u32;

    while !pos.is_terminal() {
        if config.max_turns.is_some_and(|max| turn >= max) {
            warn!(turn, "turn cap reached, match undecided");
            break;
        }
        let side = pos.side_to_move();
        let i = side.index();
        let actions = legal_actions(&pos);

        let started = Instant::now();
        let chosen = agents[i].select_action(&pos, &actions, rng);
        let elapsed = started.elapsed();

        let rejection = match &chosen {
            Ok(action) if !actions.contains(action) => Some(format!("illegal action {action}")),
            Ok(_) if elapsed > time_allowed(config, turns_taken[i]) => {
                Some(format!("over time ({:.3}s)", elapsed.as_secs_f64()))
            }
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        turns_taken[i] += 1;

        let (action, fallback) = match (chosen, rejection) {
            (Ok(action), None) => (action, false),
            (_, reason) => {
                warnings[i] += 1;
                warn!(
                    %side,
                    agent = %names[i],
                    reason = reason.as_deref().unwrap_or("unknown"),
                    warnings = warnings[i],
                    "action rejected, playing random fallback"
                );
                if warnings[i] >= config.warning_limit {
                    warn!(%side, agent = %names[i], "warning limit reached, forfeit");
                    forfeit = Some(side);
                    break;
                }
                (actions[rng.usize(..actions.len())].clone(), true)
            }
        };

        let next = pos.apply_unchecked(&action, rng)?;
        turns.push(TurnRecord {
            turn,
            side,
            dice: pos.dice(),
            action,
            next_dice: next.dice(),
            fallback,
        });
        pos = next;
        turn += 1;
    }

    let winner = match forfeit {
        Some(side) => Some(side.opponent()),
        None => pos.winner(),
    };
    for agent in agents.iter_mut() {
        agent.observe_end(&pos);
    }
    info!(winner = ?winner, turns = turns.len(), ?warnings, "match finished");

    Ok(MatchRecord {
        seed: config.seed,
        agents: names,
        initial,
        turns,
        winner,
        forfeit,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{RandomAgent, RunningAgent};
    use crate::position::Move;

    /// Always plays the same (usually illegal) move.
    struct Stubborn;

    impl Agent for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        fn select_action(
            &mut self,
            _pos: &Position,
            _actions: &[Action],
            _rng: &mut fastrand::Rng,
        ) -> Result<Action> {
            Ok(Action(vec![Move::new(1, 2, 6)]))
        }
    }

    fn agents(a: Box<dyn Agent>, b: Box<dyn Agent>) -> [Box<dyn Agent>; 2] {
        [a, b]
    }

    #[test]
    fn test_random_match_finishes() {
        let mut rng = fastrand::Rng::with_seed(31);
        let mut players = agents(Box::new(RandomAgent), Box::new(RunningAgent));
        let record = play_match(&mut players, &MatchConfig::default().with_seed(31), &mut rng).unwrap();
        assert!(record.winner.is_some());
        assert_eq!(record.forfeit, None);
        assert_eq!(record.warnings, [0, 0]);
        let last = record.replay().unwrap().pop().unwrap();
        assert_eq!(last.winner(), record.winner);
    }

    #[test]
    fn test_illegal_agent_forfeits() {
        let mut rng = fastrand::Rng::with_seed(32);
        let mut players = agents(Box::new(Stubborn), Box::new(RandomAgent));
        let record = play_match(&mut players, &MatchConfig::default(), &mut rng).unwrap();
        assert_eq!(record.forfeit, Some(Side::A));
        assert_eq!(record.winner, Some(Side::B));
        assert_eq!(record.warnings[0], 3);
        // Two fallbacks were played before the third warning forfeited
        let fallbacks: Vec<_> = record.turns.iter().filter(|t| t.fallback).collect();
        assert_eq!(fallbacks.len(), 2);
        assert!(fallbacks.iter().all(|t| t.side == Side::A));
        record.replay().unwrap();
    }

    #[test]
    fn test_turn_cap() {
        let mut rng = fastrand::Rng::with_seed(33);
        let mut players = agents(Box::new(RandomAgent), Box::new(RandomAgent));
        let config = MatchConfig::default().with_max_turns(4);
        let record = play_match(&mut players, &config, &mut rng).unwrap();
        assert_eq!(record.turns.len(), 4);
        assert_eq!(record.winner, None);
    }

    #[test]
    fn test_replay_rejects_tampered_history() {
        let mut rng = fastrand::Rng::with_seed(34);
        let mut players = agents(Box::new(RandomAgent), Box::new(RandomAgent));
        let config = MatchConfig::default().with_max_turns(6);
        let mut record = play_match(&mut players, &config, &mut rng).unwrap();
        record.turns[2].action = Action(vec![Move::new(1, 2, 6)]);
        assert!(matches!(record.replay(), Err(GameError::IllegalAction(_))));
        record.turns[2].dice = [0, 0];
        assert!(matches!(
            record.replay(),
            Err(GameError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let mut rng = fastrand::Rng::with_seed(35);
        let mut players = agents(Box::new(RandomAgent), Box::new(RandomAgent));
        let config = MatchConfig::default().with_max_turns(10).with_seed(35);
        let record = play_match(&mut players, &config, &mut rng).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.json");
        record.save(&path).unwrap();
        let loaded = MatchRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.replay().unwrap(), record.replay().unwrap());
    }
}
