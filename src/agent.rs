//! Players: random, pip-greedy, value-greedy and MCTS.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bandit::argmax_tie_break;
use crate::config::{EngineConfig, MatchConfig, PolicyKind, SearchConfig};
use crate::error::{GameError, Result};
use crate::mcts::Search;
use crate::playout::choose_action;
use crate::position::{Action, Position};
use crate::scoring::immediate_reward;
use crate::value::{self, ValueFunction};

/// Something that picks one of the legal actions for the side to move.
pub trait Agent {
    fn name(&self) -> &str;

    /// Choose an action for `pos`. `actions` is never empty.
    fn select_action(
        &mut self,
        pos: &Position,
        actions: &[Action],
        rng: &mut fastrand::Rng,
    ) -> Result<Action>;

    /// Called once with the final position of a match.
    fn observe_end(&mut self, _final_pos: &Position) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Random,
    Running,
    Greedy,
    Mcts,
}

/// Build an agent of `kind`, taking search and budget settings from `config`.
pub fn build_agent(kind: AgentKind, config: &EngineConfig) -> Box<dyn Agent> {
    match kind {
        AgentKind::Random => Box::new(RandomAgent),
        AgentKind::Running => Box::new(RunningAgent),
        AgentKind::Greedy => Box::new(ValueAgent::new(
            value::from_kind(config.search.leaf_value),
            config.search.discount,
        )),
        AgentKind::Mcts => Box::new(MctsAgent::new(
            config.search.clone(),
            config.game.clone(),
            value::from_kind(config.search.leaf_value),
        )),
    }
}

fn pick(actions: &[Action], index: usize) -> Result<Action> {
    actions
        .get(index)
        .cloned()
        .ok_or_else(|| GameError::InvariantViolation("no legal actions offered".into()))
}

/// Uniformly random legal action.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomAgent;

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    fn select_action(
        &mut self,
        pos: &Position,
        actions: &[Action],
        rng: &mut fastrand::Rng,
    ) -> Result<Action> {
        pick(actions, choose_action(PolicyKind::Random, pos, actions, rng))
    }
}

/// Maximises the pip lead after moving.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningAgent;

impl Agent for RunningAgent {
    fn name(&self) -> &str {
        "running"
    }

    fn select_action(
        &mut self,
        pos: &Position,
        actions: &[Action],
        rng: &mut fastrand::Rng,
    ) -> Result<Action> {
        pick(actions, choose_action(PolicyKind::PipGreedy, pos, actions, rng))
    }
}

/// One-ply greedy play over a value function, evaluated on afterstates.
///
/// Between its own turns the agent feeds the value function TD updates from
/// its previous afterstate to the current one; the match result closes the
/// final update.
pub struct ValueAgent {
    value: Box<dyn ValueFunction>,
    discount: f64,
    last_afterstate: Option<Position>,
}

impl ValueAgent {
    pub fn new(value: Box<dyn ValueFunction>, discount: f64) -> Self {
        Self {
            value,
            discount,
            last_afterstate: None,
        }
    }

    pub fn value_fn(&self) -> &dyn ValueFunction {
        self.value.as_ref()
    }
}

impl Agent for ValueAgent {
    fn name(&self) -> &str {
        "greedy"
    }

    fn select_action(
        &mut self,
        pos: &Position,
        actions: &[Action],
        rng: &mut fastrand::Rng,
    ) -> Result<Action> {
        let side = pos.side_to_move();
        let mut afterstates = Vec::with_capacity(actions.len());
        for action in actions {
            afterstates.push(pos.after_moves(action)?);
        }
        let scores: Vec<f64> = afterstates
            .iter()
            .map(|next| self.value.value(next)[side.index()])
            .collect();
        let choice = argmax_tie_break(&scores, rng).unwrap_or(0);
        let chosen = afterstates.swap_remove(choice);

        if let Some(prev) = self.last_afterstate.take() {
            let reward = immediate_reward(&chosen);
            self.value.update(&prev, &chosen, reward, self.discount, side);
        }
        self.last_afterstate = Some(chosen);
        pick(actions, choice)
    }

    fn observe_end(&mut self, final_pos: &Position) {
        if let Some(prev) = self.last_afterstate.take() {
            let side = prev.side_to_move();
            let reward = immediate_reward(final_pos);
            self.value
                .update(&prev, final_pos, reward, self.discount, side);
        }
    }
}

/// Runs a fresh search every turn within the match's time budget.
pub struct MctsAgent {
    search: SearchConfig,
    budget: MatchConfig,
    value: Box<dyn ValueFunction>,
    turn: u32,
}

impl MctsAgent {
    pub fn new(search: SearchConfig, budget: MatchConfig, value: Box<dyn ValueFunction>) -> Self {
        Self {
            search,
            budget,
            value,
            turn: 0,
        }
    }
}

impl Agent for MctsAgent {
    fn name(&self) -> &str {
        "mcts"
    }

    fn select_action(
        &mut self,
        pos: &Position,
        actions: &[Action],
        rng: &mut fastrand::Rng,
    ) -> Result<Action> {
        // Forced moves need no search
        if actions.len() == 1 {
            self.turn += 1;
            return pick(actions, 0);
        }
        let deadline = Instant::now() + self.budget.turn_budget(self.turn);
        let result = Search::new(pos, &self.search, self.value.as_ref()).run(deadline, rng)?;
        debug!(
            turn = self.turn,
            iterations = result.iterations,
            nodes = result.nodes,
            "mcts decision"
        );
        self.turn += 1;
        Ok(result.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_POINTS;
    use crate::movegen::legal_actions;
    use crate::position::Side;
    use crate::value::{PipValue, TabularValue};

    fn blot_position() -> Position {
        let mut points = [0i8; NUM_POINTS];
        points[1] = 14;
        points[5] = 1;
        points[8] = -1;
        points[24] = -14;
        Position::from_parts(points, [0, 0], [3, 1], Side::A).unwrap()
    }

    #[test]
    fn test_every_agent_returns_legal_action() {
        let pos = Position::starting([5, 2]).unwrap();
        let actions = legal_actions(&pos);
        let config = EngineConfig {
            game: MatchConfig::default().with_turn_secs(0.05, 0.05).with_buffer_secs(0.0),
            ..EngineConfig::default()
        };
        let mut rng = fastrand::Rng::with_seed(21);
        for kind in [
            AgentKind::Random,
            AgentKind::Running,
            AgentKind::Greedy,
            AgentKind::Mcts,
        ] {
            let mut agent = build_agent(kind, &config);
            let action = agent.select_action(&pos, &actions, &mut rng).unwrap();
            assert!(actions.contains(&action), "{} played {action}", agent.name());
        }
    }

    #[test]
    fn test_pip_greedy_agent_hits() {
        let pos = blot_position();
        let actions = legal_actions(&pos);
        let mut rng = fastrand::Rng::with_seed(22);
        let mut agent = ValueAgent::new(Box::new(PipValue), 0.9);
        let action = agent.select_action(&pos, &actions, &mut rng).unwrap();
        assert_eq!(pos.after_moves(&action).unwrap().on_bar(Side::B), 1);

        let action = RunningAgent.select_action(&pos, &actions, &mut rng).unwrap();
        assert_eq!(pos.after_moves(&action).unwrap().on_bar(Side::B), 1);
    }

    #[test]
    fn test_value_agent_learns_from_result() {
        let mut points = [0i8; NUM_POINTS];
        points[24] = 1;
        points[25] = 14;
        points[3] = -15;
        let pos = Position::from_parts(points, [0, 0], [1, 2], Side::A).unwrap();
        let actions = legal_actions(&pos);
        let mut rng = fastrand::Rng::with_seed(23);
        let mut agent = ValueAgent::new(Box::new(TabularValue::new(0.5)), 0.9);
        let action = agent.select_action(&pos, &actions, &mut rng).unwrap();
        let done = pos.apply(&action, &mut rng).unwrap();
        agent.observe_end(&done);
        let afterstate = pos.after_moves(&action).unwrap();
        assert_eq!(agent.value_fn().value(&afterstate)[0], 0.5);
    }
}
