//! Multi-agent Monte Carlo Tree Search over backgammon positions.
//!
//! Each iteration runs four phases:
//! - select: descend fully expanded nodes, choosing actions with the bandit
//! - expand: try one untried action at the first node that has any
//! - simulate: discounted rollout from the new node
//! - backpropagate: sample-mean update of Q(s,a) for the acting side at
//!   every ancestor, adding each ancestor's stored reward on the way up
//!
//! Playing an action re-rolls the dice, so one action can lead to several
//! outcome nodes. Outcomes are grouped under the action that produced them
//! and a freshly rolled state equal to an existing outcome reuses that node.
//! Transpositions reached through different actions stay separate nodes.
//!
//! The tree lives in an arena indexed by [`NodeId`] and is discarded when the
//! decision is made.

use std::time::Instant;

use tracing::{debug, trace};

use crate::bandit::{Bandit, QTable, Strategy};
use crate::config::SearchConfig;
use crate::error::{GameError, Result};
use crate::movegen::legal_actions;
use crate::playout::{choose_action, rollout};
use crate::position::{Action, Position, Side};
use crate::scoring::immediate_reward;
use crate::value::ValueFunction;

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in the search tree.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub position: Position,
    pub parent: Option<NodeId>,
    /// Action played at the parent to reach this node
    pub action: Option<Action>,
    /// Immediate reward per side for arriving here
    pub reward: [f64; 2],
    /// Legal actions of the side to move, in generation order
    pub actions: Vec<Action>,
    /// Outcome nodes per tried action
    pub children: Vec<(Action, Vec<NodeId>)>,
}

impl SearchNode {
    fn new(position: Position, parent: Option<NodeId>, action: Option<Action>) -> Self {
        let reward = immediate_reward(&position);
        let actions = legal_actions(&position);
        Self {
            position,
            parent,
            action,
            reward,
            actions,
            children: Vec::new(),
        }
    }

    /// The side acting at this node.
    #[inline]
    pub fn side(&self) -> Side {
        self.position.side_to_move()
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.position.is_terminal()
    }

    pub fn is_fully_expanded(&self) -> bool {
        self.children.len() == self.actions.len()
    }

    pub fn outcomes(&self, action: &Action) -> Option<&[NodeId]> {
        self.children
            .iter()
            .find(|(a, _)| a == action)
            .map(|(_, ids)| ids.as_slice())
    }

    fn untried(&self) -> Vec<Action> {
        self.actions
            .iter()
            .filter(|a| self.outcomes(a).is_none())
            .cloned()
            .collect()
    }
}

/// Arena of search nodes; the root is always [`NodeId::ROOT`].
#[derive(Debug)]
pub struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    pub fn new(root: Position) -> Self {
        Self {
            nodes: vec![SearchNode::new(root, None, None)],
        }
    }

    #[inline]
    pub fn root(&self) -> &SearchNode {
        &self.nodes[NodeId::ROOT.index()]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id.index()]
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id.index()]
    }

    fn allocate(&mut self, node: SearchNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges from the root to `id`.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.get(id).parent;
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.get(parent).parent;
        }
        depth
    }
}

/// Outcome of a finished search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub action: Action,
    pub iterations: u64,
    pub nodes: usize,
}

/// One decision's worth of search state.
pub struct Search<'a> {
    tree: SearchTree,
    config: SearchConfig,
    bandit: Bandit,
    q: QTable,
    value_fn: &'a dyn ValueFunction,
}

impl<'a> Search<'a> {
    /// Start a search rooted at a private copy of `root`.
    pub fn new(root: &Position, config: &SearchConfig, value_fn: &'a dyn ValueFunction) -> Self {
        Self {
            tree: SearchTree::new(root.clone()),
            config: config.clone(),
            bandit: Bandit::from_config(&config.bandit),
            q: QTable::new(),
            value_fn,
        }
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    pub fn q_table(&self) -> &QTable {
        &self.q
    }

    /// Descend from the root while nodes are fully expanded and not terminal.
    pub fn select(&mut self, rng: &mut fastrand::Rng) -> Result<NodeId> {
        let mut id = NodeId::ROOT;
        loop {
            let node = self.tree.get(id);
            if node.is_terminal() || !node.is_fully_expanded() {
                return Ok(id);
            }
            let key = node.position.key();
            let choice = self.bandit.select_action(&key, &node.actions, &self.q, rng);
            let action = node.actions[choice].clone();
            id = self.outcome_child(id, &action, rng)?;
        }
    }

    /// Try one untried action at `id`. Terminal nodes are returned unchanged.
    pub fn expand(&mut self, id: NodeId, rng: &mut fastrand::Rng) -> Result<NodeId> {
        let node = self.tree.get(id);
        if node.is_terminal() {
            return Ok(id);
        }
        let untried = node.untried();
        if untried.is_empty() {
            return Ok(id);
        }
        let choice = choose_action(self.config.expansion, &node.position, &untried, rng);
        self.outcome_child(id, &untried[choice], rng)
    }

    /// Play `action` at `id` with a fresh roll and return the matching outcome node,
    /// creating it if this roll has not been seen under that action.
    pub fn outcome_child(
        &mut self,
        id: NodeId,
        action: &Action,
        rng: &mut fastrand::Rng,
    ) -> Result<NodeId> {
        let next = self.tree.get(id).position.apply_unchecked(action, rng)?;
        if let Some(existing) = self.tree.get(id).outcomes(action).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|&child| self.tree.get(child).position == next)
        }) {
            return Ok(existing);
        }

        let child = self
            .tree
            .allocate(SearchNode::new(next, Some(id), Some(action.clone())));
        let parent = self.tree.get_mut(id);
        match parent.children.iter_mut().find(|(a, _)| a == action) {
            Some((_, ids)) => ids.push(child),
            None => parent.children.push((action.clone(), vec![child])),
        }
        Ok(child)
    }

    /// Stored reward of `id` plus a discounted rollout from its position.
    pub fn simulate(&self, id: NodeId, rng: &mut fastrand::Rng) -> Result<[f64; 2]> {
        let node = self.tree.get(id);
        let tail = rollout(
            &node.position,
            self.config.rollout,
            self.config.horizon,
            self.config.discount,
            self.value_fn,
            rng,
        )?;
        Ok([node.reward[0] + tail[0], node.reward[1] + tail[1]])
    }

    /// Push `reward` from `child` up to the root.
    ///
    /// At each ancestor, Q(s,a) for the action leading down moves towards the
    /// acting side's component, then the ancestor's own reward is added.
    pub fn backpropagate(&mut self, child: NodeId, reward: [f64; 2]) -> Result<()> {
        let mut child = child;
        let mut reward = reward;
        while let Some(parent) = self.tree.get(child).parent {
            let action = self.tree.get(child).action.clone().ok_or_else(|| {
                GameError::InvariantViolation(format!("node {} has no action", child.0))
            })?;
            let node = self.tree.get(parent);
            if !node.outcomes(&action).is_some_and(|ids| ids.contains(&child)) {
                return Err(GameError::InvariantViolation(format!(
                    "node {} is not an outcome of {action} at node {}",
                    child.0, parent.0
                )));
            }
            let key = node.position.key();
            let side = node.side();
            self.q.update(&key, &action, reward[side.index()]);
            reward = [reward[0] + node.reward[0], reward[1] + node.reward[1]];
            child = parent;
        }
        Ok(())
    }

    /// One select / expand / simulate / backpropagate cycle.
    pub fn iterate(&mut self, rng: &mut fastrand::Rng) -> Result<()> {
        let leaf = self.select(rng)?;
        let child = self.expand(leaf, rng)?;
        let reward = self.simulate(child, rng)?;
        trace!(
            leaf = leaf.0,
            child = child.0,
            depth = self.tree.depth(child),
            ?reward,
            "iteration"
        );
        self.backpropagate(child, reward)
    }

    /// Iterate until `deadline`, then pick the root action with the best Q.
    ///
    /// The clock is checked before every iteration, so a deadline already in
    /// the past still yields a legal action.
    pub fn run(&mut self, deadline: Instant, rng: &mut fastrand::Rng) -> Result<SearchResult> {
        let mut iterations = 0u64;
        while Instant::now() < deadline {
            self.iterate(rng)?;
            iterations += 1;
        }
        let action = self.best_action(rng);
        debug!(
            iterations,
            nodes = self.tree.len(),
            bandit = self.bandit.name(),
            leaf_value = self.value_fn.name(),
            %action,
            "search finished"
        );
        Ok(SearchResult {
            action,
            iterations,
            nodes: self.tree.len(),
        })
    }

    /// argmax over the root's legal actions of Q(root, a), ties at random.
    pub fn best_action(&self, rng: &mut fastrand::Rng) -> Action {
        let root = self.tree.root();
        let key = root.position.key();
        self.q
            .arg_max(&key, &root.actions, rng)
            .and_then(|i| root.actions.get(i).cloned())
            .unwrap_or_else(Action::pass)
    }
}

/// Search from `initial` until `deadline` and return the chosen action.
pub fn run_search(
    initial: &Position,
    deadline: Instant,
    config: &SearchConfig,
    value_fn: &dyn ValueFunction,
    rng: &mut fastrand::Rng,
) -> Result<Action> {
    Ok(Search::new(initial, config, value_fn).run(deadline, rng)?.action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BanditConfig;
    use crate::constants::NUM_POINTS;
    use crate::movegen::is_legal;
    use crate::position::Move;
    use crate::value::ZeroValue;

    fn bear_off_race() -> Position {
        // 19/25 24/25 wins now; 19/20 20/25 leaves a checker behind
        let mut points = [0i8; NUM_POINTS];
        points[19] = 1;
        points[24] = 1;
        points[25] = 13;
        points[3] = -15;
        Position::from_parts(points, [0, 0], [6, 1], Side::A).unwrap()
    }

    #[test]
    fn test_select_stops_at_unexpanded_root() {
        let pos = Position::starting([3, 5]).unwrap();
        let mut search = Search::new(&pos, &SearchConfig::default(), &ZeroValue);
        let mut rng = fastrand::Rng::with_seed(1);
        assert_eq!(search.select(&mut rng).unwrap(), NodeId::ROOT);
    }

    #[test]
    fn test_expand_records_provenance() {
        let pos = Position::starting([3, 5]).unwrap();
        let mut search = Search::new(&pos, &SearchConfig::default(), &ZeroValue);
        let mut rng = fastrand::Rng::with_seed(2);
        let child = search.expand(NodeId::ROOT, &mut rng).unwrap();
        let node = search.tree().get(child);
        assert_eq!(node.parent, Some(NodeId::ROOT));
        assert_eq!(node.side(), Side::B);
        let action = node.action.clone().unwrap();
        assert!(is_legal(&pos, &action));
        assert_eq!(
            search.tree().root().outcomes(&action),
            Some(&[child][..])
        );
    }

    #[test]
    fn test_equal_outcome_reuses_node() {
        let pos = Position::starting([3, 5]).unwrap();
        let mut search = Search::new(&pos, &SearchConfig::default(), &ZeroValue);
        let action = Action(vec![Move::new(1, 4, 3), Move::new(4, 9, 5)]);
        let first = search
            .outcome_child(NodeId::ROOT, &action, &mut fastrand::Rng::with_seed(3))
            .unwrap();
        let again = search
            .outcome_child(NodeId::ROOT, &action, &mut fastrand::Rng::with_seed(3))
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(search.tree().len(), 2);
    }

    #[test]
    fn test_backpropagate_updates_q() {
        let pos = bear_off_race();
        let mut search = Search::new(&pos, &SearchConfig::default(), &ZeroValue);
        let mut rng = fastrand::Rng::with_seed(4);
        let win = Action(vec![Move::new(19, 25, 6), Move::new(24, 25, 1)]);
        let child = search.outcome_child(NodeId::ROOT, &win, &mut rng).unwrap();
        let reward = search.simulate(child, &mut rng).unwrap();
        assert_eq!(reward, [1.0, -1.0]);
        search.backpropagate(child, reward).unwrap();
        let key = pos.key();
        assert_eq!(search.q_table().q(&key, &win), 1.0);
        assert_eq!(search.q_table().action_visits(&key, &win), 1);
    }

    #[test]
    fn test_backpropagate_rejects_unlinked_child() {
        let pos = Position::starting([3, 5]).unwrap();
        let mut search = Search::new(&pos, &SearchConfig::default(), &ZeroValue);
        let next = pos
            .apply_with_dice(&Action(vec![Move::new(1, 4, 3), Move::new(4, 9, 5)]), [1, 2])
            .unwrap();
        let orphan = search.tree.allocate(SearchNode::new(
            next,
            Some(NodeId::ROOT),
            Some(Action::pass()),
        ));
        let err = search.backpropagate(orphan, [0.0, 0.0]).unwrap_err();
        assert!(matches!(err, GameError::InvariantViolation(_)));
    }

    #[test]
    fn test_search_finds_bear_off_win() {
        let pos = bear_off_race();
        assert_eq!(legal_actions(&pos).len(), 3);
        for bandit in [
            BanditConfig::Ucb1,
            BanditConfig::Uct { explore: 1.0 },
            BanditConfig::EpsilonGreedy { epsilon: 0.2 },
        ] {
            let config = SearchConfig::default().with_bandit(bandit);
            let mut search = Search::new(&pos, &config, &ZeroValue);
            let mut rng = fastrand::Rng::with_seed(5);
            for _ in 0..50 {
                search.iterate(&mut rng).unwrap();
            }
            let best = search.best_action(&mut rng);
            assert_eq!(pos.after_moves(&best).unwrap().winner(), Some(Side::A));
        }
    }

    #[test]
    fn test_tree_grows_and_stays_consistent() {
        let pos = Position::starting([4, 2]).unwrap();
        let mut search = Search::new(&pos, &SearchConfig::default(), &ZeroValue);
        let mut rng = fastrand::Rng::with_seed(6);
        for _ in 0..200 {
            search.iterate(&mut rng).unwrap();
        }
        let tree = search.tree();
        assert!(tree.len() > 1);
        for i in 1..tree.len() {
            let id = NodeId(i as u32);
            let node = tree.get(id);
            let parent = tree.get(node.parent.unwrap());
            let action = node.action.as_ref().unwrap();
            assert!(parent.outcomes(action).unwrap().contains(&id));
            assert_eq!(node.side(), parent.side().opponent());
            node.position.validate().unwrap();
        }
    }

    #[test]
    fn test_past_deadline_returns_legal_action() {
        let pos = Position::starting([6, 6]).unwrap();
        let mut rng = fastrand::Rng::with_seed(7);
        let mut search = Search::new(&pos, &SearchConfig::default(), &ZeroValue);
        let result = search.run(Instant::now(), &mut rng).unwrap();
        assert_eq!(result.iterations, 0);
        assert!(is_legal(&pos, &result.action));
    }
}
