//! Gammon-MCTS: a backgammon engine with multi-agent Monte Carlo Tree Search.
//!
//! The crate enumerates every maximal legal move sequence for a roll, applies
//! sequences to produce successor positions, and searches the game tree under
//! a wall-clock budget with pluggable bandit strategies.
//!
//! ## Modules
//!
//! - [`constants`] - Board geometry and engine defaults
//! - [`error`] - Engine error type
//! - [`position`] - Board state, moves and the transition function
//! - [`movegen`] - Legal move-sequence generation
//! - [`scoring`] - Pip counts and terminal rewards
//! - [`bandit`] - UCB1, UCT, Softmax and epsilon-greedy action selection
//! - [`value`] - State-value estimators
//! - [`playout`] - Rollout policies and discounted playouts
//! - [`mcts`] - The search tree and search loop
//! - [`config`] - Search and match settings, TOML loading
//! - [`agent`] - Players
//! - [`game`] - Match runner, history and replay
//!
//! ## Example
//!
//! ```
//! use std::time::{Duration, Instant};
//!
//! use gammon_mcts::config::SearchConfig;
//! use gammon_mcts::mcts::run_search;
//! use gammon_mcts::movegen::legal_actions;
//! use gammon_mcts::position::Position;
//! use gammon_mcts::value::ZeroValue;
//!
//! let pos = Position::starting([3, 5]).unwrap();
//! let actions = legal_actions(&pos);
//!
//! let mut rng = fastrand::Rng::with_seed(1);
//! let deadline = Instant::now() + Duration::from_millis(50);
//! let action = run_search(&pos, deadline, &SearchConfig::default(), &ZeroValue, &mut rng).unwrap();
//! assert!(actions.contains(&action));
//! println!("Best play: {action}");
//! ```

pub mod agent;
pub mod bandit;
pub mod config;
pub mod constants;
pub mod error;
pub mod game;
pub mod mcts;
pub mod movegen;
pub mod playout;
pub mod position;
pub mod scoring;
pub mod value;
