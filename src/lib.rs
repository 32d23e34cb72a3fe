//! # Transposition-aware Monte Carlo Tree Search
//!
//! A rollout-based planner for deterministic, perfect-information two-player
//! games whose state space is too large to enumerate.
//!
//! ## Components
//! - [`graph::SearchGraph`]: flat node/edge stores keyed by canonical state,
//!   so transpositions share one node and cycles are plain back-edges
//! - [`planner::Mcts`]: select → expand → simulate → backpropagate over the
//!   graph, sequentially or on a thread pool
//! - [`policy`]: the UCB1 tree policy and the final-move criteria
//! - [`GameModel`]: the capability set a game must provide
//!
//! ## Usage
//! ```rust
//! use mcts::games::nim::{NimModel, NimRule};
//! use mcts::{BestActionCriterion, Mcts, SearchConfig};
//!
//! let model = NimModel::new(2, NimRule::Normal);
//! let config = SearchConfig::default().with_iterations(2000).with_exploration(1.4);
//! let mut search = Mcts::new(model, NimModel::start(5), config).unwrap();
//! search.search().unwrap();
//! let action = search.best_action(BestActionCriterion::MostVisited).unwrap();
//! assert_eq!(action.0, 2);
//! ```

pub mod config;
pub mod error;
pub mod games;
pub mod graph;
pub mod planner;
pub mod policy;

pub use config::{Budget, SearchConfig};
pub use error::{ConfigError, GraphError, ModelError, SearchError};
pub use graph::{EdgeId, NodeId, SearchGraph, StatTarget, StatsSnapshot};
pub use planner::{run_search, ChildStats, Mcts, SearchStatistics, StopReason, VertexData};
pub use policy::{BestActionCriterion, TreePolicy, Ucb1};

use rand::seq::IndexedRandom;
use rand::Rng;
use std::fmt::Debug;
use std::hash::Hash;

/// The rules of a game, as seen by the planner.
/// `Send` and `Sync` are required for parallel search.
pub trait GameModel: Send + Sync {
    /// A complete game position. Cloned into every node and playout.
    type State: Clone + Send + Sync;
    /// A move in the game.
    type Action: Clone + Eq + Hash + Debug + Send + Sync;
    /// Canonical encoding of a state; equal keys are merged into one node.
    type Key: Clone + Eq + Hash + Debug + Send + Sync;
    /// Player identity. Utilities are zero-sum between two players.
    type Player: Copy + Eq + Debug + Send + Sync;

    /// Returns the canonical transposition key of `state`.
    fn canonical_state_key(&self, state: &Self::State) -> Self::Key;

    /// Returns all legal moves in a stable order. Empty for terminal states.
    fn legal_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Returns the state reached by playing `action` in `state`.
    ///
    /// Implementations should reject illegal actions, including any action on
    /// a terminal state, with [`ModelError::IllegalAction`].
    fn apply_action(&self, state: &Self::State, action: &Self::Action) -> Result<Self::State, ModelError>;

    /// Returns true if the game is over.
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Returns the player whose turn it is to move.
    fn player_to_move(&self, state: &Self::State) -> Self::Player;

    /// Final outcome of a terminal `state` for `perspective`. Positive is
    /// good for `perspective`; the opponent receives the negation.
    ///
    /// Utilities must be finite and bounded, conventionally within
    /// `[-1, 1]`. Node and edge values are sums over every visit; a sum that
    /// overflows to infinity is reported as [`SearchError::Invariant`] and
    /// poisons the search handle. A single non-finite utility counts as a
    /// model error and scores 0.
    fn terminal_utility(&self, state: &Self::State, perspective: Self::Player) -> f64;

    /// Picks the next move of a playout. Uniformly random by default.
    ///
    /// Returns `None` when `state` has no legal action.
    fn default_policy<R: Rng>(&self, state: &Self::State, rng: &mut R) -> Option<Self::Action> {
        self.legal_actions(state).choose(rng).cloned()
    }
}
