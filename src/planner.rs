//! # MCTS Planner
//!
//! Drives repeated select → expand → simulate → backpropagate iterations over
//! a [`SearchGraph`], delegating game rules to a [`GameModel`].
//!
//! ## Iteration protocol
//! 1. **Select**: from the root, follow the [`TreePolicy`] choice among child
//!    edges whose target is not already on the path. Stop at a terminal node,
//!    at a node whose children are not materialized yet, or when every child
//!    would close a cycle.
//! 2. **Expand**: materialize all children of the frontier through the model.
//!    Transpositions reuse existing nodes.
//! 3. **Simulate**: play the model's default policy from the first freshly
//!    created child (or the frontier itself) to a terminal state.
//! 4. **Backpropagate**: walk the path in reverse, recording one visit on every
//!    node and edge. Node values are seen by the player to move at the node,
//!    edge values by the player who chose the edge.
//!
//! An iteration always runs to completion; budgets and the error-rate guard
//! are checked only between iterations, so the graph never holds half an
//! iteration.
//!
//! ## Threads
//! With `threads > 1` iterations run on a rayon pool. The graph sits behind a
//! `RwLock`: selection and backpropagation share the read lock (statistics
//! are atomic), expansion takes the write lock and re-checks the published
//! "children materialized" flag first.

use crate::config::{Budget, SearchConfig};
use crate::error::{ConfigError, GraphError, ModelError, SearchError};
use crate::graph::{EdgeId, GraphTables, NodeId, SearchGraph, StatTarget, StatsSnapshot};
use crate::policy::{best_child, ucb1, BestActionCriterion, TreePolicy, Ucb1};
use crate::GameModel;
use log::{debug, error, trace, warn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Vertex payload the planner attaches to every node.
#[derive(Debug, Clone)]
pub struct VertexData<S, P> {
    pub state: S,
    pub player: P,
    pub terminal: bool,
}

/// The graph type a planner for model `M` works on.
pub type PlannerGraph<M> = SearchGraph<
    <M as GameModel>::Key,
    <M as GameModel>::Action,
    VertexData<<M as GameModel>::State, <M as GameModel>::Player>,
    (),
>;

/// Why a search call returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    IterationBudget,
    TimeBudget,
}

/// Summary of one `search` call.
#[derive(Debug, Clone)]
pub struct SearchStatistics {
    /// Iterations completed by this call
    pub iterations: u64,
    /// Visits of the root node, across all searches since it became root
    pub root_visits: u64,
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Iterations that absorbed a model anomaly
    pub model_errors: u64,
    pub elapsed: Duration,
    pub stop: StopReason,
}

/// Statistics of one child of the root, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildStats<A> {
    pub action: A,
    pub visits: u64,
    pub average: Option<f64>,
    /// UCB1 score under the configured exploration constant; infinite while
    /// the child is unvisited.
    pub ucb: f64,
}

enum Frontier {
    Terminal,
    Unexpanded,
    /// Every child leads back onto the active path.
    Exhausted,
}

struct Selection {
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
    frontier: Frontier,
}

enum Expansion {
    Expanded { fresh: Option<EdgeId> },
    /// Another worker expanded the node first.
    AlreadyExpanded,
    DeadEnd,
}

/// Counters shared by the workers of one search call.
#[derive(Default)]
struct SearchControl {
    claimed: AtomicU64,
    completed: AtomicU64,
    model_errors: AtomicU64,
    stop: AtomicBool,
    abort: Mutex<Option<SearchError>>,
}

/// The search handle: a graph rooted at the current position plus everything
/// needed to keep searching it.
pub struct Mcts<M: GameModel, P: TreePolicy = Ucb1> {
    model: M,
    policy: P,
    config: SearchConfig,
    graph: RwLock<PlannerGraph<M>>,
    root: NodeId,
    /// The rayon thread pool for parallel search, if more than one thread.
    pool: Option<ThreadPool>,
    /// Iterations completed since the root was set.
    iterations: u64,
    poisoned: bool,
}

/// Runs one search from `root_state` and returns the handle for queries.
pub fn run_search<M: GameModel>(
    model: M,
    root_state: M::State,
    budget: Budget,
    exploration: f64,
) -> Result<Mcts<M>, SearchError> {
    let config = SearchConfig::default()
        .with_budget(budget)
        .with_exploration(exploration);
    let mut search = Mcts::new(model, root_state, config)?;
    search.search()?;
    Ok(search)
}

fn vertex<M: GameModel>(model: &M, state: M::State) -> VertexData<M::State, M::Player> {
    VertexData {
        player: model.player_to_move(&state),
        terminal: model.is_terminal(&state),
        state,
    }
}

fn iteration_rng(seed: u64, index: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

impl<M: GameModel> Mcts<M, Ucb1> {
    /// Creates a planner using UCB1 with the configured exploration constant.
    pub fn new(model: M, root_state: M::State, config: SearchConfig) -> Result<Self, SearchError> {
        let policy = Ucb1::new(config.exploration).with_random_ties(config.random_tie_break);
        Self::with_policy(model, root_state, config, policy)
    }
}

impl<M: GameModel, P: TreePolicy> Mcts<M, P> {
    /// Creates a planner with a custom tree policy.
    ///
    /// # Errors
    /// [`SearchError::Config`] if `config` does not validate or the thread
    /// pool cannot be built.
    pub fn with_policy(
        model: M,
        root_state: M::State,
        config: SearchConfig,
        policy: P,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        let pool = if config.threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build()
                .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        let mut graph = SearchGraph::new();
        let key = model.canonical_state_key(&root_state);
        let root = graph.get_or_create_node(key, || vertex(&model, root_state));

        Ok(Mcts {
            model,
            policy,
            config,
            graph: RwLock::new(graph),
            root,
            pool,
            iterations: 0,
            poisoned: false,
        })
    }

    /// Runs iterations until the configured budget is spent.
    ///
    /// On [`SearchError::ModelErrorRate`] the statistics gathered so far stay
    /// valid and the handle remains usable. On [`SearchError::Invariant`] the
    /// handle is poisoned.
    pub fn search(&mut self) -> Result<SearchStatistics, SearchError> {
        self.check_poisoned()?;
        let start = Instant::now();
        let deadline = self.config.budget.time_limit().map(|t| start + t);
        let limit = self.config.budget.iteration_limit();
        let control = SearchControl::default();

        {
            let this = &*self;
            match &this.pool {
                Some(pool) => {
                    let workers = pool.current_num_threads();
                    pool.scope(|s| {
                        for _ in 0..workers {
                            s.spawn(|_| this.run_worker(&control, limit, deadline));
                        }
                    });
                }
                None => this.run_worker(&control, limit, deadline),
            }
        }

        let completed = control.completed.load(Ordering::Acquire);
        let model_errors = control.model_errors.load(Ordering::Acquire);
        self.iterations += completed;

        if let Some(abort) = control.abort.into_inner() {
            if matches!(abort, SearchError::Invariant(_)) {
                self.poisoned = true;
            }
            return Err(abort);
        }
        let check = self.graph.read().check_invariants();
        if let Err(e) = check {
            error!("search: graph invariant violated: {}", e);
            self.poisoned = true;
            return Err(SearchError::Invariant(e));
        }

        let graph = self.graph.read();
        let stats = SearchStatistics {
            iterations: completed,
            root_visits: graph.stats(self.root).map(|s| s.visits).unwrap_or(0),
            total_nodes: graph.node_count(),
            total_edges: graph.edge_count(),
            model_errors,
            elapsed: start.elapsed(),
            stop: match limit {
                Some(limit) if completed >= limit => StopReason::IterationBudget,
                _ => StopReason::TimeBudget,
            },
        };
        debug!(
            "search: {} iterations in {:?} ({} nodes, {} edges, {} model errors)",
            stats.iterations, stats.elapsed, stats.total_nodes, stats.total_edges, stats.model_errors
        );
        Ok(stats)
    }

    /// Claims and runs iterations until a stop condition holds.
    fn run_worker(&self, control: &SearchControl, limit: Option<u64>, deadline: Option<Instant>) {
        loop {
            if control.stop.load(Ordering::Acquire) {
                break;
            }
            if deadline.map_or(false, |d| Instant::now() >= d) {
                break;
            }
            let index = control.claimed.fetch_add(1, Ordering::AcqRel);
            if limit.map_or(false, |l| index >= l) {
                break;
            }

            let mut rng = iteration_rng(self.config.seed, self.iterations + index);
            match self.iterate(&mut rng) {
                Ok(anomaly) => {
                    let completed = control.completed.fetch_add(1, Ordering::AcqRel) + 1;
                    let Some(anomaly) = anomaly else { continue };
                    let errors = control.model_errors.fetch_add(1, Ordering::AcqRel) + 1;
                    if completed >= self.config.min_iterations_for_error_rate
                        && errors as f64 / completed as f64 > self.config.max_model_error_rate
                    {
                        error!(
                            "search: aborting after model errors in {} of {} iterations",
                            errors, completed
                        );
                        let mut abort = control.abort.lock();
                        if abort.is_none() {
                            *abort = Some(SearchError::ModelErrorRate {
                                errors,
                                iterations: completed,
                                last: anomaly,
                            });
                        }
                        control.stop.store(true, Ordering::Release);
                    }
                }
                Err(e) => {
                    error!("search: graph invariant violated: {}", e);
                    *control.abort.lock() = Some(SearchError::Invariant(e));
                    control.stop.store(true, Ordering::Release);
                }
            }
        }
    }

    /// Runs one complete iteration. Returns the model anomaly it absorbed,
    /// if any.
    fn iterate<R: Rng>(&self, rng: &mut R) -> Result<Option<ModelError>, GraphError> {
        let mut anomaly = None;
        let Selection {
            mut nodes,
            mut edges,
            frontier,
        } = self.select(&self.graph.read(), rng);
        let leaf = nodes[nodes.len() - 1];

        let (utility, origin) = match frontier {
            Frontier::Terminal => {
                let graph = self.graph.read();
                let data = graph.node_payload(leaf);
                (self.terminal_utility(&data.state, data.player, &mut anomaly), data.player)
            }
            Frontier::Exhausted => {
                trace!("iterate: every child of {} closes a cycle; scoring neutral", leaf);
                (0.0, self.graph.read().node_payload(leaf).player)
            }
            Frontier::Unexpanded => match self.expand(leaf, &mut anomaly)? {
                Expansion::DeadEnd => {
                    warn!("iterate: node {} is not terminal but has no playable action", leaf);
                    anomaly.get_or_insert(ModelError::NoLegalActions);
                    (0.0, self.graph.read().node_payload(leaf).player)
                }
                Expansion::Expanded { fresh: Some(edge) } => {
                    let (child, state, player) = {
                        let graph = self.graph.read();
                        let child = graph.edge_target(edge);
                        let data = graph.node_payload(child);
                        (child, data.state.clone(), data.player)
                    };
                    nodes.push(child);
                    edges.push(edge);
                    (self.simulate(state, player, rng, &mut anomaly), player)
                }
                Expansion::Expanded { fresh: None } | Expansion::AlreadyExpanded => {
                    let (state, player) = {
                        let graph = self.graph.read();
                        let data = graph.node_payload(leaf);
                        (data.state.clone(), data.player)
                    };
                    (self.simulate(state, player, rng, &mut anomaly), player)
                }
            },
        };

        self.backpropagate(&nodes, &edges, utility, origin)?;
        if self.config.verify_invariants {
            self.graph.read().check_invariants()?;
        }
        Ok(anomaly)
    }

    fn select<R: Rng>(&self, graph: &PlannerGraph<M>, rng: &mut R) -> Selection {
        let mut nodes = vec![self.root];
        let mut edges = Vec::new();
        let mut active_path = HashSet::new();
        active_path.insert(self.root);

        loop {
            let current = nodes[nodes.len() - 1];
            let frontier = if graph.node_payload(current).terminal {
                Some(Frontier::Terminal)
            } else if !graph.is_expanded(current) {
                Some(Frontier::Unexpanded)
            } else {
                None
            };
            if let Some(frontier) = frontier {
                return Selection { nodes, edges, frontier };
            }

            let candidates: Vec<EdgeId> = graph
                .children_of(current)
                .iter()
                .copied()
                .filter(|&e| !graph.would_cycle(&active_path, graph.edge_target(e)))
                .collect();
            let Some(edge) = self.policy.select(graph, current, &candidates, rng) else {
                return Selection {
                    nodes,
                    edges,
                    frontier: Frontier::Exhausted,
                };
            };

            let next = graph.edge_target(edge);
            trace!("select: {} -> {} via {}", current, next, edge);
            active_path.insert(next);
            nodes.push(next);
            edges.push(edge);
        }
    }

    fn expand(&self, node: NodeId, anomaly: &mut Option<ModelError>) -> Result<Expansion, GraphError> {
        let mut graph = self.graph.write();
        if graph.is_expanded(node) {
            return Ok(Expansion::AlreadyExpanded);
        }

        let state = graph.node_payload(node).state.clone();
        let mut fresh = None;
        for action in self.model.legal_actions(&state) {
            let next = match self.model.apply_action(&state, &action) {
                Ok(next) => next,
                Err(e) => {
                    warn!("expand: model rejected its own action {:?} at {}: {}", action, node, e);
                    *anomaly = Some(e);
                    continue;
                }
            };
            let key = self.model.canonical_state_key(&next);
            let known = graph.find_node(&key).is_some();
            let child = graph.get_or_create_node(key, || vertex(&self.model, next));
            match graph.add_edge(node, action, child, ()) {
                Ok(edge) => {
                    if !known && fresh.is_none() {
                        fresh = Some(edge);
                    }
                }
                Err(GraphError::DuplicateAction { action, .. }) => {
                    warn!("expand: action {} at {} leads to two different states", action, node);
                    *anomaly = Some(ModelError::DuplicateTransition(action));
                }
                Err(e) => return Err(e),
            }
        }

        if graph.children_of(node).is_empty() {
            return Ok(Expansion::DeadEnd);
        }
        graph.mark_expanded(node)?;
        trace!("expand: {} has {} children", node, graph.children_of(node).len());
        Ok(Expansion::Expanded { fresh })
    }

    /// Plays the default policy from `state`; the result is seen by `origin`.
    fn simulate<R: Rng>(
        &self,
        mut state: M::State,
        origin: M::Player,
        rng: &mut R,
        anomaly: &mut Option<ModelError>,
    ) -> f64 {
        for _ in 0..self.config.max_playout_depth {
            if self.model.is_terminal(&state) {
                return self.terminal_utility(&state, origin, anomaly);
            }
            let Some(action) = self.model.default_policy(&state, rng) else {
                warn!("simulate: playout reached a non-terminal state without legal actions");
                *anomaly = Some(ModelError::NoLegalActions);
                return 0.0;
            };
            match self.model.apply_action(&state, &action) {
                Ok(next) => state = next,
                Err(e) => {
                    warn!("simulate: default policy chose {:?}: {}", action, e);
                    *anomaly = Some(e);
                    return 0.0;
                }
            }
        }
        if self.model.is_terminal(&state) {
            return self.terminal_utility(&state, origin, anomaly);
        }
        trace!("simulate: playout cut off after {} moves", self.config.max_playout_depth);
        0.0
    }

    fn terminal_utility(&self, state: &M::State, perspective: M::Player, anomaly: &mut Option<ModelError>) -> f64 {
        let utility = self.model.terminal_utility(state, perspective);
        if utility.is_finite() {
            utility
        } else {
            warn!("terminal utility {} replaced by 0", utility);
            *anomaly = Some(ModelError::NonFiniteUtility(utility));
            0.0
        }
    }

    /// Records one visit on every node and edge of the path.
    fn backpropagate(
        &self,
        nodes: &[NodeId],
        edges: &[EdgeId],
        utility: f64,
        origin: M::Player,
    ) -> Result<(), GraphError> {
        if edges.len() + 1 != nodes.len() {
            return Err(GraphError::InvariantViolation(format!(
                "search path has {} nodes but {} edges",
                nodes.len(),
                edges.len()
            )));
        }
        let graph = self.graph.read();
        let oriented = |node: NodeId| {
            if graph.node_payload(node).player == origin {
                utility
            } else {
                -utility
            }
        };
        for (depth, &node) in nodes.iter().enumerate().rev() {
            graph.record_visit(node, oriented(node))?;
            if depth > 0 {
                // The edge's value belongs to the player who chose it.
                graph.record_visit(edges[depth - 1], oriented(nodes[depth - 1]))?;
            }
        }
        Ok(())
    }

    /// Returns the action to play at the root.
    pub fn best_action(&self, criterion: BestActionCriterion) -> Result<M::Action, SearchError> {
        self.best_action_from(self.root, criterion)
    }

    /// Returns the best action at any node of the graph.
    ///
    /// # Errors
    /// [`SearchError::NoChildren`] if `node` has not been expanded.
    pub fn best_action_from(
        &self,
        node: NodeId,
        criterion: BestActionCriterion,
    ) -> Result<M::Action, SearchError> {
        self.check_poisoned()?;
        let graph = self.graph.read();
        if node.index() >= graph.node_count() {
            return Err(SearchError::Lookup(GraphError::UnknownNode(node)));
        }
        let edge = best_child(&graph, node, criterion).ok_or(SearchError::NoChildren(node))?;
        Ok(graph.edge_action(edge).clone())
    }

    /// Visit count and value sum of a node or edge.
    pub fn stats<T: Into<StatTarget>>(&self, target: T) -> Result<StatsSnapshot, SearchError> {
        self.check_poisoned()?;
        self.graph.read().stats(target).map_err(SearchError::Lookup)
    }

    /// Returns statistics for the children of the root node, in creation
    /// order.
    pub fn root_children_stats(&self) -> Result<Vec<ChildStats<M::Action>>, SearchError> {
        self.check_poisoned()?;
        let graph = self.graph.read();
        let parent_visits = graph.stats(self.root).map_err(SearchError::Lookup)?.visits;
        graph
            .children_of(self.root)
            .iter()
            .map(|&edge| {
                let stats = graph.stats(edge).map_err(SearchError::Lookup)?;
                Ok(ChildStats {
                    action: graph.edge_action(edge).clone(),
                    visits: stats.visits,
                    average: stats.average(),
                    ucb: ucb1(stats, parent_visits, self.config.exploration),
                })
            })
            .collect()
    }

    /// Advances the root to the position reached by `action`, keeping the
    /// part of the graph that is still reachable.
    pub fn advance_root(&mut self, action: &M::Action) -> Result<(), SearchError> {
        self.check_poisoned()?;
        let graph = self.graph.get_mut();
        let target = match graph.find_edge(self.root, action) {
            Some(edge) => graph.edge_target(edge),
            None => {
                let state = graph.node_payload(self.root).state.clone();
                let next = self
                    .model
                    .apply_action(&state, action)
                    .map_err(SearchError::UnknownAction)?;
                let key = self.model.canonical_state_key(&next);
                graph.get_or_create_node(key, || vertex(&self.model, next))
            }
        };

        let root = match graph.prune(target) {
            Ok(root) => root,
            Err(e) => {
                error!("advance_root: pruning failed: {}", e);
                self.poisoned = true;
                return Err(SearchError::Invariant(e));
            }
        };
        self.root = root;
        self.iterations = graph.stats(root).map(|s| s.visits).unwrap_or(0);
        debug!(
            "advance_root: {:?} keeps {} nodes and {} edges",
            action,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The state at the root. Like [`Mcts::root_is_terminal`] and
    /// [`Mcts::graph`], this reads the graph even on a poisoned handle.
    pub fn root_state(&self) -> M::State {
        self.graph.read().node_payload(self.root).state.clone()
    }

    /// Whether the game is over at the root.
    pub fn root_is_terminal(&self) -> bool {
        self.graph.read().node_payload(self.root).terminal
    }

    /// Iterations completed since the current root was set.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Read access to the graph for diagnostics and rendering.
    ///
    /// This skips the poisoning check so that a graph that failed
    /// [`SearchGraph::check_invariants`] can still be inspected. Use
    /// [`Mcts::is_poisoned`] to tell whether its statistics can be trusted.
    pub fn graph(&self) -> RwLockReadGuard<'_, PlannerGraph<M>> {
        self.graph.read()
    }

    /// Whether an invariant violation has made this handle refuse queries.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Exports node and edge tables of the current graph.
    pub fn export_tables(&self) -> Result<GraphTables<M::Key, M::Action>, SearchError> {
        self.check_poisoned()?;
        Ok(self.graph.read().to_tables())
    }

    fn check_poisoned(&self) -> Result<(), SearchError> {
        if self.poisoned {
            Err(SearchError::Poisoned)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::nim::{NimModel, NimRule, NimState, Take};
    use test_log::test;

    /// 0 -> {1, 2}; 1 is terminal, 2 is a non-terminal dead end.
    struct DeadEndModel;

    impl GameModel for DeadEndModel {
        type State = u8;
        type Action = u8;
        type Key = u8;
        type Player = bool;

        fn canonical_state_key(&self, state: &u8) -> u8 {
            *state
        }
        fn legal_actions(&self, state: &u8) -> Vec<u8> {
            if *state == 0 {
                vec![1, 2]
            } else {
                Vec::new()
            }
        }
        fn apply_action(&self, state: &u8, action: &u8) -> Result<u8, ModelError> {
            if *state == 0 {
                Ok(*action)
            } else {
                Err(ModelError::IllegalAction(format!("{} at {}", action, state)))
            }
        }
        fn is_terminal(&self, state: &u8) -> bool {
            *state == 1
        }
        fn player_to_move(&self, state: &u8) -> bool {
            *state == 0
        }
        fn terminal_utility(&self, _state: &u8, perspective: bool) -> f64 {
            if perspective {
                1.0
            } else {
                -1.0
            }
        }
    }

    /// 0 -> {1}; reaching 1 pays out the largest finite utility, so two
    /// visits overflow the value sums.
    struct Jackpot;

    impl GameModel for Jackpot {
        type State = u8;
        type Action = u8;
        type Key = u8;
        type Player = bool;

        fn canonical_state_key(&self, state: &u8) -> u8 {
            *state
        }
        fn legal_actions(&self, state: &u8) -> Vec<u8> {
            if *state == 0 {
                vec![1]
            } else {
                Vec::new()
            }
        }
        fn apply_action(&self, _state: &u8, action: &u8) -> Result<u8, ModelError> {
            Ok(*action)
        }
        fn is_terminal(&self, state: &u8) -> bool {
            *state != 0
        }
        fn player_to_move(&self, state: &u8) -> bool {
            *state == 0
        }
        fn terminal_utility(&self, _state: &u8, _perspective: bool) -> f64 {
            f64::MAX
        }
    }

    fn nim(objects: u32, config: SearchConfig) -> Mcts<NimModel> {
        Mcts::new(NimModel::new(2, NimRule::Normal), NimState::new(objects), config).unwrap()
    }

    #[test]
    fn test_root_visits_equal_iterations() {
        let mut search = nim(7, SearchConfig::for_testing().with_iterations(300));
        let stats = search.search().unwrap();
        assert_eq!(stats.iterations, 300);
        assert_eq!(stats.root_visits, 300);
        assert_eq!(stats.stop, StopReason::IterationBudget);
        assert_eq!(search.iterations(), 300);
        assert_eq!(search.stats(search.root()).unwrap().visits, 300);
    }

    #[test]
    fn test_first_iteration_expands_root_and_simulates_first_child() {
        let mut search = nim(5, SearchConfig::for_testing().with_iterations(1));
        search.search().unwrap();
        let graph = search.graph();
        let root = search.root();
        assert!(graph.is_expanded(root));
        let children = graph.children_of(root);
        assert_eq!(children.len(), 2);
        assert_eq!(*graph.edge_action(children[0]), Take(1));
        assert_eq!(graph.stats(children[0]).unwrap().visits, 1);
        assert_eq!(graph.stats(children[1]).unwrap().visits, 0);
        assert_eq!(graph.stats(graph.edge_target(children[0])).unwrap().visits, 1);
    }

    #[test]
    fn test_second_iteration_tries_unvisited_sibling() {
        let mut search = nim(5, SearchConfig::for_testing().with_iterations(2));
        search.search().unwrap();
        let children = search.root_children_stats().unwrap();
        assert_eq!(children[0].visits, 1);
        assert_eq!(children[1].visits, 1);
    }

    #[test]
    fn test_best_action_requires_expanded_root() {
        let search = nim(5, SearchConfig::for_testing());
        assert_eq!(
            search.best_action(BestActionCriterion::MostVisited),
            Err(SearchError::NoChildren(search.root()))
        );
    }

    #[test]
    fn test_terminal_root_scores_every_iteration() {
        let mut search = nim(0, SearchConfig::for_testing().with_iterations(10));
        search.search().unwrap();
        let root = search.stats(search.root()).unwrap();
        assert_eq!(root.visits, 10);
        // Under normal play the player facing an empty heap has lost.
        assert_eq!(root.average(), Some(-1.0));
        assert_eq!(search.graph().node_count(), 1);
    }

    #[test]
    fn test_dead_end_is_absorbed() {
        let config = SearchConfig::for_testing().with_iterations(50).with_max_model_error_rate(1.0);
        let mut search = Mcts::new(DeadEndModel, 0, config).unwrap();
        let stats = search.search().unwrap();
        assert_eq!(stats.iterations, 50);
        assert!(stats.model_errors > 0);

        let graph = search.graph();
        let dead_end = graph.find_node(&2).unwrap();
        let dead_stats = graph.stats(dead_end).unwrap();
        assert!(dead_stats.visits > 0);
        assert_eq!(dead_stats.value_sum, 0.0);
        assert!(!graph.is_expanded(dead_end));
    }

    #[test]
    fn test_pervasive_model_errors_abort_with_partial_statistics() {
        let mut config = SearchConfig::for_testing().with_iterations(1000).with_max_model_error_rate(0.1);
        config.min_iterations_for_error_rate = 10;
        let mut search = Mcts::new(DeadEndModel, 0, config).unwrap();

        match search.search() {
            Err(SearchError::ModelErrorRate { errors, iterations, last }) => {
                assert!(iterations < 1000);
                assert!(errors as f64 / iterations as f64 > 0.1);
                assert_eq!(last, ModelError::NoLegalActions);
                // Partial statistics remain consistent and queryable.
                assert_eq!(search.stats(search.root()).unwrap().visits, iterations);
                assert!(search.best_action(BestActionCriterion::MostVisited).is_ok());
            }
            other => panic!("expected an error-rate abort, got {:?}", other),
        }
    }

    #[test]
    fn test_advance_root_keeps_subtree() {
        let mut search = nim(6, SearchConfig::for_testing().with_iterations(400));
        search.search().unwrap();
        let child_visits = search.root_children_stats().unwrap()[1].visits;
        assert!(child_visits > 0);

        search.advance_root(&Take(2)).unwrap();
        assert_eq!(search.root_state(), NimState { remaining: 4, to_move: NimState::new(6).to_move.other() });
        assert_eq!(search.stats(search.root()).unwrap().visits, child_visits);
        assert_eq!(search.iterations(), child_visits);
        assert!(search.graph().find_node(&NimState::new(6)).is_none());
        search.graph().check_invariants().unwrap();

        search.search().unwrap();
        assert_eq!(search.stats(search.root()).unwrap().visits, child_visits + 400);
    }

    #[test]
    fn test_advance_root_through_unmaterialized_action() {
        let mut search = nim(6, SearchConfig::for_testing());
        search.advance_root(&Take(1)).unwrap();
        assert_eq!(search.root_state().remaining, 5);
        assert_eq!(search.graph().node_count(), 1);
        assert!(matches!(
            search.advance_root(&Take(9)),
            Err(SearchError::UnknownAction(ModelError::IllegalAction(_)))
        ));
    }

    #[test]
    fn test_same_seed_reproduces_search() {
        let run = || {
            let mut search = nim(9, SearchConfig::for_testing().with_iterations(250).with_seed(11));
            search.search().unwrap();
            search.export_tables().unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_parallel_search_accounts_every_iteration() {
        let mut search = nim(12, SearchConfig::default().with_iterations(2000).with_threads(4));
        let stats = search.search().unwrap();
        assert_eq!(stats.iterations, 2000);
        assert_eq!(stats.root_visits, 2000);
        search.graph().check_invariants().unwrap();
    }

    #[test]
    fn test_time_budget_stops_search() {
        let mut search = nim(15, SearchConfig::default().with_time(Duration::from_millis(50)));
        let stats = search.search().unwrap();
        assert_eq!(stats.stop, StopReason::TimeBudget);
        assert!(stats.iterations > 0);
        assert_eq!(stats.root_visits, stats.iterations);
    }

    #[test]
    fn test_invariant_violation_poisons_handle() {
        let mut search = Mcts::new(Jackpot, 0, SearchConfig::for_testing().with_iterations(10)).unwrap();
        assert!(matches!(search.search(), Err(SearchError::Invariant(_))));
        assert!(search.is_poisoned());

        assert!(matches!(search.search(), Err(SearchError::Poisoned)));
        assert!(matches!(
            search.best_action(BestActionCriterion::MostVisited),
            Err(SearchError::Poisoned)
        ));
        assert!(matches!(search.stats(search.root()), Err(SearchError::Poisoned)));
        assert!(matches!(search.root_children_stats(), Err(SearchError::Poisoned)));
        assert!(matches!(search.export_tables(), Err(SearchError::Poisoned)));
        assert!(matches!(search.advance_root(&1), Err(SearchError::Poisoned)));
        // The corrupt graph stays inspectable.
        assert!(search.graph().check_invariants().is_err());
    }

    #[test]
    fn test_combined_budget_stops_on_iterations_first() {
        let budget = Budget::Both {
            iterations: 50,
            time: Duration::from_secs(10),
        };
        let mut search = nim(9, SearchConfig::for_testing().with_budget(budget));
        let stats = search.search().unwrap();
        assert_eq!(stats.stop, StopReason::IterationBudget);
        assert_eq!(stats.iterations, 50);
        assert_eq!(stats.root_visits, 50);
    }

    #[test]
    fn test_combined_budget_stops_on_time_first() {
        let budget = Budget::Both {
            iterations: 1_000_000_000,
            time: Duration::from_millis(30),
        };
        let mut search = nim(15, SearchConfig::default().with_budget(budget));
        let stats = search.search().unwrap();
        assert_eq!(stats.stop, StopReason::TimeBudget);
        assert!(stats.iterations > 0 && stats.iterations < 1_000_000_000);
        assert_eq!(stats.root_visits, stats.iterations);
    }

    #[test]
    fn test_root_children_report_ucb() {
        let mut search = nim(6, SearchConfig::for_testing().with_iterations(200).with_exploration(1.4));
        search.search().unwrap();
        let root_visits = search.stats(search.root()).unwrap().visits;
        let children = search.root_children_stats().unwrap();
        assert_eq!(children.len(), 2);
        for child in &children {
            let average = child.average.unwrap();
            let expected = average + 1.4 * ((root_visits as f64).ln() / child.visits as f64).sqrt();
            assert!((child.ucb - expected).abs() < 1e-12);
        }

        let mut fresh = nim(6, SearchConfig::for_testing().with_iterations(1));
        fresh.search().unwrap();
        let children = fresh.root_children_stats().unwrap();
        assert_eq!(children[1].visits, 0);
        assert_eq!(children[1].ucb, f64::INFINITY);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_search() {
        let result = Mcts::new(
            NimModel::new(2, NimRule::Normal),
            NimState::new(5),
            SearchConfig::default().with_exploration(-0.5),
        );
        assert!(matches!(
            result,
            Err(SearchError::Config(ConfigError::InvalidExploration(_)))
        ));
    }
}
