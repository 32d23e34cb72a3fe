//! # Selection Policies
//!
//! Strategy objects used by the planner:
//! - [`TreePolicy`] picks the edge to follow during selection; [`Ucb1`] is the
//!   standard implementation.
//! - [`BestActionCriterion`] picks the move to play once a search is over.
//!
//! Both break ties by edge creation order unless told otherwise, so results
//! are reproducible.

use crate::graph::{EdgeId, NodeId, SearchGraph, StatsSnapshot};
use log::trace;
use rand::Rng;
use std::fmt;
use std::hash::Hash;

/// Chooses which child edge selection descends through.
pub trait TreePolicy: Send + Sync {
    /// Picks one of `candidates`, all of which are child edges of `parent`
    /// listed in creation order. Returns `None` only when `candidates` is
    /// empty.
    fn select<K, A, V, E, R>(
        &self,
        graph: &SearchGraph<K, A, V, E>,
        parent: NodeId,
        candidates: &[EdgeId],
        rng: &mut R,
    ) -> Option<EdgeId>
    where
        K: Clone + Eq + Hash,
        A: Clone + Eq + Hash + fmt::Debug,
        R: Rng;
}

/// Calculates the UCB1 (Upper Confidence Bound 1) score of a child.
/// This score balances exploration and exploitation.
///
/// # Arguments
/// * `child` - Statistics of the edge leading to the child
/// * `parent_visits` - The number of visits to the parent node
/// * `exploration` - A constant to tune the level of exploration
///
/// Unvisited children score `+inf` so they are always tried first.
pub fn ucb1(child: StatsSnapshot, parent_visits: u64, exploration: f64) -> f64 {
    match child.average() {
        None => f64::INFINITY,
        Some(average) => {
            let log_parent = (parent_visits.max(1) as f64).ln();
            average + exploration * (log_parent / child.visits as f64).sqrt()
        }
    }
}

/// Tree policy maximizing [`ucb1`] over edge statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ucb1 {
    pub exploration: f64,
    /// Break ties by reservoir sampling instead of creation order.
    pub random_ties: bool,
}

impl Ucb1 {
    pub fn new(exploration: f64) -> Self {
        Ucb1 {
            exploration,
            random_ties: false,
        }
    }

    pub fn with_random_ties(mut self, enabled: bool) -> Self {
        self.random_ties = enabled;
        self
    }
}

impl TreePolicy for Ucb1 {
    fn select<K, A, V, E, R>(
        &self,
        graph: &SearchGraph<K, A, V, E>,
        parent: NodeId,
        candidates: &[EdgeId],
        rng: &mut R,
    ) -> Option<EdgeId>
    where
        K: Clone + Eq + Hash,
        A: Clone + Eq + Hash + fmt::Debug,
        R: Rng,
    {
        let parent_visits = graph.stats(parent).map(|s| s.visits).unwrap_or(0);
        let mut best: Option<(EdgeId, f64)> = None;
        let mut tied = 0u32;

        for &edge in candidates {
            let Ok(stats) = graph.stats(edge) else { continue };
            let score = ucb1(stats, parent_visits, self.exploration);
            if score.is_nan() {
                trace!("ucb1: skipping {} with undefined score", edge);
                continue;
            }
            match best {
                Some((_, best_score)) if score < best_score => {}
                Some((_, best_score)) if score == best_score => {
                    tied += 1;
                    if self.random_ties && rng.random_ratio(1, tied) {
                        best = Some((edge, score));
                    }
                }
                _ => {
                    best = Some((edge, score));
                    tied = 1;
                }
            }
        }
        best.map(|(edge, _)| edge)
    }
}

/// How the final move is chosen from the root's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BestActionCriterion {
    /// The most visited child; robust against lucky averages.
    #[default]
    MostVisited,
    /// The child with the best average utility for the player to move.
    /// Unvisited children are never preferred over visited ones.
    HighestAverageValue,
}

/// Returns the best child edge of `node` under `criterion`, or `None` when
/// `node` has no children. Ties go to the edge created first.
pub fn best_child<K, A, V, E>(
    graph: &SearchGraph<K, A, V, E>,
    node: NodeId,
    criterion: BestActionCriterion,
) -> Option<EdgeId>
where
    K: Clone + Eq + Hash,
    A: Clone + Eq + Hash + fmt::Debug,
{
    let mut best: Option<(EdgeId, f64)> = None;
    for &edge in graph.children_of(node) {
        let Ok(stats) = graph.stats(edge) else { continue };
        let score = match criterion {
            BestActionCriterion::MostVisited => stats.visits as f64,
            BestActionCriterion::HighestAverageValue => stats.average().unwrap_or(f64::NEG_INFINITY),
        };
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((edge, score)),
        }
    }
    best.map(|(edge, _)| edge)
}
