//! # Error Types
//!
//! Failures are split by who is at fault:
//! - [`ConfigError`]: the caller asked for an impossible search
//! - [`ModelError`]: the game-model collaborator broke its contract
//! - [`GraphError`]: the search graph was asked to do something inconsistent,
//!   or found itself in an inconsistent state
//! - [`SearchError`]: what the planner hands back to its caller
//!
//! Model anomalies are absorbed per iteration by the planner and only surface
//! as [`SearchError::ModelErrorRate`] when they become pervasive. Graph
//! invariant violations are always fatal.

use crate::graph::{EdgeId, NodeId};
use thiserror::Error;

/// Rejected search parameters. Raised before any iteration runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("iteration budget must be positive")]
    ZeroIterations,

    #[error("time budget must be positive")]
    ZeroDuration,

    #[error("exploration constant must be finite and non-negative, got {0}")]
    InvalidExploration(f64),

    #[error("maximum playout depth must be positive")]
    ZeroPlayoutDepth,

    #[error("model error rate threshold must lie in [0, 1], got {0}")]
    InvalidErrorRate(f64),

    #[error("failed to build the search thread pool: {0}")]
    ThreadPool(String),
}

/// A game-model collaborator returned data that violates its contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("state is not terminal but has no legal actions")]
    NoLegalActions,

    #[error("illegal action: {0}")]
    IllegalAction(String),

    #[error("terminal utility is not a finite number: {0}")]
    NonFiniteUtility(f64),

    #[error("one action leads to two different states: {0}")]
    DuplicateTransition(String),
}

/// Structural errors raised by [`SearchGraph`](crate::graph::SearchGraph).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// An edge for `(source, action)` already exists and points elsewhere.
    #[error("node {node} already has action {action} leading to node {existing}, not {requested}")]
    DuplicateAction {
        node: NodeId,
        action: String,
        existing: NodeId,
        requested: NodeId,
    },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown edge {0}")]
    UnknownEdge(EdgeId),

    #[error("graph invariant violated: {0}")]
    InvariantViolation(String),
}

/// Errors surfaced by the planner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("invalid search configuration: {0}")]
    Config(#[from] ConfigError),

    /// `best_action` was asked about a node that was never expanded.
    #[error("node {0} has no children")]
    NoChildren(NodeId),

    /// The action is not among the root's materialized edges and the model
    /// rejected it as well.
    #[error("action cannot be applied at the root: {0}")]
    UnknownAction(ModelError),

    /// A caller-supplied node or edge id is not in the graph.
    #[error("lookup failed: {0}")]
    Lookup(GraphError),

    /// Too many iterations hit model anomalies. The search stopped cleanly;
    /// statistics gathered so far remain valid and queryable.
    #[error("model errors in {errors} of {iterations} iterations (last: {last})")]
    ModelErrorRate {
        errors: u64,
        iterations: u64,
        last: ModelError,
    },

    /// The graph is corrupt. The search handle refuses further queries.
    #[error("search aborted: {0}")]
    Invariant(GraphError),

    /// A previous invariant violation poisoned this search handle.
    #[error("search handle is poisoned by an earlier invariant violation")]
    Poisoned,
}

impl From<GraphError> for SearchError {
    fn from(e: GraphError) -> Self {
        SearchError::Invariant(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_errors_are_fatal_search_errors() {
        let err: SearchError = GraphError::UnknownNode(NodeId(7)).into();
        assert_eq!(err, SearchError::Invariant(GraphError::UnknownNode(NodeId(7))));
    }

    #[test]
    fn test_error_messages() {
        let err = GraphError::DuplicateAction {
            node: NodeId(0),
            action: "Take(2)".to_string(),
            existing: NodeId(1),
            requested: NodeId(2),
        };
        assert_eq!(
            err.to_string(),
            "node n0 already has action Take(2) leading to node n1, not n2"
        );
        assert_eq!(
            SearchError::from(ConfigError::ZeroIterations).to_string(),
            "invalid search configuration: iteration budget must be positive"
        );
    }
}
