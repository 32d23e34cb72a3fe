//! # Search Graph
//!
//! A rollout-oriented graph of game states in which transpositions (different
//! move sequences reaching the same state) share a single node.
//!
//! ## Storage
//! Nodes and edges live in flat, append-only arenas and refer to each other by
//! index ([`NodeId`], [`EdgeId`]) rather than by reference. Structural sharing
//! and cycles are therefore just repeated indices: a back-edge to an ancestor
//! is an ordinary edge whose target happens to be on the current path, which
//! the planner detects with [`SearchGraph::would_cycle`].
//!
//! ```text
//!   nodes: [ n0 ─┬─ e0 ─► n1 ─── e2 ─► n3 ]
//!                └─ e1 ─► n2 ─── e3 ─┘        (n3 is a transposition)
//! ```
//!
//! ## Mutation rules
//! - Nodes are created only through [`SearchGraph::get_or_create_node`], so a
//!   key never maps to two nodes.
//! - Edges are created only through [`SearchGraph::add_edge`]; each
//!   `(source, action)` pair has at most one edge.
//! - Statistics change only through [`SearchGraph::record_visit`], which takes
//!   `&self` and may be called from several threads at once.
//! - Nothing is removed during a search. Between searches,
//!   [`SearchGraph::prune`] drops whatever a new root can no longer reach.

mod prune;
pub mod statistics;
pub mod tables;

pub use statistics::{Statistics, StatsSnapshot};
pub use tables::{EdgeRow, GraphTables, NodeRow};

use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

/// Index of a node in the node store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Index of an edge in the edge store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Either a node or an edge; the owner of a set of [`Statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatTarget {
    Node(NodeId),
    Edge(EdgeId),
}

impl From<NodeId> for StatTarget {
    fn from(id: NodeId) -> Self {
        StatTarget::Node(id)
    }
}

impl From<EdgeId> for StatTarget {
    fn from(id: EdgeId) -> Self {
        StatTarget::Edge(id)
    }
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    payload: V,
    stats: Statistics,
    /// Outgoing edges in creation order.
    children: Vec<EdgeId>,
    /// Incoming edges in creation order.
    parents: Vec<EdgeId>,
    /// Published once every child edge of an expansion has been appended.
    expanded: AtomicBool,
}

#[derive(Debug)]
struct Edge<A, E> {
    source: NodeId,
    action: A,
    target: NodeId,
    payload: E,
    stats: Statistics,
}

/// Transposition-merging graph of game states.
///
/// * `K` - canonical state key; equal keys are the same node
/// * `A` - action descriptor labelling edges
/// * `V` - caller-attached vertex payload
/// * `E` - caller-attached edge payload
#[derive(Debug)]
pub struct SearchGraph<K, A, V, E> {
    nodes: Vec<Node<K, V>>,
    edges: Vec<Edge<A, E>>,
    node_index: HashMap<K, NodeId>,
    edge_index: HashMap<(NodeId, A), EdgeId>,
}

impl<K, A, V, E> Default for SearchGraph<K, A, V, E>
where
    K: Clone + Eq + Hash,
    A: Clone + Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A, V, E> SearchGraph<K, A, V, E>
where
    K: Clone + Eq + Hash,
    A: Clone + Eq + Hash + fmt::Debug,
{
    /// Creates an empty graph.
    pub fn new() -> Self {
        SearchGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
        }
    }

    /// Returns the node for `key`, creating it on first encounter.
    ///
    /// `payload_factory` runs only when a new node is created. The new node
    /// starts with zero visits and a zero value sum.
    pub fn get_or_create_node<F>(&mut self, key: K, payload_factory: F) -> NodeId
    where
        F: FnOnce() -> V,
    {
        if let Some(&id) = self.node_index.get(&key) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            key: key.clone(),
            payload: payload_factory(),
            stats: Statistics::default(),
            children: Vec::new(),
            parents: Vec::new(),
            expanded: AtomicBool::new(false),
        });
        self.node_index.insert(key, id);
        id
    }

    /// Looks up the node for `key` without creating it.
    pub fn find_node(&self, key: &K) -> Option<NodeId> {
        self.node_index.get(key).copied()
    }

    /// Connects `source` to `target` through `action`.
    ///
    /// Returns the existing edge when `(source, action)` is already present
    /// with the same target; `payload` is dropped in that case.
    ///
    /// # Errors
    /// * [`GraphError::DuplicateAction`] if the pair already leads elsewhere
    /// * [`GraphError::UnknownNode`] if either endpoint is not in this graph
    pub fn add_edge(
        &mut self,
        source: NodeId,
        action: A,
        target: NodeId,
        payload: E,
    ) -> Result<EdgeId, GraphError> {
        self.check_node(source)?;
        self.check_node(target)?;

        if let Some(&existing) = self.edge_index.get(&(source, action.clone())) {
            let existing_target = self.edges[existing.index()].target;
            if existing_target == target {
                return Ok(existing);
            }
            return Err(GraphError::DuplicateAction {
                node: source,
                action: format!("{:?}", action),
                existing: existing_target,
                requested: target,
            });
        }

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            source,
            action: action.clone(),
            target,
            payload,
            stats: Statistics::default(),
        });
        self.edge_index.insert((source, action), id);
        self.nodes[source.index()].children.push(id);
        self.nodes[target.index()].parents.push(id);
        Ok(id)
    }

    /// Looks up the edge leaving `source` through `action`.
    pub fn find_edge(&self, source: NodeId, action: &A) -> Option<EdgeId> {
        self.edge_index.get(&(source, action.clone())).copied()
    }

    /// Outgoing edges of `node` in creation order.
    ///
    /// # Panics
    /// If `node` does not belong to this graph.
    pub fn children_of(&self, node: NodeId) -> &[EdgeId] {
        &self.nodes[node.index()].children
    }

    /// Incoming edges of `node` in creation order.
    ///
    /// # Panics
    /// If `node` does not belong to this graph.
    pub fn parents_of(&self, node: NodeId) -> &[EdgeId] {
        &self.nodes[node.index()].parents
    }

    /// True iff `candidate` is already on the active path.
    pub fn would_cycle(&self, active_path: &HashSet<NodeId>, candidate: NodeId) -> bool {
        active_path.contains(&candidate)
    }

    /// Counts one visit of a node or edge and adds `utility` to its value sum.
    ///
    /// This is the only way statistics change.
    pub fn record_visit<T>(&self, target: T, utility: f64) -> Result<(), GraphError>
    where
        T: Into<StatTarget>,
    {
        self.statistics(target.into())?.record(utility);
        Ok(())
    }

    /// Current statistics of a node or edge.
    pub fn stats<T>(&self, target: T) -> Result<StatsSnapshot, GraphError>
    where
        T: Into<StatTarget>,
    {
        Ok(self.statistics(target.into())?.snapshot())
    }

    fn statistics(&self, target: StatTarget) -> Result<&Statistics, GraphError> {
        match target {
            StatTarget::Node(id) => self
                .nodes
                .get(id.index())
                .map(|n| &n.stats)
                .ok_or(GraphError::UnknownNode(id)),
            StatTarget::Edge(id) => self
                .edges
                .get(id.index())
                .map(|e| &e.stats)
                .ok_or(GraphError::UnknownEdge(id)),
        }
    }

    /// Whether the children of `node` have been materialized.
    pub fn is_expanded(&self, node: NodeId) -> bool {
        self.nodes
            .get(node.index())
            .map_or(false, |n| n.expanded.load(Ordering::Acquire))
    }

    /// Publishes the children of `node` as complete. Call only after the last
    /// `add_edge` of the expansion.
    pub fn mark_expanded(&self, node: NodeId) -> Result<(), GraphError> {
        let n = self.nodes.get(node.index()).ok_or(GraphError::UnknownNode(node))?;
        n.expanded.store(true, Ordering::Release);
        Ok(())
    }

    /// Transposition key of `node`.
    ///
    /// # Panics
    /// If `node` does not belong to this graph.
    pub fn node_key(&self, node: NodeId) -> &K {
        &self.nodes[node.index()].key
    }

    /// Payload stored with `node`.
    ///
    /// # Panics
    /// If `node` does not belong to this graph.
    pub fn node_payload(&self, node: NodeId) -> &V {
        &self.nodes[node.index()].payload
    }

    /// Mutable access to the payload of `node`.
    ///
    /// # Panics
    /// If `node` does not belong to this graph.
    pub fn node_payload_mut(&mut self, node: NodeId) -> &mut V {
        &mut self.nodes[node.index()].payload
    }

    /// Node the edge leaves.
    ///
    /// # Panics
    /// If `edge` does not belong to this graph.
    pub fn edge_source(&self, edge: EdgeId) -> NodeId {
        self.edges[edge.index()].source
    }

    /// Node the edge enters.
    ///
    /// # Panics
    /// If `edge` does not belong to this graph.
    pub fn edge_target(&self, edge: EdgeId) -> NodeId {
        self.edges[edge.index()].target
    }

    /// Action that labels the edge.
    ///
    /// # Panics
    /// If `edge` does not belong to this graph.
    pub fn edge_action(&self, edge: EdgeId) -> &A {
        &self.edges[edge.index()].action
    }

    /// Payload stored with `edge`.
    ///
    /// # Panics
    /// If `edge` does not belong to this graph.
    pub fn edge_payload(&self, edge: EdgeId) -> &E {
        &self.edges[edge.index()].payload
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// All edge ids in creation order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len() as u32).map(EdgeId)
    }

    fn check_node(&self, node: NodeId) -> Result<(), GraphError> {
        if node.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(node))
        }
    }

    /// Verifies every structural invariant of the graph.
    ///
    /// Checks that the key map is a bijection onto the node store, that no
    /// edge dangles, that `(source, action)` pairs are unique, that adjacency
    /// lists agree with the edge store, and that all value sums are finite.
    pub fn check_invariants(&self) -> Result<(), GraphError> {
        let violation = |msg: String| -> Result<(), GraphError> {
            Err(GraphError::InvariantViolation(msg))
        };

        if self.node_index.len() != self.nodes.len() {
            return violation(format!(
                "{} keys index {} nodes",
                self.node_index.len(),
                self.nodes.len()
            ));
        }
        for (key, &id) in &self.node_index {
            match self.nodes.get(id.index()) {
                Some(node) if node.key == *key => {}
                _ => return violation(format!("key map entry for {} does not match the node store", id)),
            }
        }

        if self.edge_index.len() != self.edges.len() {
            return violation(format!(
                "{} (source, action) pairs index {} edges",
                self.edge_index.len(),
                self.edges.len()
            ));
        }
        for (i, edge) in self.edges.iter().enumerate() {
            let id = EdgeId(i as u32);
            for endpoint in [edge.source, edge.target] {
                if endpoint.index() >= self.nodes.len() {
                    return violation(format!("edge {} dangles at {}", id, endpoint));
                }
            }
            if self.edge_index.get(&(edge.source, edge.action.clone())) != Some(&id) {
                return violation(format!("edge {} is not indexed by its (source, action) pair", id));
            }
            if !self.nodes[edge.source.index()].children.contains(&id) {
                return violation(format!("edge {} missing from children of {}", id, edge.source));
            }
            if !self.nodes[edge.target.index()].parents.contains(&id) {
                return violation(format!("edge {} missing from parents of {}", id, edge.target));
            }
            if !edge.stats.value_sum().is_finite() {
                return violation(format!("edge {} has a non-finite value sum", id));
            }
        }

        let mut child_links = 0;
        let mut parent_links = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            child_links += node.children.len();
            parent_links += node.parents.len();
            if node.children.iter().any(|e| self.edges.get(e.index()).map(|e| e.source) != Some(id)) {
                return violation(format!("children of {} include a foreign edge", id));
            }
            if node.parents.iter().any(|e| self.edges.get(e.index()).map(|e| e.target) != Some(id)) {
                return violation(format!("parents of {} include a foreign edge", id));
            }
            if !node.stats.value_sum().is_finite() {
                return violation(format!("node {} has a non-finite value sum", id));
            }
        }
        if child_links != self.edges.len() || parent_links != self.edges.len() {
            return violation("adjacency lists do not match the edge store".to_string());
        }
        Ok(())
    }
}
