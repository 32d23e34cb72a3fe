//! Flat node/edge tables for persistence and diagnostics.
//!
//! Payloads are not part of the tables; callers rebuild them from keys and
//! actions when loading.

use super::{EdgeId, NodeId, SearchGraph, Statistics};
use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRow<K> {
    pub id: NodeId,
    pub key: K,
    pub visits: u64,
    pub value_sum: f64,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow<A> {
    pub id: EdgeId,
    pub source: NodeId,
    pub action: A,
    pub target: NodeId,
    pub visits: u64,
    pub value_sum: f64,
}

/// Node and edge tables, each ordered by identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTables<K, A> {
    pub nodes: Vec<NodeRow<K>>,
    pub edges: Vec<EdgeRow<A>>,
}

impl<K, A, V, E> SearchGraph<K, A, V, E>
where
    K: Clone + Eq + Hash,
    A: Clone + Eq + Hash + fmt::Debug,
{
    /// Exports the graph structure and statistics.
    pub fn to_tables(&self) -> GraphTables<K, A> {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let stats = node.stats.snapshot();
                NodeRow {
                    id: NodeId(i as u32),
                    key: node.key.clone(),
                    visits: stats.visits,
                    value_sum: stats.value_sum,
                    expanded: self.is_expanded(NodeId(i as u32)),
                }
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, edge)| {
                let stats = edge.stats.snapshot();
                EdgeRow {
                    id: EdgeId(i as u32),
                    source: edge.source,
                    action: edge.action.clone(),
                    target: edge.target,
                    visits: stats.visits,
                    value_sum: stats.value_sum,
                }
            })
            .collect();
        GraphTables { nodes, edges }
    }

    /// Rebuilds a graph from tables produced by [`SearchGraph::to_tables`].
    ///
    /// `vertex_payload` and `edge_payload` supply the payloads the tables do
    /// not carry. Malformed tables are rejected: ids out of order, repeated
    /// keys, dangling or duplicate edges, a value without visits, or a node
    /// whose outgoing edges were visited more often than the node itself.
    pub fn from_tables<FV, FE>(
        tables: GraphTables<K, A>,
        mut vertex_payload: FV,
        mut edge_payload: FE,
    ) -> Result<Self, GraphError>
    where
        FV: FnMut(&K) -> V,
        FE: FnMut(&A) -> E,
    {
        let mut graph = SearchGraph::new();

        for (i, row) in tables.nodes.into_iter().enumerate() {
            if row.id.index() != i {
                return Err(GraphError::InvariantViolation(format!(
                    "node row {} carries id {}",
                    i, row.id
                )));
            }
            unvisited_value(row.id, row.visits, row.value_sum)?;
            let payload = vertex_payload(&row.key);
            let id = graph.get_or_create_node(row.key, || payload);
            if id != row.id {
                return Err(GraphError::InvariantViolation(format!(
                    "node {} repeats the key of {}",
                    row.id, id
                )));
            }
            graph.nodes[id.index()].stats = Statistics::with_history(row.visits, row.value_sum);
            if row.expanded {
                graph.mark_expanded(id)?;
            }
        }

        for (i, row) in tables.edges.into_iter().enumerate() {
            if row.id.index() != i {
                return Err(GraphError::InvariantViolation(format!(
                    "edge row {} carries id {}",
                    i, row.id
                )));
            }
            unvisited_value(row.id, row.visits, row.value_sum)?;
            let payload = edge_payload(&row.action);
            let id = graph.add_edge(row.source, row.action, row.target, payload)?;
            if id != row.id {
                return Err(GraphError::InvariantViolation(format!(
                    "edge {} repeats edge {}",
                    row.id, id
                )));
            }
            graph.edges[id.index()].stats = Statistics::with_history(row.visits, row.value_sum);
        }

        // Every edge visit also visits its source.
        for (i, node) in graph.nodes.iter().enumerate() {
            let outgoing: u64 = node.children.iter().map(|&e| graph.edges[e.index()].stats.visits()).sum();
            if outgoing > node.stats.visits() {
                return Err(GraphError::InvariantViolation(format!(
                    "node {} has {} visits but its edges have {}",
                    NodeId(i as u32),
                    node.stats.visits(),
                    outgoing
                )));
            }
        }

        graph.check_invariants()?;
        Ok(graph)
    }
}

fn unvisited_value(id: impl fmt::Display, visits: u64, value_sum: f64) -> Result<(), GraphError> {
    if visits == 0 && value_sum != 0.0 {
        return Err(GraphError::InvariantViolation(format!(
            "{} has value sum {} without visits",
            id, value_sum
        )));
    }
    Ok(())
}
