//! Re-basing the graph on a new root between searches.

use super::{EdgeId, NodeId, SearchGraph};
use crate::error::GraphError;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

impl<K, A, V, E> SearchGraph<K, A, V, E>
where
    K: Clone + Eq + Hash,
    A: Clone + Eq + Hash + fmt::Debug,
{
    /// Drops every node that `new_root` cannot reach by following child
    /// edges, together with the edges leaving dropped nodes.
    ///
    /// Survivors keep their payloads, statistics and relative creation order;
    /// identifiers are compacted, so ids taken before the call are invalid
    /// afterwards. Returns the id of `new_root` in the pruned graph.
    pub fn prune(&mut self, new_root: NodeId) -> Result<NodeId, GraphError> {
        self.check_node(new_root)?;

        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = vec![new_root];
        reachable[new_root.index()] = true;
        while let Some(node) = stack.pop() {
            for &edge in &self.nodes[node.index()].children {
                let target = self.edges[edge.index()].target;
                if !reachable[target.index()] {
                    reachable[target.index()] = true;
                    stack.push(target);
                }
            }
        }

        let mut node_map: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut next = 0u32;
        for (old, keep) in reachable.iter().enumerate() {
            if *keep {
                node_map[old] = Some(NodeId(next));
                next += 1;
            }
        }

        // Keep an edge iff its source survives; its target then survives too.
        let mut edge_map: Vec<Option<EdgeId>> = vec![None; self.edges.len()];
        let mut next = 0u32;
        for (old, edge) in self.edges.iter().enumerate() {
            if reachable[edge.source.index()] {
                edge_map[old] = Some(EdgeId(next));
                next += 1;
            }
        }

        let remap_node = |id: NodeId| node_map[id.index()];
        let remap_edges = |ids: &[EdgeId]| -> Vec<EdgeId> {
            ids.iter().filter_map(|e| edge_map[e.index()]).collect()
        };

        let old_nodes = std::mem::take(&mut self.nodes);
        let old_edges = std::mem::take(&mut self.edges);
        self.node_index = HashMap::with_capacity(old_nodes.len());
        self.edge_index = HashMap::with_capacity(old_edges.len());

        for (old, mut node) in old_nodes.into_iter().enumerate() {
            let Some(id) = node_map[old] else { continue };
            node.children = remap_edges(&node.children);
            node.parents = remap_edges(&node.parents);
            self.node_index.insert(node.key.clone(), id);
            self.nodes.push(node);
        }

        for (old, mut edge) in old_edges.into_iter().enumerate() {
            let Some(id) = edge_map[old] else { continue };
            match (remap_node(edge.source), remap_node(edge.target)) {
                (Some(source), Some(target)) => {
                    edge.source = source;
                    edge.target = target;
                }
                _ => {
                    return Err(GraphError::InvariantViolation(format!(
                        "edge {} survived pruning without its endpoints",
                        id
                    )))
                }
            }
            self.edge_index.insert((edge.source, edge.action.clone()), id);
            self.edges.push(edge);
        }

        remap_node(new_root).ok_or(GraphError::UnknownNode(new_root))
    }
}
