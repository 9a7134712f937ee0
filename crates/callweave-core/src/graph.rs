//! Call graph wrapper using petgraph::StableDiGraph keyed by MethodId

use crate::model::*;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Normalized layout coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A method node, optionally positioned by a layout engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub method: Arc<Method>,
    pub position: Option<Position>,
}

/// The call graph handed to layout and presentation.
///
/// Nodes are unique per [`MethodId`] and edges unique per (caller, callee)
/// pair; adding either twice is a no-op.
pub struct Graph {
    inner: StableDiGraph<GraphNode, ()>,
    index: HashMap<MethodId, NodeIndex>,
    edge_pairs: HashSet<(MethodId, MethodId)>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
            edge_pairs: HashSet::new(),
        }
    }

    /// Add a method node if it is not present yet. Returns its index.
    pub fn add_node(&mut self, method: Arc<Method>) -> NodeIndex {
        if let Some(&idx) = self.index.get(&method.id) {
            return idx;
        }
        let id = method.id;
        let idx = self.inner.add_node(GraphNode {
            method,
            position: None,
        });
        self.index.insert(id, idx);
        idx
    }

    /// Add a caller → callee edge, adding missing endpoints first.
    /// Returns false when the pair was already present.
    pub fn add_edge(&mut self, edge: &DependencyEdge) -> bool {
        let caller = self.add_node(Arc::clone(&edge.caller));
        let callee = self.add_node(Arc::clone(&edge.callee));
        if !self.edge_pairs.insert((edge.caller.id, edge.callee.id)) {
            return false;
        }
        self.inner.add_edge(caller, callee, ());
        true
    }

    /// Get a node by method id.
    pub fn node(&self, id: MethodId) -> Option<&GraphNode> {
        self.index.get(&id).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn contains(&self, id: MethodId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn has_edge_between(&self, caller: MethodId, callee: MethodId) -> bool {
        self.edge_pairs.contains(&(caller, callee))
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes.
    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges as (caller, callee) node pairs.
    pub fn all_edges(&self) -> impl Iterator<Item = (&GraphNode, &GraphNode)> {
        self.inner.edge_indices().filter_map(move |e| {
            let (source, target) = self.inner.edge_endpoints(e)?;
            Some((self.inner.node_weight(source)?, self.inner.node_weight(target)?))
        })
    }

    /// Methods called by `id`.
    pub fn callees(&self, id: MethodId) -> Vec<&GraphNode> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Methods calling `id`.
    pub fn callers(&self, id: MethodId) -> Vec<&GraphNode> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: MethodId, direction: Direction) -> Vec<&GraphNode> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        self.inner
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.inner.node_weight(n))
            .collect()
    }

    /// Set the layout position of a node.
    pub fn set_position(&mut self, id: MethodId, position: Position) -> bool {
        let Some(&idx) = self.index.get(&id) else {
            return false;
        };
        match self.inner.node_weight_mut(idx) {
            Some(node) => {
                node.position = Some(position);
                true
            }
            None => false,
        }
    }

    /// Borrow the underlying petgraph structure for algorithms.
    pub fn inner(&self) -> &StableDiGraph<GraphNode, ()> {
        &self.inner
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
