//! Layered left-to-right layout

use crate::host::LayoutEngine;
use callweave_core::{Graph, MethodId, Position};
use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

/// Ranks nodes by longest call chain from an entry point (callers left of
/// callees), orders each rank by method name and normalizes coordinates to
/// `[0, x_ratio] x [0, y_ratio]`. Call cycles share one rank.
#[derive(Debug, Clone, Copy)]
pub struct LayeredLayout {
    pub x_ratio: f32,
    pub y_ratio: f32,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        LayeredLayout {
            x_ratio: 1.0,
            y_ratio: 2.0,
        }
    }
}

impl LayeredLayout {
    pub fn new(x_ratio: f32, y_ratio: f32) -> Self {
        LayeredLayout { x_ratio, y_ratio }
    }

    /// Rank of every node.
    fn ranks(graph: &Graph) -> HashMap<NodeIndex, usize> {
        let inner = graph.inner();
        // Components come out in reverse topological order.
        let components = tarjan_scc(inner);
        let component_of: HashMap<NodeIndex, usize> = components
            .iter()
            .enumerate()
            .flat_map(|(i, nodes)| nodes.iter().map(move |&n| (n, i)))
            .collect();

        let mut component_rank = vec![0usize; components.len()];
        for (i, nodes) in components.iter().enumerate().rev() {
            let rank = nodes
                .iter()
                .flat_map(|&n| inner.neighbors_directed(n, Direction::Incoming))
                .filter_map(|pred| component_of.get(&pred).copied())
                .filter(|&c| c != i)
                .map(|c| component_rank[c] + 1)
                .max()
                .unwrap_or(0);
            component_rank[i] = rank;
        }

        component_of
            .into_iter()
            .map(|(n, c)| (n, component_rank[c]))
            .collect()
    }
}

impl LayoutEngine for LayeredLayout {
    fn layout(&self, mut graph: Graph) -> Graph {
        let ranks = Self::ranks(&graph);
        let mut columns: BTreeMap<usize, Vec<(String, MethodId)>> = BTreeMap::new();
        for (idx, rank) in &ranks {
            if let Some(node) = graph.inner().node_weight(*idx) {
                columns
                    .entry(*rank)
                    .or_default()
                    .push((node.method.name.clone(), node.method.id));
            }
        }

        let max_rank = columns.keys().next_back().copied().unwrap_or(0);
        for (rank, column) in &mut columns {
            column.sort();
            let x = if max_rank == 0 {
                0.0
            } else {
                self.x_ratio * *rank as f32 / max_rank as f32
            };
            let rows = column.len();
            for (row, (_, id)) in column.iter().enumerate() {
                let y = if rows <= 1 {
                    0.0
                } else {
                    self.y_ratio * row as f32 / (rows - 1) as f32
                };
                graph.set_position(*id, Position { x, y });
            }
        }

        graph
    }
}
