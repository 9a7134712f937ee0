//! Projection of a committed snapshot onto a viewing scope

use callweave_core::{DependencyEdge, Graph, Method, MethodId, Snapshot};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Build the graph for `scoped_methods`.
///
/// Every scoped method becomes a node. Each snapshot edge with its caller or
/// its callee in scope is added together with both endpoints, so callers from
/// outside the scope show up as well. Snapshot edges are visited in identity
/// order, which makes node insertion order reproducible.
pub fn assemble(scoped_methods: &[Arc<Method>], snapshot: &Snapshot) -> Graph {
    let mut graph = Graph::new();
    let in_scope: HashSet<MethodId> = scoped_methods.iter().map(|m| m.id).collect();

    for method in scoped_methods {
        graph.add_node(Arc::clone(method));
    }

    for edge in &snapshot.edges {
        if in_scope.contains(&edge.caller.id) || in_scope.contains(&edge.callee.id) {
            graph.add_edge(edge);
        }
    }

    tracing::debug!(
        "Assembled graph: {} scoped method(s), {} node(s), {} edge(s)",
        in_scope.len(),
        graph.node_count(),
        graph.edge_count()
    );
    graph
}

/// Build the graph around `focus`: every method that transitively calls a
/// focus method and every method a focus method transitively calls, with the
/// edges along those chains. Callers of downstream methods and callees of
/// upstream methods are not followed.
pub fn assemble_upstream_downstream(focus: &[Arc<Method>], snapshot: &Snapshot) -> Graph {
    let mut by_callee: HashMap<MethodId, Vec<&DependencyEdge>> = HashMap::new();
    let mut by_caller: HashMap<MethodId, Vec<&DependencyEdge>> = HashMap::new();
    for edge in &snapshot.edges {
        by_callee.entry(edge.callee.id).or_default().push(edge);
        by_caller.entry(edge.caller.id).or_default().push(edge);
    }

    let mut chain = BTreeSet::new();
    follow(focus, &by_callee, |edge| edge.caller.id, &mut chain);
    follow(focus, &by_caller, |edge| edge.callee.id, &mut chain);

    let mut graph = Graph::new();
    for method in focus {
        graph.add_node(Arc::clone(method));
    }
    for edge in chain {
        graph.add_edge(edge);
    }

    tracing::debug!(
        "Assembled upstream/downstream graph: {} focus method(s), {} node(s), {} edge(s)",
        focus.len(),
        graph.node_count(),
        graph.edge_count()
    );
    graph
}

/// Walk `index` away from `focus`, collecting every edge passed.
fn follow<'s>(
    focus: &[Arc<Method>],
    index: &HashMap<MethodId, Vec<&'s DependencyEdge>>,
    next: impl Fn(&DependencyEdge) -> MethodId,
    chain: &mut BTreeSet<&'s DependencyEdge>,
) {
    let mut seen: HashSet<MethodId> = focus.iter().map(|m| m.id).collect();
    let mut pending: Vec<MethodId> = seen.iter().copied().collect();
    while let Some(id) = pending.pop() {
        for &edge in index.get(&id).into_iter().flatten() {
            chain.insert(edge);
            let reached = next(edge);
            if seen.insert(reached) {
                pending.push(reached);
            }
        }
    }
}
