//! Interfaces to the collaborators a build drives
//!
//! The engine never parses source, walks directories or draws anything by
//! itself. Hosts plug those capabilities in through the traits below; every
//! trait is object safe so a coordinator can hold them as `Arc<dyn _>`.

use anyhow::Result;
use callweave_core::{DependencyEdge, Graph, Method, UnitId, VersionToken, ViewScope};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Methods and raw edges extracted from one unit.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub methods: Vec<Arc<Method>>,
    pub edges: Vec<DependencyEdge>,
}

/// Reports the current version of a unit.
pub trait VersionOracle: Send + Sync {
    fn version_of(&self, unit: &UnitId) -> Result<VersionToken>;
}

/// Extracts declarations and call edges from source units.
pub trait SourceAnalyzer: Send + Sync {
    /// Methods declared in `unit`.
    fn methods_of(&self, unit: &UnitId) -> Result<Vec<Arc<Method>>>;

    /// Edges originating from `method`.
    fn dependencies_of(&self, method: &Arc<Method>) -> Result<Vec<DependencyEdge>>;

    /// Unit-batched extraction. Analyzers that parse a whole unit at once
    /// should override this.
    fn extract(&self, unit: &UnitId) -> Result<Extraction> {
        let methods = self.methods_of(unit)?;
        let mut edges = Vec::new();
        for method in &methods {
            edges.extend(self.dependencies_of(method)?);
        }
        Ok(Extraction { methods, edges })
    }
}

/// Lists the units of the project.
pub trait UnitEnumerator: Send + Sync {
    fn all_units(&self) -> Result<BTreeSet<UnitId>>;

    /// Units selected by a viewing scope. May name units the project does not
    /// contain; the coordinator reports and drops those.
    fn units_in_scope(&self, scope: &ViewScope) -> Result<BTreeSet<UnitId>>;
}

/// Decides which methods make up a viewing scope.
pub trait ScopeResolver: Send + Sync {
    fn methods_in_scope(&self, units: &BTreeSet<UnitId>) -> Result<Vec<Arc<Method>>>;
}

/// Observability only; never influences control flow.
pub trait ProgressSink: Send + Sync {
    fn reset(&self, total: usize);
    fn increment(&self);
}

/// Assigns node positions.
pub trait LayoutEngine: Send + Sync {
    fn layout(&self, graph: Graph) -> Graph;
}

/// Receives the finished graph.
pub trait GraphSink: Send + Sync {
    fn reset(&self, graph: &Graph);
}

/// Layout that leaves the graph as is.
pub struct NoLayout;

impl LayoutEngine for NoLayout {
    fn layout(&self, graph: Graph) -> Graph {
        graph
    }
}

/// Sink that drops every graph.
pub struct NullSink;

impl GraphSink for NullSink {
    fn reset(&self, _graph: &Graph) {}
}
