//! Orchestrates incremental builds

use crate::assemble::{assemble, assemble_upstream_downstream};
use crate::host::{
    GraphSink, LayoutEngine, NoLayout, NullSink, ProgressSink, ScopeResolver, SourceAnalyzer,
    UnitEnumerator, VersionOracle,
};
use crate::progress::NoProgress;
use crate::recompute::{Cancelled, IncrementalRecomputer};
use callweave_core::{
    AnalysisFailure, BuildError, CancelToken, Graph, InconsistentScopeRequest, Snapshot,
    SnapshotStore, ViewScope, classify, invalidate,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Lifecycle of one build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Running,
    Committed,
    Cancelled,
}

/// What a build asks for.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub scope: ViewScope,
}

impl BuildRequest {
    pub fn new(scope: ViewScope) -> Self {
        BuildRequest { scope }
    }
}

/// Counters describing what a build had to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub units: usize,
    pub new_units: usize,
    pub changed_units: usize,
    pub removed_units: usize,
    pub reparsed_units: usize,
    pub valid_edges: usize,
    pub stale_edges: usize,
    pub fresh_edges: usize,
}

/// How a build ended.
#[derive(Debug)]
pub enum BuildOutcome {
    Committed {
        snapshot: Arc<Snapshot>,
        graph: Graph,
    },
    /// Superseded by a newer request; the previous snapshot stays current.
    Cancelled,
}

/// Everything a caller learns from one build.
#[derive(Debug)]
pub struct BuildReport {
    pub id: u64,
    pub outcome: BuildOutcome,
    pub stats: BuildStats,
    pub failures: Vec<AnalysisFailure>,
    pub scope_warning: Option<InconsistentScopeRequest>,
}

impl BuildReport {
    fn cancelled(id: u64, stats: BuildStats) -> Self {
        BuildReport {
            id,
            outcome: BuildOutcome::Cancelled,
            stats,
            failures: Vec::new(),
            scope_warning: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Committed { .. })
    }

    pub fn graph(&self) -> Option<&Graph> {
        match &self.outcome {
            BuildOutcome::Committed { graph, .. } => Some(graph),
            BuildOutcome::Cancelled => None,
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match &self.outcome {
            BuildOutcome::Committed { snapshot, .. } => Some(snapshot),
            BuildOutcome::Cancelled => None,
        }
    }
}

/// The host capabilities a coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub enumerator: Arc<dyn UnitEnumerator>,
    pub oracle: Arc<dyn VersionOracle>,
    pub analyzer: Arc<dyn SourceAnalyzer>,
    pub resolver: Arc<dyn ScopeResolver>,
    pub progress: Arc<dyn ProgressSink>,
    pub layout: Arc<dyn LayoutEngine>,
    pub sink: Arc<dyn GraphSink>,
}

impl Collaborators {
    /// Collaborators with no progress reporting, no layout and no sink.
    pub fn new(
        enumerator: Arc<dyn UnitEnumerator>,
        oracle: Arc<dyn VersionOracle>,
        analyzer: Arc<dyn SourceAnalyzer>,
        resolver: Arc<dyn ScopeResolver>,
    ) -> Self {
        Collaborators {
            enumerator,
            oracle,
            analyzer,
            resolver,
            progress: Arc::new(NoProgress),
            layout: Arc::new(NoLayout),
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_layout(mut self, layout: Arc<dyn LayoutEngine>) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn GraphSink>) -> Self {
        self.sink = sink;
        self
    }
}

struct InFlight {
    id: u64,
    cancel: CancelToken,
}

/// Sequences change detection, invalidation, recomputation, commit and
/// graph assembly. A new request cancels the one in flight; only one commit
/// runs at a time.
pub struct BuildCoordinator {
    parts: Collaborators,
    store: Arc<SnapshotStore>,
    pool: Option<rayon::ThreadPool>,
    in_flight: Mutex<Option<InFlight>>,
    last_state: Mutex<BuildState>,
    next_id: AtomicU64,
}

impl BuildCoordinator {
    pub fn new(parts: Collaborators) -> Self {
        Self::with_store(parts, Arc::new(SnapshotStore::new()))
    }

    /// Share an existing store, e.g. one seeded from the on-disk cache.
    pub fn with_store(parts: Collaborators, store: Arc<SnapshotStore>) -> Self {
        BuildCoordinator {
            parts,
            store,
            pool: None,
            in_flight: Mutex::new(None),
            last_state: Mutex::new(BuildState::Idle),
            next_id: AtomicU64::new(1),
        }
    }

    /// Extract on a dedicated pool of `workers` threads.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("callweave-extract-{i}"))
            .build()
            .map_err(|e| BuildError::WorkerPool(e.to_string()))?;
        self.pool = Some(pool);
        Ok(self)
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    /// State of the most recent build.
    pub fn state(&self) -> BuildState {
        *self.last_state.lock()
    }

    /// Cancel whatever build is running, if any. The build stays registered
    /// until it returns, so its final state is still recorded.
    pub fn cancel_running(&self) {
        if let Some(running) = self.in_flight.lock().as_ref() {
            debug!("Cancelling build #{}", running.id);
            running.cancel.cancel();
        }
    }

    fn begin(&self) -> (u64, CancelToken) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancelToken::new();
        let previous = self.in_flight.lock().replace(InFlight {
            id,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            info!("Build #{} superseded by build #{}", previous.id, id);
            previous.cancel.cancel();
        }
        *self.last_state.lock() = BuildState::Running;
        (id, cancel)
    }

    fn finish(&self, id: u64, state: BuildState) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.as_ref().is_some_and(|running| running.id == id) {
            *in_flight = None;
            *self.last_state.lock() = state;
        }
    }

    /// Run one build to completion or cancellation.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport, BuildError> {
        let (id, cancel) = self.begin();
        let result = self.run(id, request, &cancel);
        let state = match &result {
            Ok(report) if report.is_committed() => BuildState::Committed,
            Ok(_) => BuildState::Cancelled,
            Err(_) => BuildState::Idle,
        };
        self.finish(id, state);
        result
    }

    fn run(&self, id: u64, request: &BuildRequest, cancel: &CancelToken) -> Result<BuildReport, BuildError> {
        let parts = &self.parts;
        let baseline = self.store.current();
        info!("Build #{} started from generation {}", id, baseline.generation);

        let all_units = parts.enumerator.all_units().map_err(BuildError::Enumeration)?;
        let classification = classify(&all_units, &baseline.versions, &baseline.failed, |unit| {
            parts.oracle.version_of(unit).map_err(|source| BuildError::Version {
                unit: unit.clone(),
                source,
            })
        })?;

        let invalidation = invalidate(
            &baseline.edges,
            &classification.invalidated(),
            &classification.new,
            &all_units,
        );

        let mut stats = BuildStats {
            units: all_units.len(),
            new_units: classification.new.len(),
            changed_units: classification.changed.len(),
            removed_units: classification.removed.len(),
            reparsed_units: invalidation.units_to_reparse.len(),
            valid_edges: invalidation.valid.len(),
            stale_edges: invalidation.stale.len(),
            fresh_edges: 0,
        };
        info!(
            "Build #{}: {} unit(s), {} new, {} changed, {} removed, {} to reparse, {} stale edge(s)",
            id,
            stats.units,
            stats.new_units,
            stats.changed_units,
            stats.removed_units,
            stats.reparsed_units,
            stats.stale_edges
        );

        let mut recomputer = IncrementalRecomputer::new(parts.analyzer.as_ref(), parts.progress.as_ref());
        if let Some(pool) = &self.pool {
            recomputer = recomputer.with_pool(pool);
        }

        let recomputed = match recomputer.recompute(
            &invalidation.units_to_reparse,
            invalidation.valid,
            classification.current_versions,
            cancel,
        ) {
            Ok(recomputed) => recomputed,
            Err(Cancelled) => {
                info!("Build #{} cancelled during extraction", id);
                return Ok(BuildReport::cancelled(id, stats));
            }
        };
        stats.fresh_edges = recomputed.fresh_edges;
        if recomputed.dropped_edges > 0 {
            debug!(
                "Build #{}: dropped {} edge(s) into units outside the project",
                id, recomputed.dropped_edges
            );
        }

        let (snapshot, failures) = match IncrementalRecomputer::commit(recomputed, &self.store, cancel) {
            Ok(committed) => committed,
            Err(Cancelled) => {
                info!("Build #{} cancelled before commit", id);
                return Ok(BuildReport::cancelled(id, stats));
            }
        };
        for failure in &failures {
            warn!("{}", failure);
        }

        let (scoped_units, scope_warning) = self.resolve_scope(&request.scope, &all_units)?;
        let scoped_methods = parts
            .resolver
            .methods_in_scope(&scoped_units)
            .map_err(BuildError::Scope)?;
        let assembled = match &request.scope {
            ViewScope::UpstreamDownstream(selector) => {
                let focus: Vec<_> = scoped_methods
                    .into_iter()
                    .filter(|method| method.matches(selector))
                    .collect();
                if focus.is_empty() {
                    warn!("Build #{}: no method matches '{}'", id, selector);
                }
                assemble_upstream_downstream(&focus, &snapshot)
            }
            _ => assemble(&scoped_methods, &snapshot),
        };
        let graph = parts.layout.layout(assembled);

        // A newer build owns the presentation surface once it has started.
        if cancel.is_cancelled() {
            debug!("Build #{} committed but superseded before presentation", id);
        } else {
            parts.sink.reset(&graph);
        }

        info!(
            "Build #{} committed generation {}: {} edge(s), graph {} node(s) / {} edge(s)",
            id,
            snapshot.generation,
            snapshot.edges.len(),
            graph.node_count(),
            graph.edge_count()
        );

        Ok(BuildReport {
            id,
            outcome: BuildOutcome::Committed { snapshot, graph },
            stats,
            failures,
            scope_warning,
        })
    }

    /// Units of the requested scope that the project actually contains.
    fn resolve_scope(
        &self,
        scope: &ViewScope,
        all_units: &BTreeSet<callweave_core::UnitId>,
    ) -> Result<(BTreeSet<callweave_core::UnitId>, Option<InconsistentScopeRequest>), BuildError> {
        let requested = self
            .parts
            .enumerator
            .units_in_scope(scope)
            .map_err(BuildError::Scope)?;
        let (known, unknown): (BTreeSet<_>, BTreeSet<_>) =
            requested.into_iter().partition(|unit| all_units.contains(unit));

        let warning = if unknown.is_empty() {
            None
        } else {
            let warning = InconsistentScopeRequest {
                unknown: unknown.into_iter().collect(),
            };
            warn!("{} ({})", warning, scope);
            Some(warning)
        };
        Ok((known, warning))
    }
}
