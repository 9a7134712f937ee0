//! Selective re-extraction and merge-back

use crate::host::{ProgressSink, SourceAnalyzer};
use callweave_core::{
    AnalysisFailure, CancelToken, DependencyEdge, Snapshot, SnapshotStore, UnitId, VersionToken,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// A build was superseded before its result could be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Merged, not yet committed result of one recompute pass.
#[derive(Debug)]
pub struct Recomputed {
    pub snapshot: Snapshot,
    /// Distinct edges produced by this round's extraction.
    pub fresh_edges: usize,
    /// Extracted edges pointing at units outside the version map.
    pub dropped_edges: usize,
    pub failures: Vec<AnalysisFailure>,
}

/// Drives the analyzer over the units that need it and merges the result
/// with the edges that survived invalidation.
pub struct IncrementalRecomputer<'a> {
    analyzer: &'a dyn SourceAnalyzer,
    progress: &'a dyn ProgressSink,
    pool: Option<&'a rayon::ThreadPool>,
}

impl<'a> IncrementalRecomputer<'a> {
    pub fn new(analyzer: &'a dyn SourceAnalyzer, progress: &'a dyn ProgressSink) -> Self {
        IncrementalRecomputer {
            analyzer,
            progress,
            pool: None,
        }
    }

    /// Run extraction on a dedicated pool instead of rayon's global one.
    pub fn with_pool(mut self, pool: &'a rayon::ThreadPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Extract `units_to_reparse` and merge the fresh edges into `valid`.
    ///
    /// `versions` becomes the new snapshot's version map as is. Extraction
    /// order does not matter: results are merged by set union.
    pub fn recompute(
        &self,
        units_to_reparse: &BTreeSet<UnitId>,
        valid: BTreeSet<DependencyEdge>,
        versions: BTreeMap<UnitId, VersionToken>,
        cancel: &CancelToken,
    ) -> Result<Recomputed, Cancelled> {
        self.progress.reset(units_to_reparse.len());

        let extract_all = || {
            units_to_reparse
                .par_iter()
                .map(|unit| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let result = self.analyzer.extract(unit);
                    self.progress.increment();
                    Some((unit, result))
                })
                .collect::<Vec<_>>()
        };
        let results = match self.pool {
            Some(pool) => pool.install(extract_all),
            None => extract_all(),
        };

        if cancel.is_cancelled() {
            debug!("Recompute cancelled, discarding {} partial result(s)", results.len());
            return Err(Cancelled);
        }

        let mut fresh = BTreeSet::new();
        let mut failed = BTreeSet::new();
        let mut failures = Vec::new();
        let mut dropped_edges = 0;

        for (unit, result) in results.into_iter().flatten() {
            match result {
                Ok(extraction) => {
                    debug!(
                        "{}: {} method(s), {} edge(s)",
                        unit,
                        extraction.methods.len(),
                        extraction.edges.len()
                    );
                    for edge in extraction.edges {
                        if versions.contains_key(&edge.caller.unit)
                            && versions.contains_key(&edge.callee.unit)
                        {
                            fresh.insert(edge);
                        } else {
                            dropped_edges += 1;
                        }
                    }
                }
                Err(err) => {
                    warn!("Analysis failed for {}: {:#}", unit, err);
                    failed.insert(unit.clone());
                    failures.push(AnalysisFailure {
                        unit: unit.clone(),
                        reason: format!("{err:#}"),
                    });
                }
            }
        }

        let fresh_edges = fresh.len();
        let mut edges = valid;
        edges.extend(fresh);
        if !failed.is_empty() {
            // A failed unit contributes no outgoing edges this round.
            edges.retain(|edge| !failed.contains(&edge.caller.unit));
        }

        Ok(Recomputed {
            snapshot: Snapshot::new(edges, versions).with_failed(failed),
            fresh_edges,
            dropped_edges,
            failures,
        })
    }

    /// Publish `recomputed` unless the build was cancelled meanwhile.
    pub fn commit(
        recomputed: Recomputed,
        store: &SnapshotStore,
        cancel: &CancelToken,
    ) -> Result<(Arc<Snapshot>, Vec<AnalysisFailure>), Cancelled> {
        let Recomputed {
            snapshot, failures, ..
        } = recomputed;
        store
            .commit(snapshot, cancel)
            .map(|committed| (committed, failures))
            .ok_or(Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Extraction;
    use crate::progress::LogProgress;
    use crate::tests::{FakeAnalyzer, method};
    use callweave_core::Method;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Delays each unit so that later units finish first on a wide pool,
    /// recording the order in which extractions complete.
    struct Staggered {
        inner: FakeAnalyzer,
        delays: BTreeMap<UnitId, u64>,
        finished: Mutex<Vec<UnitId>>,
    }

    impl SourceAnalyzer for Staggered {
        fn methods_of(&self, unit: &UnitId) -> anyhow::Result<Vec<Arc<Method>>> {
            self.inner.methods_of(unit)
        }

        fn dependencies_of(&self, method: &Arc<Method>) -> anyhow::Result<Vec<DependencyEdge>> {
            self.inner.dependencies_of(method)
        }

        fn extract(&self, unit: &UnitId) -> anyhow::Result<Extraction> {
            if let Some(ms) = self.delays.get(unit) {
                std::thread::sleep(Duration::from_millis(*ms));
            }
            let result = self.inner.extract(unit);
            self.finished.lock().push(unit.clone());
            result
        }
    }

    #[test]
    fn test_merge_is_union_of_valid_and_fresh() {
        let a = method("A.java", "a");
        let b = method("B.java", "b");
        let c = method("C.java", "c");
        let analyzer = FakeAnalyzer::default();
        analyzer.set_edges("C.java", vec![(c.clone(), a.clone())]);

        let valid = BTreeSet::from([DependencyEdge::new(a.clone(), b.clone())]);
        let versions: BTreeMap<_, _> = ["A.java", "B.java", "C.java"]
            .iter()
            .map(|u| (UnitId::new(*u), VersionToken(1)))
            .collect();

        let progress = LogProgress::default();
        let recomputer = IncrementalRecomputer::new(&analyzer, &progress);
        let result = recomputer
            .recompute(
                &BTreeSet::from([UnitId::new("C.java")]),
                valid,
                versions,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(result.fresh_edges, 1);
        assert_eq!(result.snapshot.edges.len(), 2);
        assert!(result.snapshot.edges.contains(&DependencyEdge::new(a, b)));
        assert_eq!(progress.done(), 1);
    }

    #[test]
    fn test_cancelled_before_extraction() {
        let analyzer = FakeAnalyzer::default();
        let progress = LogProgress::default();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = IncrementalRecomputer::new(&analyzer, &progress).recompute(
            &BTreeSet::from([UnitId::new("A.java")]),
            BTreeSet::new(),
            BTreeMap::new(),
            &cancel,
        );

        assert_eq!(result.unwrap_err(), Cancelled);
        assert_eq!(analyzer.calls(), 0);
    }

    #[test]
    fn test_edges_to_unknown_units_are_dropped() {
        let a = method("A.java", "a");
        let lib = method("vendor/Lib.java", "lib");
        let analyzer = FakeAnalyzer::default();
        analyzer.set_edges("A.java", vec![(a.clone(), lib)]);

        let versions = BTreeMap::from([(UnitId::new("A.java"), VersionToken(1))]);
        let result = IncrementalRecomputer::new(&analyzer, &LogProgress::default())
            .recompute(
                &BTreeSet::from([UnitId::new("A.java")]),
                BTreeSet::new(),
                versions,
                &CancelToken::new(),
            )
            .unwrap();

        assert!(result.snapshot.edges.is_empty());
        assert_eq!(result.dropped_edges, 1);
        assert!(result.snapshot.is_self_consistent());
    }

    #[test]
    fn test_extraction_order_does_not_change_result() {
        let names = ["A.java", "B.java", "C.java", "D.java"];
        let (a, b, c, d) = (
            method("A.java", "a"),
            method("B.java", "b"),
            method("C.java", "c"),
            method("D.java", "d"),
        );
        let analyzer = || {
            let inner = FakeAnalyzer::default();
            // Overlapping outputs: A and D both report (a, b).
            inner.set_edges("A.java", vec![(a.clone(), b.clone()), (a.clone(), c.clone())]);
            inner.set_edges("B.java", vec![(b.clone(), c.clone())]);
            inner.set_edges("C.java", vec![(c.clone(), d.clone())]);
            inner.set_edges("D.java", vec![(d.clone(), a.clone()), (a.clone(), b.clone())]);
            inner.fail("C.java");
            inner
        };
        let all: BTreeSet<UnitId> = names.iter().map(|n| UnitId::new(*n)).collect();
        let versions: BTreeMap<_, _> = all.iter().map(|u| (u.clone(), VersionToken(1))).collect();
        let valid = BTreeSet::from([DependencyEdge::new(b.clone(), d.clone())]);
        let progress = LogProgress::default();

        let sequential_pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let in_order = Staggered {
            inner: analyzer(),
            delays: BTreeMap::new(),
            finished: Mutex::new(Vec::new()),
        };
        let first = IncrementalRecomputer::new(&in_order, &progress)
            .with_pool(&sequential_pool)
            .recompute(&all, valid.clone(), versions.clone(), &CancelToken::new())
            .unwrap();

        let wide_pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let reversed = Staggered {
            inner: analyzer(),
            delays: all.iter().zip([120, 80, 40, 0]).map(|(u, ms)| (u.clone(), ms)).collect(),
            finished: Mutex::new(Vec::new()),
        };
        let second = IncrementalRecomputer::new(&reversed, &progress)
            .with_pool(&wide_pool)
            .recompute(&all, valid, versions, &CancelToken::new())
            .unwrap();

        assert_eq!(*in_order.finished.lock(), all.iter().cloned().collect::<Vec<_>>());
        assert_eq!(first.snapshot.edges, second.snapshot.edges);
        assert_eq!(first.snapshot.failed, second.snapshot.failed);
        assert_eq!(first.fresh_edges, second.fresh_edges);
        assert_eq!(first.snapshot.edges.len(), 5);
    }
}
