//! Committed cache state and its single-writer store

use crate::model::{DependencyEdge, UnitId, VersionToken};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The last fully computed edge set together with the unit versions it was
/// computed from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Commit counter; 0 is the empty initial snapshot.
    pub generation: u64,
    pub edges: BTreeSet<DependencyEdge>,
    pub versions: BTreeMap<UnitId, VersionToken>,
    /// Units whose extraction failed in the round that produced this
    /// snapshot. They are extracted again on the next build.
    pub failed: BTreeSet<UnitId>,
}

impl Snapshot {
    pub fn new(edges: BTreeSet<DependencyEdge>, versions: BTreeMap<UnitId, VersionToken>) -> Self {
        Snapshot {
            generation: 0,
            edges,
            versions,
            failed: BTreeSet::new(),
        }
    }

    pub fn with_failed(mut self, failed: BTreeSet<UnitId>) -> Self {
        self.failed = failed;
        self
    }

    /// Edges whose endpoint units are missing from `versions`.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(move |e| {
            !self.versions.contains_key(&e.caller.unit) || !self.versions.contains_key(&e.callee.unit)
        })
    }

    /// Whether every edge's endpoint units are recorded in `versions`.
    pub fn is_self_consistent(&self) -> bool {
        self.dangling_edges().next().is_none()
    }
}

/// Cooperative cancellation flag shared between a build and whoever may
/// supersede it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Holds the current snapshot. Readers clone an `Arc` and never see a
/// partially written state; writers replace the whole value under the commit
/// lock.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    commit_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously persisted snapshot.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        SnapshotStore {
            current: RwLock::new(Arc::new(snapshot)),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current snapshot unless `cancel` has fired. The check and
    /// the swap happen under the commit lock, so a build cancelled before it
    /// reaches this point can never overwrite a newer one.
    pub fn commit(&self, mut snapshot: Snapshot, cancel: &CancelToken) -> Option<Arc<Snapshot>> {
        let _guard = self.commit_lock.lock();
        if cancel.is_cancelled() {
            return None;
        }
        snapshot.generation = self.current.read().generation + 1;
        let committed = Arc::new(snapshot);
        *self.current.write() = Arc::clone(&committed);
        tracing::debug!(
            generation = committed.generation,
            edges = committed.edges.len(),
            units = committed.versions.len(),
            "Snapshot committed"
        );
        Some(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_bumps_generation() {
        let store = SnapshotStore::new();
        assert_eq!(store.current().generation, 0);

        let cancel = CancelToken::new();
        let first = store.commit(Snapshot::default(), &cancel).unwrap();
        assert_eq!(first.generation, 1);
        let second = store.commit(Snapshot::default(), &cancel).unwrap();
        assert_eq!(second.generation, 2);
        assert_eq!(store.current().generation, 2);
    }

    #[test]
    fn test_cancelled_commit_keeps_previous() {
        let store = SnapshotStore::new();
        let mut versions = BTreeMap::new();
        versions.insert(UnitId::new("A.java"), VersionToken(1));
        store
            .commit(Snapshot::new(BTreeSet::new(), versions), &CancelToken::new())
            .unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(store.commit(Snapshot::default(), &cancel).is_none());

        let current = store.current();
        assert_eq!(current.generation, 1);
        assert_eq!(current.versions.len(), 1);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let store = SnapshotStore::new();
        let before = store.current();
        store.commit(Snapshot::default(), &CancelToken::new()).unwrap();
        assert_eq!(before.generation, 0);
        assert_eq!(store.current().generation, 1);
    }
}
