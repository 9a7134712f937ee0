//! Wires a Java project, the snapshot cache and a build coordinator together

use crate::config::CallweaveConfig;
use anyhow::Result;
use callweave_core::{BuildError, CacheError, SnapshotStore, load_snapshot, save_snapshot};
use callweave_engine::{
    BuildCoordinator, BuildReport, BuildRequest, Collaborators, GraphSink, ProgressSink,
};
use callweave_java::{JavaAnalyzer, JavaProject};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One project opened for building. The coordinator starts from the cached
/// snapshot when a usable one exists.
pub struct Session {
    root: PathBuf,
    project: Arc<JavaProject>,
    coordinator: Arc<BuildCoordinator>,
}

impl Session {
    pub fn open(
        root: &Path,
        config: &CallweaveConfig,
        progress: Option<Arc<dyn ProgressSink>>,
        sink: Option<Arc<dyn GraphSink>>,
    ) -> Result<Self> {
        let project = Arc::new(JavaProject::open(root)?.with_excludes(&config.scope.exclude)?);
        let analyzer = Arc::new(JavaAnalyzer::new(project.clone()));

        let store = match load_snapshot(root) {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    "Resuming from cached snapshot (generation {}, {} edges)",
                    snapshot.generation,
                    snapshot.edges.len()
                );
                SnapshotStore::with_snapshot(snapshot)
            }
            Ok(None) => SnapshotStore::new(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable snapshot cache: {}", e);
                SnapshotStore::new()
            }
        };

        let mut parts = Collaborators::new(project.clone(), project.clone(), analyzer.clone(), analyzer)
            .with_layout(Arc::new(config.layout()));
        if let Some(progress) = progress {
            parts = parts.with_progress(progress);
        }
        if let Some(sink) = sink {
            parts = parts.with_sink(sink);
        }

        let mut coordinator = BuildCoordinator::with_store(parts, Arc::new(store));
        if let Some(workers) = config.build.workers {
            coordinator = coordinator.with_workers(workers)?;
        }

        Ok(Session {
            root: root.to_path_buf(),
            project,
            coordinator: Arc::new(coordinator),
        })
    }

    pub fn project(&self) -> &Arc<JavaProject> {
        &self.project
    }

    pub fn coordinator(&self) -> &Arc<BuildCoordinator> {
        &self.coordinator
    }

    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport, BuildError> {
        self.coordinator.build(request)
    }

    /// Write the current snapshot to the cache.
    pub fn persist(&self) -> Result<(), CacheError> {
        save_snapshot(&self.coordinator.snapshot(), &self.root)
    }
}
