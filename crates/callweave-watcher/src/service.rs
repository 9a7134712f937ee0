//! Rebuilds on every settled batch of source changes

use crate::watcher::{FileWatcher, PathFilter};
use anyhow::Result;
use callweave_core::BuildError;
use callweave_engine::{BuildCoordinator, BuildReport, BuildRequest};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Watches a project and asks the coordinator for a new build whenever the
/// filesystem settles. A new build supersedes the one still running.
pub struct WatchService {
    watcher: FileWatcher,
    coordinator: Arc<BuildCoordinator>,
    request: BuildRequest,
    debounce: Duration,
}

impl WatchService {
    pub fn new(root: impl AsRef<Path>, coordinator: Arc<BuildCoordinator>, filter: PathFilter) -> Result<Self> {
        Ok(WatchService {
            watcher: FileWatcher::new(root, filter)?,
            coordinator,
            request: BuildRequest::default(),
            debounce: Duration::from_millis(200),
        })
    }

    /// Quiet period that ends a batch.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_request(mut self, request: BuildRequest) -> Self {
        self.request = request;
        self
    }

    pub fn start_watching(&mut self) -> Result<()> {
        let root = self.watcher.root_path().to_path_buf();
        self.watcher.watch_directory(&root)?;
        info!("Started watching project directory: {}", root.display());
        Ok(())
    }

    /// Paths touched by the next batch of events, once no new event arrived
    /// for the debounce period. `None` once the watcher is gone.
    pub async fn next_batch(&mut self) -> Option<BTreeSet<PathBuf>> {
        let debounce = self.debounce;
        let events = self.watcher.event_receiver();

        let first = events.recv().await?;
        let mut batch = BTreeSet::from([first.path().to_path_buf()]);
        while let Ok(Some(event)) = tokio::time::timeout(debounce, events.recv()).await {
            batch.insert(event.path().to_path_buf());
        }
        debug!("Settled batch of {} changed path(s)", batch.len());
        Some(batch)
    }

    /// Start a build on the blocking pool.
    pub fn trigger(&self) -> JoinHandle<Result<BuildReport, BuildError>> {
        let coordinator = Arc::clone(&self.coordinator);
        let request = self.request.clone();
        tokio::task::spawn_blocking(move || coordinator.build(&request))
    }

    /// Build once, then rebuild after every batch until the watcher stops or
    /// `reports` is closed. Cancelled builds are not forwarded.
    pub async fn run(mut self, reports: mpsc::UnboundedSender<BuildReport>) -> Result<()> {
        self.start_watching()?;
        forward(self.trigger(), reports.clone());

        while let Some(batch) = self.next_batch().await {
            if reports.is_closed() {
                break;
            }
            info!("{} file(s) changed, rebuilding", batch.len());
            forward(self.trigger(), reports.clone());
        }

        self.coordinator.cancel_running();
        Ok(())
    }
}

fn forward(build: JoinHandle<Result<BuildReport, BuildError>>, reports: mpsc::UnboundedSender<BuildReport>) {
    tokio::spawn(async move {
        match build.await {
            Ok(Ok(report)) if report.is_committed() => {
                reports.send(report).ok();
            }
            Ok(Ok(report)) => debug!("Build #{} was superseded", report.id),
            Ok(Err(e)) => warn!("Build failed: {}", e),
            Err(e) => warn!("Build task panicked: {}", e),
        }
    });
}
