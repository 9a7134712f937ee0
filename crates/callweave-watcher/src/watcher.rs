//! Filesystem watcher implementation

use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Decides which paths are worth a rebuild.
pub type PathFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Removed(path) => path,
        }
    }
}

/// File system watcher for monitoring source changes
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a watcher for `root_path` that only forwards paths accepted
    /// by `filter`.
    pub fn new(root_path: impl AsRef<Path>, filter: PathFilter) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => Self::handle_notify_event(event, &filter, &event_tx),
                Err(e) => error!("File system watch error: {}", e),
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            root_path,
        })
    }

    fn handle_notify_event(event: notify::Event, filter: &PathFilter, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let wrap: fn(PathBuf) -> WatchEvent = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        for path in event.paths {
            if !filter(&path) {
                continue;
            }
            debug!("File system event: {:?} {}", event.kind, path.display());
            if let Err(e) = event_tx.send(wrap(path)) {
                warn!("Failed to forward watch event: {}", e);
            }
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Watching directory: {}", path.display());

        self.watcher.watch(path, RecursiveMode::Recursive)?;
        Ok(())
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }
}
