//! Watch mode: filesystem events in, superseding builds out

pub mod service;
pub mod watcher;

pub use service::WatchService;
pub use watcher::{FileWatcher, PathFilter, WatchEvent};
