//! Callweave Core: method/edge model, snapshot store, change detection and
//! invalidation

pub mod cache;
pub mod detect;
pub mod error;
pub mod graph;
pub mod invalidate;
pub mod model;
pub mod snapshot;
pub mod symbols;


pub use model::{UnitId, VersionToken, MethodId, Param, Method, DependencyEdge, ViewScope};
pub use graph::{Graph, GraphNode, Position};
pub use snapshot::{Snapshot, SnapshotStore, CancelToken};
pub use detect::{classify, Classification};
pub use invalidate::{invalidate, Invalidation};
pub use error::{AnalysisFailure, InconsistentScopeRequest, BuildError, CacheError};
pub use symbols::SymbolTable;
pub use cache::{CACHE_DIR, SNAPSHOT_CACHE, cache_dir, snapshot_cache_path, ensure_cache_dir, save_snapshot, load_snapshot, clear_cache};
