//! Incremental build engine: recomputation, graph assembly, layout and the
//! build coordinator

pub mod assemble;
pub mod coordinator;
pub mod host;
pub mod layout;
pub mod progress;
pub mod recompute;


pub use assemble::{assemble, assemble_upstream_downstream};
pub use coordinator::{BuildCoordinator, BuildOutcome, BuildReport, BuildRequest, BuildState, BuildStats, Collaborators};
pub use host::{Extraction, GraphSink, LayoutEngine, ProgressSink, ScopeResolver, SourceAnalyzer, UnitEnumerator, VersionOracle};
pub use layout::LayeredLayout;
pub use progress::{LogProgress, NoProgress};
pub use recompute::{Cancelled, IncrementalRecomputer, Recomputed};
