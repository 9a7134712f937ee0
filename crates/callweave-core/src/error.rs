//! Error taxonomy for builds

use crate::model::UnitId;
use thiserror::Error;

/// Extraction failed for one unit. Recovered locally: the unit contributes no
/// edges for the round and the failure is reported with the build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("analysis failed for {unit}: {reason}")]
pub struct AnalysisFailure {
    pub unit: UnitId,
    pub reason: String,
}

/// The viewing scope named units the project enumeration does not contain.
/// The build still runs with the units that do exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("viewing scope references {} unit(s) outside the project", .unknown.len())]
pub struct InconsistentScopeRequest {
    pub unknown: Vec<UnitId>,
}

/// Fatal build errors. None of them touch the committed snapshot.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to enumerate source units: {0:#}")]
    Enumeration(#[source] anyhow::Error),
    #[error("failed to read version of {unit}: {source:#}")]
    Version {
        unit: UnitId,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to resolve viewing scope: {0:#}")]
    Scope(#[source] anyhow::Error),
    #[error("failed to start extraction workers: {0}")]
    WorkerPool(String),
}

/// Snapshot cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt snapshot cache: {0}")]
    Decode(#[from] bincode::Error),
    #[error("invalid cache metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}
