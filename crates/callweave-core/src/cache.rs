//! On-disk persistence of the committed snapshot

use crate::error::CacheError;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cache directory: .callweave/
pub const CACHE_DIR: &str = ".callweave";

/// Snapshot payload file
pub const SNAPSHOT_CACHE: &str = "snapshot.bin";

/// Metadata marker written next to the payload
pub const SNAPSHOT_META: &str = "snapshot.json";

/// Describes the payload so stale caches from another build of the tool are
/// ignored instead of misread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub version: String,
    pub generation: u64,
    pub edge_count: usize,
    pub unit_count: usize,
    pub cached_at: String,
}

/// Get cache directory path
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

/// Get snapshot payload path
pub fn snapshot_cache_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(SNAPSHOT_CACHE)
}

fn meta_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(SNAPSHOT_META)
}

/// Ensure cache directory exists
pub fn ensure_cache_dir(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if !cache.exists() {
        std::fs::create_dir_all(&cache)?;
    }
    Ok(())
}

/// Persist a committed snapshot. The payload is written to a temporary file
/// and renamed so a crash never leaves a half-written cache behind.
pub fn save_snapshot(snapshot: &Snapshot, root: &Path) -> Result<(), CacheError> {
    ensure_cache_dir(root)?;

    let payload = bincode::serialize(snapshot)?;
    let path = snapshot_cache_path(root);
    let tmp = path.with_extension("bin.tmp");
    std::fs::write(&tmp, payload)?;
    std::fs::rename(&tmp, &path)?;

    let meta = CacheMeta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        generation: snapshot.generation,
        edge_count: snapshot.edges.len(),
        unit_count: snapshot.versions.len(),
        cached_at: chrono::Utc::now().to_rfc3339(),
    };
    std::fs::write(meta_path(root), serde_json::to_string_pretty(&meta)?)?;

    tracing::debug!("Snapshot cache saved: {}", path.display());
    Ok(())
}

/// Load the cached snapshot, if there is a usable one.
pub fn load_snapshot(root: &Path) -> Result<Option<Snapshot>, CacheError> {
    let path = snapshot_cache_path(root);
    let meta_path = meta_path(root);
    if !path.exists() || !meta_path.exists() {
        return Ok(None);
    }

    let meta: CacheMeta = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)?;
    if meta.version != env!("CARGO_PKG_VERSION") {
        tracing::info!(
            "Ignoring snapshot cache written by v{} (running v{})",
            meta.version,
            env!("CARGO_PKG_VERSION")
        );
        return Ok(None);
    }

    let snapshot: Snapshot = bincode::deserialize(&std::fs::read(&path)?)?;
    tracing::debug!(
        "Snapshot cache loaded from {} (generation {}, {} edges)",
        path.display(),
        snapshot.generation,
        snapshot.edges.len()
    );
    Ok(Some(snapshot))
}

/// Clear cache directory
pub fn clear_cache(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if cache.exists() {
        std::fs::remove_dir_all(&cache)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyEdge, Method, UnitId, VersionToken};
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_missing_cache_loads_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_snapshot(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_saved_snapshot_is_restored() {
        let dir = TempDir::new().unwrap();
        let a = Arc::new(Method::new(UnitId::new("A.java"), "A", "a", vec![]));
        let b = Arc::new(Method::new(UnitId::new("B.java"), "B", "b", vec![]));
        let mut versions = BTreeMap::new();
        versions.insert(a.unit.clone(), VersionToken(1));
        versions.insert(b.unit.clone(), VersionToken(2));
        let mut snapshot = Snapshot::new(BTreeSet::from([DependencyEdge::new(a, b)]), versions)
            .with_failed(BTreeSet::from([UnitId::new("B.java")]));
        snapshot.generation = 4;

        save_snapshot(&snapshot, dir.path()).unwrap();
        let restored = load_snapshot(dir.path()).unwrap().unwrap();

        assert_eq!(restored.generation, 4);
        assert_eq!(restored.edges, snapshot.edges);
        assert_eq!(restored.versions, snapshot.versions);
        assert_eq!(restored.failed, snapshot.failed);

        clear_cache(dir.path()).unwrap();
        assert!(!cache_dir(dir.path()).exists());
    }
}
