//! Change detection over source units

use crate::model::{UnitId, VersionToken};
use std::collections::{BTreeMap, BTreeSet};

/// How the current enumeration relates to the last committed version map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Enumerated but never seen before.
    pub new: BTreeSet<UnitId>,
    /// Seen before with a different token, or failed to extract last time.
    pub changed: BTreeSet<UnitId>,
    /// Seen before with the same token.
    pub unchanged: BTreeSet<UnitId>,
    /// Seen before but no longer enumerated.
    pub removed: BTreeSet<UnitId>,
    /// Token of every enumerated unit, read exactly once.
    pub current_versions: BTreeMap<UnitId, VersionToken>,
}

impl Classification {
    /// Units whose edges can no longer be trusted: changed plus removed.
    pub fn invalidated(&self) -> BTreeSet<UnitId> {
        self.changed.union(&self.removed).cloned().collect()
    }

    pub fn is_clean(&self) -> bool {
        self.new.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Classify `all_units` against `previous`, asking `version_of` for each
/// unit's current token. Units in `failed` count as changed even when their
/// token is the same.
pub fn classify<E>(
    all_units: &BTreeSet<UnitId>,
    previous: &BTreeMap<UnitId, VersionToken>,
    failed: &BTreeSet<UnitId>,
    mut version_of: impl FnMut(&UnitId) -> Result<VersionToken, E>,
) -> Result<Classification, E> {
    let mut result = Classification::default();

    for unit in all_units {
        let token = version_of(unit)?;
        match previous.get(unit) {
            None => {
                result.new.insert(unit.clone());
            }
            Some(seen) if *seen != token || failed.contains(unit) => {
                result.changed.insert(unit.clone());
            }
            Some(_) => {
                result.unchanged.insert(unit.clone());
            }
        }
        result.current_versions.insert(unit.clone(), token);
    }

    result.removed = previous
        .keys()
        .filter(|unit| !all_units.contains(*unit))
        .cloned()
        .collect();

    Ok(result)
}
