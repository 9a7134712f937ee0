//! Edge-level cache invalidation

use crate::model::{DependencyEdge, UnitId};
use std::collections::BTreeSet;

/// Result of splitting the prior edge set against a set of invalidated units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Edges with neither endpoint in an invalidated unit.
    pub valid: BTreeSet<DependencyEdge>,
    /// Edges dropped from the cache.
    pub stale: BTreeSet<DependencyEdge>,
    /// Units that must go through the analyzer again.
    pub units_to_reparse: BTreeSet<UnitId>,
}

/// Split `prior` into valid and stale edges.
///
/// An edge is stale when either its caller's or its callee's unit is in
/// `invalidated`. Every unit touched by a stale edge is reparsed together with
/// `new_units` and the invalidated units themselves, so a changed unit that had
/// no edges yet still gets its new call sites extracted. Units no longer in
/// `all_units` are left out since they have nothing left to extract.
pub fn invalidate(
    prior: &BTreeSet<DependencyEdge>,
    invalidated: &BTreeSet<UnitId>,
    new_units: &BTreeSet<UnitId>,
    all_units: &BTreeSet<UnitId>,
) -> Invalidation {
    let (stale, valid): (BTreeSet<_>, BTreeSet<_>) = prior.iter().cloned().partition(|edge| {
        invalidated.contains(&edge.caller.unit) || invalidated.contains(&edge.callee.unit)
    });

    let units_to_reparse = stale
        .iter()
        .flat_map(|edge| [&edge.caller.unit, &edge.callee.unit])
        .chain(new_units.iter())
        .chain(invalidated.iter())
        .filter(|unit| all_units.contains(*unit))
        .cloned()
        .collect();

    Invalidation {
        valid,
        stale,
        units_to_reparse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Method;
    use std::sync::Arc;

    fn method(unit: &str, name: &str) -> Arc<Method> {
        Arc::new(Method::new(UnitId::new(unit), unit.trim_end_matches(".java"), name, vec![]))
    }

    fn units(names: &[&str]) -> BTreeSet<UnitId> {
        names.iter().map(|n| UnitId::new(*n)).collect()
    }

    #[test]
    fn test_changed_callee_invalidates_both_sides() {
        let a = method("A.java", "a");
        let b = method("B.java", "b");
        let c = method("C.java", "c");
        let prior: BTreeSet<_> = [
            DependencyEdge::new(a.clone(), b.clone()),
            DependencyEdge::new(c.clone(), c.clone()),
        ]
        .into();

        let result = invalidate(
            &prior,
            &units(&["B.java"]),
            &BTreeSet::new(),
            &units(&["A.java", "B.java", "C.java"]),
        );

        assert_eq!(result.stale.len(), 1);
        assert!(result.valid.contains(&DependencyEdge::new(c.clone(), c)));
        assert_eq!(result.units_to_reparse, units(&["A.java", "B.java"]));
    }

    #[test]
    fn test_removed_unit_is_not_reparsed() {
        let a = method("A.java", "a");
        let b = method("B.java", "b");
        let prior: BTreeSet<_> = [DependencyEdge::new(a, b)].into();

        let result = invalidate(&prior, &units(&["B.java"]), &BTreeSet::new(), &units(&["A.java"]));

        assert!(result.valid.is_empty());
        assert_eq!(result.units_to_reparse, units(&["A.java"]));
    }

    #[test]
    fn test_new_units_join_reparse_set() {
        let result = invalidate(
            &BTreeSet::new(),
            &BTreeSet::new(),
            &units(&["N.java"]),
            &units(&["N.java"]),
        );
        assert_eq!(result.units_to_reparse, units(&["N.java"]));
    }
}
