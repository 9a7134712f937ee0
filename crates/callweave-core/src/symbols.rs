//! Symbol table for cross-unit call resolution

use crate::model::{Method, UnitId, VersionToken};
use dashmap::DashMap;
use std::sync::Arc;

/// Declared methods indexed by simple name. Thread-safe for concurrent access
/// from extraction workers.
pub struct SymbolTable {
    by_name: DashMap<String, Vec<Arc<Method>>>,
    /// Unit -> version the declarations were read at, plus its methods
    unit_methods: DashMap<UnitId, (VersionToken, Vec<Arc<Method>>)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            by_name: DashMap::new(),
            unit_methods: DashMap::new(),
        }
    }

    /// Replace the declarations of `unit`.
    pub fn replace_unit(&self, unit: &UnitId, version: VersionToken, methods: Vec<Arc<Method>>) {
        self.remove_unit(unit);
        for method in &methods {
            self.by_name
                .entry(method.name.clone())
                .or_default()
                .push(Arc::clone(method));
        }
        self.unit_methods.insert(unit.clone(), (version, methods));
    }

    /// Version the stored declarations of `unit` were read at.
    pub fn version_of(&self, unit: &UnitId) -> Option<VersionToken> {
        self.unit_methods.get(unit).map(|r| r.value().0)
    }

    /// All methods named `name`, across units.
    pub fn lookup(&self, name: &str) -> Vec<Arc<Method>> {
        self.by_name
            .get(name)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Methods declared in `unit`.
    pub fn methods_in_unit(&self, unit: &UnitId) -> Vec<Arc<Method>> {
        self.unit_methods
            .get(unit)
            .map(|r| r.value().1.clone())
            .unwrap_or_default()
    }

    /// Remove all declarations of a unit.
    pub fn remove_unit(&self, unit: &UnitId) {
        if let Some((_, (_, methods))) = self.unit_methods.remove(unit) {
            for method in methods {
                if let Some(mut entry) = self.by_name.get_mut(&method.name) {
                    entry.retain(|m| m.id != method.id);
                }
                self.by_name.remove_if(&method.name, |_, v| v.is_empty());
            }
        }
    }

    /// Units with stored declarations.
    pub fn units(&self) -> Vec<UnitId> {
        self.unit_methods.iter().map(|r| r.key().clone()).collect()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
