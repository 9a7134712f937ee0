//! Call extraction for Java sources

use crate::parser_pool::{ParseRequest, ParseResult, ParserPool, create_parser_pool};
use crate::project::JavaProject;
use crate::syntax::{CallSite, Receiver, call_sites, declarations};
use anyhow::{Context, Result};
use callweave_core::{DependencyEdge, Method, SymbolTable, UnitId, VersionToken};
use callweave_engine::{Extraction, ScopeResolver, SourceAnalyzer, UnitEnumerator, VersionOracle};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

fn last_segment(type_path: &str) -> &str {
    type_path.rsplit('.').next().unwrap_or(type_path)
}

/// Candidates passing `keep`, or all of them when none does.
fn narrowed(candidates: Vec<Arc<Method>>, keep: impl Fn(&Method) -> bool) -> Vec<Arc<Method>> {
    let kept: Vec<_> = candidates.iter().filter(|m| keep(m)).cloned().collect();
    if kept.is_empty() { candidates } else { kept }
}

/// Edges of one unit as last extracted.
struct UnitEdges {
    epoch: u64,
    version: VersionToken,
    edges: Vec<DependencyEdge>,
}

/// Resolves call sites by simple name and argument count against the
/// declarations of the whole project.
///
/// The declaration index is refreshed lazily: the first request after the
/// project was re-enumerated re-reads the declarations of every unit whose
/// version moved.
///
/// [`SourceAnalyzer::extract`] is the per-unit entry point builds use. The
/// per-method [`SourceAnalyzer::dependencies_of`] answers from the unit's last
/// extraction while neither the unit nor the declaration index has moved.
pub struct JavaAnalyzer {
    project: Arc<JavaProject>,
    parsers: ParserPool,
    symbols: SymbolTable,
    /// Project epoch the index was last brought up to date with
    synced_epoch: Mutex<u64>,
    extracted: Mutex<HashMap<UnitId, UnitEdges>>,
    parses: AtomicUsize,
}

impl JavaAnalyzer {
    pub fn new(project: Arc<JavaProject>) -> Self {
        Self::with_parsers(project, create_parser_pool())
    }

    pub fn with_parsers(project: Arc<JavaProject>, parsers: ParserPool) -> Self {
        JavaAnalyzer {
            project,
            parsers,
            symbols: SymbolTable::new(),
            synced_epoch: Mutex::new(0),
            extracted: Mutex::new(HashMap::new()),
            parses: AtomicUsize::new(0),
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    fn read(&self, unit: &UnitId) -> Result<ParseRequest> {
        let path = unit.to_path(self.project.root());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(ParseRequest { content, path })
    }

    /// Number of call-site extractions run so far.
    #[cfg(test)]
    pub(crate) fn extraction_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    fn parse(&self, unit: &UnitId) -> Result<ParseResult> {
        let parsed = self.parsers.parse_blocking(self.read(unit)?)?;
        if parsed.tree.root_node().has_error() {
            debug!("{} has syntax errors, extracting what parsed", unit);
        }
        Ok(parsed)
    }

    /// Bring the declaration index in line with the project's latest
    /// enumeration.
    pub fn sync_declarations(&self) -> Result<()> {
        let mut synced = self.synced_epoch.lock();
        if self.project.epoch() == 0 {
            self.project.all_units()?;
        }
        let epoch = self.project.epoch();
        if *synced == epoch {
            return Ok(());
        }

        let units = self.project.known_units();
        self.extracted.lock().retain(|unit, _| units.contains(unit));
        for indexed in self.symbols.units() {
            if !units.contains(&indexed) {
                self.symbols.remove_unit(&indexed);
            }
        }

        let mut outdated: Vec<(UnitId, VersionToken)> = Vec::new();
        let mut requests = Vec::new();
        for unit in &units {
            let version = match self.project.version_of(unit) {
                Ok(version) => version,
                Err(e) => {
                    debug!("Dropping declarations of {}: {:#}", unit, e);
                    self.symbols.remove_unit(unit);
                    continue;
                }
            };
            if self.symbols.version_of(unit) == Some(version) {
                continue;
            }
            match self.read(unit) {
                Ok(request) => {
                    outdated.push((unit.clone(), version));
                    requests.push(request);
                }
                Err(e) => {
                    debug!("Dropping declarations of {}: {:#}", unit, e);
                    self.symbols.remove_unit(unit);
                }
            }
        }

        if !outdated.is_empty() {
            debug!("Indexing declarations of {} unit(s)", outdated.len());
        }
        for ((unit, version), parsed) in outdated.into_iter().zip(self.parsers.parse_all(requests)) {
            match parsed {
                Ok(parsed) => {
                    let methods = declarations(parsed.tree.root_node(), &parsed.content, &unit)
                        .into_iter()
                        .map(|d| d.method)
                        .collect();
                    self.symbols.replace_unit(&unit, version, methods);
                }
                Err(e) => {
                    debug!("Dropping declarations of {}: {:#}", unit, e);
                    self.symbols.remove_unit(&unit);
                }
            }
        }

        *synced = epoch;
        Ok(())
    }

    /// Declared methods a call site may reach.
    fn resolve(&self, caller: &Method, site: &CallSite) -> Vec<Arc<Method>> {
        let own_type = caller.enclosing_type.as_str();
        let named = |name: &str| -> Vec<Arc<Method>> {
            self.symbols
                .lookup(name)
                .into_iter()
                .filter(|m| m.params.len() == site.arity)
                .collect()
        };

        match &site.receiver {
            Receiver::Construct => {
                let ty = if site.name.is_empty() {
                    last_segment(own_type)
                } else {
                    site.name.as_str()
                };
                named(ty)
                    .into_iter()
                    .filter(|m| last_segment(&m.enclosing_type) == ty)
                    .collect()
            }
            Receiver::This => {
                narrowed(named(&site.name), |m| m.unit == caller.unit && m.enclosing_type == own_type)
            }
            Receiver::Implicit => {
                let candidates = named(&site.name);
                let exact: Vec<_> = candidates
                    .iter()
                    .filter(|m| m.unit == caller.unit && m.enclosing_type == own_type)
                    .cloned()
                    .collect();
                if !exact.is_empty() {
                    return exact;
                }
                // Members of enclosing types are in scope too.
                narrowed(candidates, |m| {
                    m.unit == caller.unit
                        && own_type.starts_with(&format!("{}.", m.enclosing_type))
                })
            }
            Receiver::Super => named(&site.name)
                .into_iter()
                .filter(|m| m.enclosing_type != own_type)
                .collect(),
            Receiver::Named(name) if name.starts_with(char::is_uppercase) => {
                narrowed(named(&site.name), |m| last_segment(&m.enclosing_type) == name.as_str())
            }
            Receiver::Named(_) | Receiver::Expression => named(&site.name),
        }
    }
}

impl SourceAnalyzer for JavaAnalyzer {
    fn methods_of(&self, unit: &UnitId) -> Result<Vec<Arc<Method>>> {
        self.sync_declarations()?;
        Ok(self.symbols.methods_in_unit(unit))
    }

    fn dependencies_of(&self, method: &Arc<Method>) -> Result<Vec<DependencyEdge>> {
        let from_caller = |edges: &[DependencyEdge]| -> Vec<DependencyEdge> {
            edges.iter().filter(|edge| edge.caller == *method).cloned().collect()
        };

        self.sync_declarations()?;
        let epoch = *self.synced_epoch.lock();
        let version = self.project.version_of(&method.unit)?;
        if let Some(cached) = self.extracted.lock().get(&method.unit) {
            if cached.epoch == epoch && cached.version == version {
                return Ok(from_caller(&cached.edges));
            }
        }

        let extraction = self.extract(&method.unit)?;
        Ok(from_caller(&extraction.edges))
    }

    fn extract(&self, unit: &UnitId) -> Result<Extraction> {
        self.sync_declarations()?;
        let epoch = *self.synced_epoch.lock();
        let version = self.project.version_of(unit)?;
        let parsed = self.parse(unit)?;
        self.parses.fetch_add(1, Ordering::SeqCst);
        let decls = declarations(parsed.tree.root_node(), &parsed.content, unit);

        let mut edges = Vec::new();
        for decl in &decls {
            let Some(body) = decl.body else {
                continue;
            };
            for site in call_sites(body, &parsed.content) {
                for callee in self.resolve(&decl.method, &site) {
                    edges.push(DependencyEdge::new(Arc::clone(&decl.method), callee));
                }
            }
        }

        self.extracted.lock().insert(
            unit.clone(),
            UnitEdges {
                epoch,
                version,
                edges: edges.clone(),
            },
        );
        Ok(Extraction {
            methods: decls.into_iter().map(|d| d.method).collect(),
            edges,
        })
    }
}

impl ScopeResolver for JavaAnalyzer {
    fn methods_in_scope(&self, units: &BTreeSet<UnitId>) -> Result<Vec<Arc<Method>>> {
        self.sync_declarations()?;
        Ok(units
            .iter()
            .flat_map(|unit| self.symbols.methods_in_unit(unit))
            .collect())
    }
}
