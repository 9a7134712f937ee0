//! Core data structures for the dependency cache

use std::cmp::Ordering;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable handle to a source unit (one tracked file).
///
/// The filesystem host uses the path relative to the project root with `/`
/// separators, so the handle survives moving the checkout.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(key: impl Into<String>) -> Self {
        UnitId(key.into())
    }

    /// Build a handle from a path under `root`. Paths outside `root` keep
    /// their full form.
    pub fn from_path(root: &Path, path: &Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        UnitId(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the handle back to a filesystem path under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque version of a source unit. Only equality is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(pub u64);

/// Stable identity of a callable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct MethodId(pub u64);

impl MethodId {
    /// Derive an id from the declaration's unit, enclosing type, name and
    /// parameter types. Parameter names do not take part.
    pub fn new(unit: &UnitId, enclosing_type: &str, name: &str, params: &[Param]) -> Self {
        let mut hasher = DefaultHasher::new();
        unit.hash(&mut hasher);
        enclosing_type.hash(&mut hasher);
        name.hash(&mut hasher);
        for param in params {
            param.ty.hash(&mut hasher);
        }
        MethodId(hasher.finish())
    }
}

/// One formal parameter, kept for presentation only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub ty: String,
    pub name: String,
}

impl Param {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Param {
            ty: ty.into(),
            name: name.into(),
        }
    }
}

/// A method or constructor declared in exactly one source unit.
///
/// Equality, hashing and ordering go through [`MethodId`]; the remaining
/// fields are display attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub id: MethodId,
    pub unit: UnitId,
    pub enclosing_type: String,
    pub name: String,
    pub params: Vec<Param>,
}

impl Method {
    pub fn new(unit: UnitId, enclosing_type: impl Into<String>, name: impl Into<String>, params: Vec<Param>) -> Self {
        let enclosing_type = enclosing_type.into();
        let name = name.into();
        let id = MethodId::new(&unit, &enclosing_type, &name, &params);
        Method {
            id,
            unit,
            enclosing_type,
            name,
            params,
        }
    }

    /// `Type::name(ParamType paramName,...)`
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}::{}({})", self.enclosing_type, self.name, params)
    }

    /// Whether `selector` names this method: its full signature (whitespace
    /// ignored), its `Type::name` (every overload matches), or its id as 16
    /// hex digits.
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        if selector.len() == 16 {
            if let Ok(id) = u64::from_str_radix(selector, 16) {
                return self.id.0 == id;
            }
        }
        if selector.contains('(') {
            let compact = |s: &str| s.split_whitespace().collect::<String>();
            return compact(&self.signature()) == compact(selector);
        }
        selector
            .split_once("::")
            .is_some_and(|(ty, name)| ty == self.enclosing_type && name == self.name)
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Method {}

impl Hash for Method {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Method {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Method {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// A directed caller → callee relationship. Several call sites between the
/// same pair are one edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub caller: Arc<Method>,
    pub callee: Arc<Method>,
}

impl DependencyEdge {
    pub fn new(caller: Arc<Method>, callee: Arc<Method>) -> Self {
        DependencyEdge { caller, callee }
    }

    /// Whether either endpoint is declared in `unit`.
    pub fn touches(&self, unit: &UnitId) -> bool {
        &self.caller.unit == unit || &self.callee.unit == unit
    }
}

/// Which part of the project a graph request wants to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewScope {
    /// Every unit in the project.
    WholeProject { include_tests: bool },
    /// Units under a top-level module directory.
    Module(String),
    /// Units under a directory, relative to the project root or absolute.
    Directory(PathBuf),
    /// An explicit list of units.
    Units(Vec<UnitId>),
    /// The methods a selector names (see [`Method::matches`]) with all their
    /// transitive callers and callees.
    UpstreamDownstream(String),
}

impl Default for ViewScope {
    fn default() -> Self {
        ViewScope::WholeProject { include_tests: true }
    }
}

impl fmt::Display for ViewScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewScope::WholeProject { include_tests: true } => {
                f.write_str("Whole project (test files included)")
            }
            ViewScope::WholeProject { include_tests: false } => {
                f.write_str("Whole project (test files excluded)")
            }
            ViewScope::Module(name) => write!(f, "Module {name}"),
            ViewScope::Directory(path) => write!(f, "Directory {}", path.display()),
            ViewScope::Units(units) => write!(f, "{} selected unit(s)", units.len()),
            ViewScope::UpstreamDownstream(selector) => write!(f, "Upstream/downstream of {selector}"),
        }
    }
}
