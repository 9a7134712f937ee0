//! Java source tree on disk: unit enumeration, version tokens and scopes

use anyhow::{Context, Result};
use callweave_core::{UnitId, VersionToken, ViewScope};
use callweave_engine::{UnitEnumerator, VersionOracle};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project root {0} is not a directory")]
    MissingRoot(PathBuf),
    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// Whether `path` names a Java source file.
pub fn is_java_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("java")
}

/// Test sources live under a `test` or `tests` directory (`src/test/java`
/// in the Maven layout).
pub fn is_test_unit(unit: &UnitId) -> bool {
    let mut dirs: Vec<&str> = unit.as_str().split('/').collect();
    dirs.pop();
    dirs.iter().any(|d| *d == "test" || *d == "tests")
}

/// A directory of `.java` files. Every file is one unit, keyed by its path
/// relative to the root.
pub struct JavaProject {
    /// Canonical form; watcher events arrive with symlinks resolved
    root: PathBuf,
    /// The root as the caller spelled it
    opened_as: PathBuf,
    exclude: GlobSet,
    /// Bumped on every full enumeration
    epoch: AtomicU64,
    units: RwLock<BTreeSet<UnitId>>,
}

impl JavaProject {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ProjectError> {
        let opened_as = root.into();
        if !opened_as.is_dir() {
            return Err(ProjectError::MissingRoot(opened_as));
        }
        let root = std::fs::canonicalize(&opened_as).map_err(|e| {
            debug!("Cannot resolve {}: {}", opened_as.display(), e);
            ProjectError::MissingRoot(opened_as.clone())
        })?;
        Ok(JavaProject {
            root,
            opened_as,
            exclude: GlobSet::empty(),
            epoch: AtomicU64::new(0),
            units: RwLock::new(BTreeSet::new()),
        })
    }

    /// Skip files whose root-relative path matches any of `patterns`.
    pub fn with_excludes(mut self, patterns: &[String]) -> Result<Self, ProjectError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        self.exclude = builder.build()?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of enumerations so far. Consumers compare it to notice that
    /// the unit set may have changed.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Units found by the most recent enumeration.
    pub fn known_units(&self) -> BTreeSet<UnitId> {
        self.units.read().clone()
    }

    /// `path` relative to the root, whichever spelling of the root it uses.
    fn relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        path.strip_prefix(&self.root)
            .or_else(|_| path.strip_prefix(&self.opened_as))
            .ok()
    }

    /// Whether a path under the root is ignored by the exclude patterns or
    /// lives in a hidden directory such as `.git` or `.callweave`.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let relative = self.relative(path).unwrap_or(path);
        let hidden = relative.components().any(|c| match c {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        });
        hidden || self.exclude.is_match(relative)
    }

    /// Whether `path` would be enumerated as a unit.
    pub fn tracks(&self, path: &Path) -> bool {
        is_java_path(path) && self.relative(path).is_some() && !self.is_excluded(path)
    }

    fn walk(&self, dir: &Path) -> BTreeSet<UnitId> {
        WalkBuilder::new(dir)
            .hidden(true)
            .require_git(false)
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| is_java_path(path) && !self.is_excluded(path))
            .map(|path| UnitId::from_path(&self.root, &path))
            .collect()
    }

    fn current_units(&self) -> Result<BTreeSet<UnitId>> {
        if self.epoch() == 0 {
            return self.all_units();
        }
        Ok(self.known_units())
    }
}

impl UnitEnumerator for JavaProject {
    fn all_units(&self) -> Result<BTreeSet<UnitId>> {
        let units = self.walk(&self.root);
        debug!("Enumerated {} Java unit(s) under {}", units.len(), self.root.display());
        *self.units.write() = units.clone();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(units)
    }

    fn units_in_scope(&self, scope: &ViewScope) -> Result<BTreeSet<UnitId>> {
        match scope {
            ViewScope::WholeProject { include_tests } => {
                let units = self.current_units()?;
                Ok(units
                    .into_iter()
                    .filter(|u| *include_tests || !is_test_unit(u))
                    .collect())
            }
            ViewScope::Module(name) => {
                let prefix = format!("{name}/");
                Ok(self
                    .current_units()?
                    .into_iter()
                    .filter(|u| u.as_str().starts_with(&prefix))
                    .collect())
            }
            ViewScope::Directory(dir) => {
                let dir = if dir.is_absolute() {
                    dir.clone()
                } else {
                    self.root.join(dir)
                };
                match self.relative(&dir) {
                    Some(relative) => {
                        let relative = relative.to_path_buf();
                        Ok(self
                            .current_units()?
                            .into_iter()
                            .filter(|u| Path::new(u.as_str()).starts_with(&relative))
                            .collect())
                    }
                    // Units outside the project are reported by the caller.
                    None => Ok(self.walk(&dir)),
                }
            }
            ViewScope::Units(units) => Ok(units.iter().cloned().collect()),
            // The focus may be declared anywhere.
            ViewScope::UpstreamDownstream(_) => self.current_units(),
        }
    }
}

impl VersionOracle for JavaProject {
    /// Hash of the file's length and modification time.
    fn version_of(&self, unit: &UnitId) -> Result<VersionToken> {
        let path = unit.to_path(&self.root);
        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let modified = metadata
            .modified()
            .with_context(|| format!("No modification time for {}", path.display()))?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = DefaultHasher::new();
        metadata.len().hash(&mut hasher);
        modified.hash(&mut hasher);
        Ok(VersionToken(hasher.finish()))
    }
}
