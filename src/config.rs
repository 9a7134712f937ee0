//! `callweave.toml` project configuration

use callweave_engine::LayeredLayout;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "callweave.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config at {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Graph output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Dot,
    /// `Caller:` / `Callee:` listing of every edge
    Pairs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallweaveConfig {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    /// Extraction threads; rayon's global pool when unset
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub include_tests: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeConfig {
    /// Glob patterns, relative to the project root, of files never analyzed
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub x_ratio: Option<f32>,
    #[serde(default)]
    pub y_ratio: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

impl CallweaveConfig {
    pub fn include_tests(&self) -> bool {
        self.build.include_tests.unwrap_or(true)
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output.format.unwrap_or_default()
    }

    pub fn layout(&self) -> LayeredLayout {
        let defaults = LayeredLayout::default();
        LayeredLayout::new(
            self.layout.x_ratio.unwrap_or(defaults.x_ratio),
            self.layout.y_ratio.unwrap_or(defaults.y_ratio),
        )
    }

    fn validate(self, path: &Path) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.build.workers == Some(0) {
            return Err(invalid("build.workers must be at least 1"));
        }
        let ratios = [self.layout.x_ratio, self.layout.y_ratio];
        if ratios.iter().flatten().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(invalid("layout ratios must be finite and non-negative"));
        }
        Ok(self)
    }
}

/// Load `callweave.toml` from `root`. A missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<CallweaveConfig, ConfigError> {
    let path = root.join(CONFIG_FILE);
    if !path.is_file() {
        return Ok(CallweaveConfig::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CallweaveConfig = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.clone(),
        source,
    })?;
    tracing::debug!("Loaded {}", path.display());
    config.validate(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(config.include_tests());
        assert_eq!(config.output_format(), OutputFormat::Json);
        assert_eq!(config.layout().y_ratio, 2.0);
    }

    #[test]
    fn test_full_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[build]
workers = 4
include_tests = false

[scope]
exclude = ["generated/**"]

[layout]
x_ratio = 3.0

[output]
format = "dot"
"#,
        )
        .unwrap();

        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.build.workers, Some(4));
        assert!(!config.include_tests());
        assert_eq!(config.scope.exclude, vec!["generated/**"]);
        assert_eq!(config.layout().x_ratio, 3.0);
        assert_eq!(config.layout().y_ratio, 2.0);
        assert_eq!(config.output_format(), OutputFormat::Dot);
    }

    #[test]
    fn test_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[build]\nworkers = 0\n").unwrap();
        assert!(matches!(load_config(dir.path()), Err(ConfigError::Invalid { .. })));

        std::fs::write(dir.path().join(CONFIG_FILE), "[build\n").unwrap();
        assert!(matches!(load_config(dir.path()), Err(ConfigError::Toml { .. })));
    }
}
