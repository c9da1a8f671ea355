//! Fix run configuration.
//!
//! Settings come from four places, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. The project file `.regolith.json` in the workspace root
//! 3. Environment variables (`REGOLITH_BASE_DIR`)
//! 4. CLI flags
//!
//! Every resolved value remembers its [`ConfigSource`].

use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fixer::FixerRegistry;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = ".regolith.json";

/// Environment variable overriding the project root.
pub const BASE_DIR_ENV: &str = "REGOLITH_BASE_DIR";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The project file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The project file is not valid configuration JSON.
    #[error("invalid configuration in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An ignore pattern is not a valid glob.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

// ============================================================================
// Project File
// ============================================================================

/// Contents of `.regolith.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixConfig {
    /// Fixers that must not run.
    pub disabled: Vec<String>,
    /// Glob patterns, relative to the project root, of files to leave alone.
    pub ignore: Vec<String>,
    /// Project root, relative to the directory holding the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

impl FixConfig {
    /// Parse configuration text; `path` is only used for error messages.
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `.regolith.json` from `workspace_root`, if present.
    pub fn load(workspace_root: &Path) -> Result<Option<Self>, ConfigError> {
        let path = workspace_root.join(CONFIG_FILE_NAME);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        debug!(path = %path.display(), "loaded project config");
        Self::parse(&path, &text).map(Some)
    }
}

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From `.regolith.json`.
    ProjectConfig = 1,
    /// From environment variable.
    EnvVar = 2,
    /// From CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    /// The actual value.
    pub value: T,
    /// Where the value came from.
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    /// Create a new config value with the given source.
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --base-dir flag.
    pub base_dir: Option<PathBuf>,
    /// --disable flags.
    pub disabled: Vec<String>,
    /// --ignore flags.
    pub ignore: Vec<String>,
}

// ============================================================================
// Configuration Resolution
// ============================================================================

/// Resolved configuration with precedence information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Project root every fix is reported under.
    pub base_dir: ConfigValue<PathBuf>,
    /// Disabled fixers, accumulated from every source.
    pub disabled: Vec<ConfigValue<String>>,
    /// Ignore patterns, accumulated from every source.
    pub ignore: Vec<ConfigValue<String>>,
}

impl ResolvedConfig {
    /// Resolve configuration from all sources, reading the process environment.
    pub fn resolve(workspace_root: &Path, cli: &CliOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with_env(workspace_root, cli, |key| std::env::var(key).ok())
    }

    /// Resolve configuration, looking environment variables up through `env`.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Project config (`.regolith.json`)
    /// 4. Defaults
    pub fn resolve_with_env(
        workspace_root: &Path,
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = ResolvedConfig::defaults(workspace_root);

        if let Some(project) = FixConfig::load(workspace_root)? {
            config.apply_project_config(workspace_root, project);
        }

        if let Some(base_dir) = env(BASE_DIR_ENV) {
            config.merge_base_dir(PathBuf::from(base_dir), ConfigSource::EnvVar);
        }

        config.apply_cli_overrides(cli);
        Ok(config)
    }

    /// Configuration with nothing but defaults.
    pub fn defaults(workspace_root: &Path) -> Self {
        ResolvedConfig {
            base_dir: ConfigValue::new(workspace_root.to_path_buf(), ConfigSource::Default),
            disabled: Vec::new(),
            ignore: Vec::new(),
        }
    }

    fn merge_base_dir(&mut self, base_dir: PathBuf, source: ConfigSource) {
        let current = std::mem::replace(
            &mut self.base_dir,
            ConfigValue::new(PathBuf::new(), ConfigSource::Default),
        );
        self.base_dir = current.merge(ConfigValue::new(base_dir, source));
    }

    fn apply_project_config(&mut self, workspace_root: &Path, project: FixConfig) {
        if let Some(base_dir) = project.base_dir {
            self.merge_base_dir(workspace_root.join(base_dir), ConfigSource::ProjectConfig);
        }
        self.disabled.extend(
            project
                .disabled
                .into_iter()
                .map(|name| ConfigValue::new(name, ConfigSource::ProjectConfig)),
        );
        self.ignore.extend(
            project
                .ignore
                .into_iter()
                .map(|pattern| ConfigValue::new(pattern, ConfigSource::ProjectConfig)),
        );
    }

    fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(ref base_dir) = cli.base_dir {
            self.merge_base_dir(base_dir.clone(), ConfigSource::CliFlag);
        }
        self.disabled.extend(
            cli.disabled
                .iter()
                .map(|name| ConfigValue::new(name.clone(), ConfigSource::CliFlag)),
        );
        self.ignore.extend(
            cli.ignore
                .iter()
                .map(|pattern| ConfigValue::new(pattern.clone(), ConfigSource::CliFlag)),
        );
    }

    /// The effective project root.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir.value
    }

    /// Whether the fixer called `name` is disabled.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d.value == name)
    }

    /// The default fixers minus the disabled ones.
    pub fn registry(&self) -> FixerRegistry {
        let mut registry = FixerRegistry::with_defaults();
        for name in &self.disabled {
            if registry.get(&name.value).is_none() {
                warn!(fixer = %name.value, "cannot disable unknown fixer");
                continue;
            }
            registry.unregister(&name.value);
        }
        registry
    }
}

// ============================================================================
// Ignore Matching
// ============================================================================

/// Decides which files are kept out of fixing.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    root: PathBuf,
    globs: GlobSet,
}

impl IgnoreMatcher {
    /// Compile `patterns`, matched relative to `root`.
    pub fn new<'a>(
        root: &Path,
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|source| ConfigError::InvalidGlob {
            pattern: String::new(),
            source,
        })?;
        Ok(IgnoreMatcher {
            root: root.to_path_buf(),
            globs,
        })
    }

    /// Whether `path` matches any ignore pattern.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.globs.is_match(relative)
    }

    /// Whether there are no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
