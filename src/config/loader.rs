//! Configuration loader with layered sources.
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. `base.yaml` in the config directory (required)
//! 2. `<environment>.yaml` in the config directory (optional)
//! 3. Environment variables with the configured prefix

use super::decode::decode;
use super::env::{self, DEFAULT_ENV_PREFIX, EnvSource, ProcessEnv};
use super::loaded::LoadedConfig;
use super::merge::merge_into;
use super::tree;
use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the required source.
pub const BASE_SOURCE: &str = "base";

/// Directory used by [`LoadOptions::with_default_dir`] callers that want the
/// conventional layout.
pub const DEFAULT_CONFIG_DIR: &str = "./config";

/// Extension of every source file.
const SOURCE_EXTENSION: &str = "yaml";

/// Layer a source belongs to, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKind {
    /// `base.yaml`
    Base,
    /// `<environment>.yaml`
    Environment,
    /// Prefixed environment variables
    Overlay,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Base => write!(f, "base"),
            SourceKind::Environment => write!(f, "environment"),
            SourceKind::Overlay => write!(f, "overlay"),
        }
    }
}

/// A source that contributed to a merged tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub kind: SourceKind,
    /// Source name (`base`, the environment name, or the variable prefix).
    pub name: String,
    /// File the source was read from. `None` for the overlay.
    pub path: Option<PathBuf>,
    /// Number of leaf keys (or variables) the source supplied.
    pub keys: usize,
}

/// Options for a load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    path: Option<String>,
    env_prefix: String,
    env: Arc<dyn EnvSource>,
    environment: Option<String>,
    default_dir: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env: Arc::new(ProcessEnv),
            environment: None,
            default_dir: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode only the subtree at this dotted key.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Prefix of override variables (default `APP_`). Also prefixes the
    /// `ENV` and `CONFIG_DIR` control variables.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read variables from `env` instead of the process environment.
    pub fn with_env_source(self, env: impl EnvSource + 'static) -> Self {
        self.with_shared_env(Arc::new(env))
    }

    pub fn with_shared_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    /// Use this environment name instead of reading `<PREFIX>ENV`.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Fall back to `dir` when the config directory argument is blank.
    /// Without it a blank directory is an error.
    pub fn with_default_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_dir = Some(dir.into());
        self
    }

    /// The scoped path, trimmed. `None` when unset or blank.
    pub fn path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    pub fn env_source(&self) -> &dyn EnvSource {
        self.env.as_ref()
    }

    /// The environment name this load will use.
    pub fn environment(&self) -> String {
        match self
            .environment
            .as_deref()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
        {
            Some(name) => name,
            None => env::resolve_environment(self.env_source(), &self.env_prefix),
        }
    }

    pub fn default_dir(&self) -> Option<&Path> {
        self.default_dir.as_deref()
    }
}

/// All sources merged, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTree {
    pub tree: Value,
    pub config_dir: PathBuf,
    pub environment: String,
    pub sources: Vec<SourceInfo>,
}

impl LoadedTree {
    /// Value at a dotted key.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        tree::lookup(&self.tree, key)
    }

    /// Decode the whole tree, or the subtree at `scope`.
    pub fn decode<T: DeserializeOwned>(&self, scope: Option<&str>) -> ConfigResult<T> {
        match scope {
            Some(key) => {
                let subtree = self
                    .lookup(key)
                    .cloned()
                    .ok_or_else(|| ConfigError::key_not_found(key))?;
                decode(subtree, Some(key))
            }
            None => decode(self.tree.clone(), None),
        }
    }
}

/// Loads a config directory according to a set of [`LoadOptions`].
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    options: LoadOptions,
}

impl ConfigLoader {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Validate the config directory without reading any source.
    pub fn resolve_dir(&self) -> ConfigResult<PathBuf> {
        let mut dir = trim_path(&self.config_dir);
        if dir.as_os_str().is_empty() {
            match self.options.default_dir() {
                Some(default_dir) => {
                    debug!("No config directory given, using {}", default_dir.display());
                    dir = default_dir.to_path_buf();
                }
                None => return Err(ConfigError::MissingConfigDir),
            }
        }

        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(ConfigError::NotADirectory { path: dir }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::ConfigDirNotFound { path: dir })
            }
            Err(source) => Err(ConfigError::FileRead { path: dir, source }),
        }
    }

    /// Read and merge every source.
    pub fn load_tree(&self) -> ConfigResult<LoadedTree> {
        let config_dir = self.resolve_dir()?;
        let environment = self.options.environment();
        let mut sources = Vec::new();

        let base_path = source_path(&config_dir, BASE_SOURCE);
        let mut merged = read_source(&base_path)?.ok_or_else(|| ConfigError::MissingBaseFile {
            path: base_path.clone(),
        })?;
        debug!("Loaded base config from {}", base_path.display());
        sources.push(SourceInfo {
            kind: SourceKind::Base,
            name: BASE_SOURCE.to_string(),
            path: Some(base_path),
            keys: tree::leaf_keys(&merged).len(),
        });

        if environment != BASE_SOURCE {
            let env_path = source_path(&config_dir, &environment);
            match read_source(&env_path)? {
                Some(document) => {
                    debug!("Loaded {} config from {}", environment, env_path.display());
                    sources.push(SourceInfo {
                        kind: SourceKind::Environment,
                        name: environment.clone(),
                        path: Some(env_path),
                        keys: tree::leaf_keys(&document).len(),
                    });
                    merge_into(&mut merged, document);
                }
                None => debug!(
                    "No {} config at {}, skipping",
                    environment,
                    env_path.display()
                ),
            }
        }

        let prefix = self.options.env_prefix();
        let overlay = env::collect_overlay(self.options.env_source(), prefix);
        if !overlay.is_empty() {
            let count = overlay.len();
            for (key, value) in overlay {
                debug!("Overriding {key} from environment");
                tree::insert(&mut merged, &key, Value::String(value))?;
            }
            sources.push(SourceInfo {
                kind: SourceKind::Overlay,
                name: prefix.to_string(),
                path: None,
                keys: count,
            });
        }

        info!(
            config_dir = %config_dir.display(),
            environment = %environment,
            sources = sources.len(),
            "Configuration loaded"
        );

        Ok(LoadedTree {
            tree: merged,
            config_dir,
            environment,
            sources,
        })
    }

    /// Load and decode into `T`, scoped to the configured path if any.
    pub fn load<T: DeserializeOwned>(&self) -> ConfigResult<LoadedConfig<T>> {
        let loaded = self.load_tree()?;
        let value = loaded.decode(self.options.path())?;
        Ok(LoadedConfig::new(value))
    }
}

/// Load `config_dir` into `T`.
///
/// # Example
/// ```no_run
/// use layered_config::config::{load, LoadOptions};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct DatabaseConfig {
///     host: String,
///     port: u16,
/// }
///
/// let db = load::<DatabaseConfig>("./config", LoadOptions::new().with_path("database"))?;
/// println!("{}:{}", db.host, db.port);
/// # Ok::<(), layered_config::error::ConfigError>(())
/// ```
pub fn load<T: DeserializeOwned>(
    config_dir: impl AsRef<Path>,
    options: LoadOptions,
) -> ConfigResult<LoadedConfig<T>> {
    ConfigLoader::new(config_dir).with_options(options).load()
}

/// Like [`load`], but panics when the configuration cannot be loaded. For
/// startup code where there is nothing sensible to do without it.
pub fn must_load<T: DeserializeOwned>(
    config_dir: impl AsRef<Path>,
    options: LoadOptions,
) -> LoadedConfig<T> {
    load(config_dir, options).unwrap_or_else(|err| panic!("failed to load configuration: {err}"))
}

/// Pick the config directory: the explicit argument when it is not blank,
/// otherwise `<PREFIX>CONFIG_DIR`.
pub fn resolve_config_dir(
    explicit: Option<&str>,
    env: &dyn EnvSource,
    prefix: &str,
) -> ConfigResult<PathBuf> {
    explicit
        .map(|dir| dir.trim().to_string())
        .filter(|dir| !dir.is_empty())
        .or_else(|| {
            env.var(&env::config_dir_var(prefix))
                .map(|dir| dir.trim().to_string())
                .filter(|dir| !dir.is_empty())
        })
        .map(PathBuf::from)
        .ok_or(ConfigError::MissingConfigDir)
}

fn source_path(config_dir: &Path, name: &str) -> PathBuf {
    config_dir.join(format!("{name}.{SOURCE_EXTENSION}"))
}

fn trim_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(raw.trim()),
        None => path.to_path_buf(),
    }
}

/// Read one source. `Ok(None)` when the file does not exist.
fn read_source(path: &Path) -> ConfigResult<Option<Value>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_document(path, &content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse a source document. An empty document is an empty mapping; any
/// other non-mapping top level is rejected.
fn parse_document(path: &Path, content: &str) -> ConfigResult<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let document: Value =
        serde_yaml::from_str(content).map_err(|source| ConfigError::FileParse {
            path: path.to_path_buf(),
            source,
        })?;

    match document {
        Value::Object(_) => Ok(document),
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(ConfigError::NotAMapping {
            path: path.to_path_buf(),
            found: tree::type_name(&other),
        }),
    }
}
