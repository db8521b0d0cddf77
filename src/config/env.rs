//! Environment variable access and the prefixed override overlay.
//!
//! Variables named `<PREFIX><PATH>` override the merged tree at the dotted
//! path derived from `<PATH>`: the remainder is lowercased and every doubled
//! underscore becomes a path separator, so `APP_AUTH__JWT_SECRET` maps to
//! `auth.jwt_secret`. A single underscore stays part of the segment name.

use super::tree;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::warn;

/// Default prefix for override variables.
pub const DEFAULT_ENV_PREFIX: &str = "APP_";

/// Environment used when `<PREFIX>ENV` is absent or blank.
pub const DEFAULT_ENVIRONMENT: &str = "local";

/// Delimiter that separates path segments inside a variable name.
const PATH_DELIMITER: &str = "__";

/// Suffix of the variable that selects the environment file.
const ENV_SUFFIX: &str = "ENV";

/// Suffix of the variable that supplies the config directory.
const CONFIG_DIR_SUFFIX: &str = "CONFIG_DIR";

/// Key/value provider standing in for the process environment.
pub trait EnvSource: Debug + Send + Sync {
    /// Read one variable.
    fn var(&self, key: &str) -> Option<String>;

    /// All variables as `(name, value)` pairs.
    fn vars(&self) -> Vec<(String, String)>;
}

/// The real process environment. Variables that are not valid UTF-8 are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

/// A fixed set of variables, for tests and embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Name of the variable selecting the environment, e.g. `APP_ENV`.
pub fn environment_var(prefix: &str) -> String {
    format!("{prefix}{ENV_SUFFIX}")
}

/// Name of the variable supplying the config directory, e.g. `APP_CONFIG_DIR`.
pub fn config_dir_var(prefix: &str) -> String {
    format!("{prefix}{CONFIG_DIR_SUFFIX}")
}

/// Resolve the environment name: `<PREFIX>ENV` trimmed and lowercased,
/// falling back to [`DEFAULT_ENVIRONMENT`].
pub fn resolve_environment(env: &dyn EnvSource, prefix: &str) -> String {
    env.var(&environment_var(prefix))
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Map a variable name to its dotted override path.
///
/// Returns `None` when the name does not carry the prefix, or when it would
/// produce an empty path or an empty segment.
pub fn overlay_key(name: &str, prefix: &str) -> Option<String> {
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }

    let lowered = rest.to_lowercase();
    let segments: Vec<&str> = lowered.split(PATH_DELIMITER).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return None;
    }

    let key = segments.join(".");
    if tree::parse_key(&key).is_err() {
        return None;
    }
    Some(key)
}

/// Collect the override pairs for `prefix`, sorted by variable name so that
/// conflicting paths resolve the same way on every load.
///
/// The control variables `<PREFIX>ENV` and `<PREFIX>CONFIG_DIR` are not
/// overrides and are skipped.
pub fn collect_overlay(env: &dyn EnvSource, prefix: &str) -> Vec<(String, String)> {
    let reserved = [environment_var(prefix), config_dir_var(prefix)];

    let mut vars: Vec<(String, String)> = env
        .vars()
        .into_iter()
        .filter(|(name, _)| name.starts_with(prefix) && !reserved.contains(name))
        .collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));

    vars.into_iter()
        .filter_map(|(name, value)| match overlay_key(&name, prefix) {
            Some(key) => Some((key, value)),
            None => {
                warn!("Skipping environment variable {name}: no usable config path");
                None
            }
        })
        .collect()
}
