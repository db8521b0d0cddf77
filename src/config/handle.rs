//! Runtime handle over a merged configuration tree.
//!
//! The tree sits behind an `ArcSwap`, so reads never block and a `set` or a
//! `reload` swaps in a whole new tree. Readers see either the old tree or the
//! new one, never a mix.

use super::loader::{ConfigLoader, LoadOptions, LoadedTree, SourceInfo};
use super::tree;
use crate::error::ConfigResult;
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Mutable, thread-safe view of a loaded configuration directory.
///
/// Writes made with [`Config::set`] live in memory only and are dropped by
/// [`Config::reload`].
#[derive(Debug)]
pub struct Config {
    loader: ConfigLoader,
    state: ArcSwap<LoadedTree>,
}

impl Config {
    /// Load `config_dir` and wrap the merged tree.
    pub fn open(config_dir: impl AsRef<Path>, options: LoadOptions) -> ConfigResult<Self> {
        Self::from_loader(ConfigLoader::new(config_dir).with_options(options))
    }

    pub fn from_loader(loader: ConfigLoader) -> ConfigResult<Self> {
        let loaded = loader.load_tree()?;
        Ok(Self {
            loader,
            state: ArcSwap::from_pointee(loaded),
        })
    }

    /// Value at a dotted key. The empty key returns the whole tree.
    pub fn get(&self, key: &str) -> Option<Value> {
        tree::lookup(&self.state.load().tree, key).cloned()
    }

    /// Value at a dotted key decoded into `T`. `Ok(None)` when the key is
    /// absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<Option<T>> {
        let state = self.state.load();
        if !tree::contains(&state.tree, key) {
            return Ok(None);
        }
        state.decode(scope(key)).map(Some)
    }

    /// Whether a dotted key is present.
    pub fn is_set(&self, key: &str) -> bool {
        tree::contains(&self.state.load().tree, key)
    }

    /// Write a value at a dotted key. Visible to every later read through
    /// this handle; never written to disk.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> ConfigResult<()> {
        let segments = tree::parse_key(key)?;
        let value = value.into();
        self.state.rcu(|current| {
            let mut next = LoadedTree::clone(current);
            tree::insert_at(&mut next.tree, &segments, value.clone());
            next
        });
        debug!("Set config key {key}");
        Ok(())
    }

    /// Decode the whole tree into `T`.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        self.state.load().decode(None)
    }

    /// Decode the subtree at `key` into `T`.
    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<T> {
        self.state.load().decode(scope(key))
    }

    /// Dotted paths of every leaf value, sorted.
    pub fn keys(&self) -> Vec<String> {
        tree::leaf_keys(&self.state.load().tree)
    }

    /// Re-read files and environment, discarding runtime writes. On error the
    /// current tree is kept.
    pub fn reload(&self) -> ConfigResult<()> {
        let loaded = self.loader.load_tree()?;
        info!(
            "Reloaded configuration from {}",
            loaded.config_dir.display()
        );
        self.state.store(Arc::new(loaded));
        Ok(())
    }

    /// The current merged tree and its load metadata.
    pub fn snapshot(&self) -> Arc<LoadedTree> {
        self.state.load_full()
    }

    pub fn environment(&self) -> String {
        self.state.load().environment.clone()
    }

    pub fn config_dir(&self) -> PathBuf {
        self.state.load().config_dir.clone()
    }

    pub fn sources(&self) -> Vec<SourceInfo> {
        self.state.load().sources.clone()
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }
}

fn scope(key: &str) -> Option<&str> {
    Some(key).filter(|key| !key.is_empty())
}
