//! Layered configuration system.
//!
//! Loads a config directory in three layers with key-level merging:
//! 1. **Base** - `base.yaml`, required
//! 2. **Environment** - `<environment>.yaml`, optional
//! 3. **Overlay** - prefixed environment variables
//!
//! ## Merge Strategy
//! - Mappings merge key by key; lists and scalars are replaced
//! - Overlay values are strings, coerced to the target type when decoding
//!
//! ## Environment Variables
//! - `APP_ENV` - Environment name (trimmed, lowercased, default: `local`)
//! - `APP_<PATH>` - Override at `<path>`; `__` separates nested keys, e.g.
//!   `APP_DATABASE__MAX_OPEN` sets `database.max_open`
//! - `APP_CONFIG_DIR` - Config directory, see [`resolve_config_dir`]
//!
//! The `APP_` prefix is configurable through [`LoadOptions::with_env_prefix`].

mod decode;
pub mod env;
mod handle;
mod loaded;
mod loader;
mod merge;
pub mod tree;
pub mod watcher;

pub use decode::decode;
pub use env::{DEFAULT_ENV_PREFIX, DEFAULT_ENVIRONMENT, EnvSource, MapEnv, ProcessEnv};
pub use handle::Config;
pub use loaded::LoadedConfig;
pub use loader::{
    BASE_SOURCE, ConfigLoader, DEFAULT_CONFIG_DIR, LoadOptions, LoadedTree, SourceInfo,
    SourceKind, load, must_load, resolve_config_dir,
};
pub use merge::{merge_all, merge_into};
