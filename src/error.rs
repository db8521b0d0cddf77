//! Error types for configuration loading and decoding.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error kinds for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Setup errors
    MissingConfigDir,
    ConfigDirNotFound,
    MissingBaseFile,

    // Source errors
    FileRead,
    FileParse,

    // Decode errors
    Unmarshal,
    KeyNotFound,

    // Handle errors
    InvalidKey,
}

/// Errors returned by the loader, the config handle and the decoder.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory is required but none was given")]
    MissingConfigDir,

    #[error("config directory not found: {}", .path.display())]
    ConfigDirNotFound { path: PathBuf },

    #[error("config path exists but is not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("base config file not found: {}", .path.display())]
    MissingBaseFile { path: PathBuf },

    #[error("failed to read config file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    FileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(
        "failed to parse config file {}: top level must be a mapping, found {found}",
        .path.display()
    )]
    NotAMapping { path: PathBuf, found: &'static str },

    /// Decoding the merged tree into the target type failed. `key` is the
    /// dotted path of the offending value when it is known.
    #[error("failed to unmarshal config: {message}")]
    Unmarshal {
        key: Option<String>,
        message: String,
    },

    #[error("config key not found: {key}")]
    KeyNotFound { key: String },

    #[error("invalid config key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },
}

impl ConfigError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::MissingConfigDir => ErrorKind::MissingConfigDir,
            ConfigError::ConfigDirNotFound { .. } | ConfigError::NotADirectory { .. } => {
                ErrorKind::ConfigDirNotFound
            }
            ConfigError::MissingBaseFile { .. } => ErrorKind::MissingBaseFile,
            ConfigError::FileRead { .. } => ErrorKind::FileRead,
            ConfigError::FileParse { .. } | ConfigError::NotAMapping { .. } => {
                ErrorKind::FileParse
            }
            ConfigError::Unmarshal { .. } => ErrorKind::Unmarshal,
            ConfigError::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            ConfigError::InvalidKey { .. } => ErrorKind::InvalidKey,
        }
    }

    /// True for errors raised before any source was merged.
    pub fn is_setup(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MissingConfigDir | ErrorKind::ConfigDirNotFound | ErrorKind::MissingBaseFile
        )
    }

    /// True when the files loaded fine but their shape does not match the
    /// requested target. Usually a schema or version mismatch.
    pub fn is_decode(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unmarshal | ErrorKind::KeyNotFound)
    }

    /// The dotted key the error refers to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::Unmarshal { key, .. } => key.as_deref(),
            ConfigError::KeyNotFound { key } | ConfigError::InvalidKey { key, .. } => {
                Some(key.as_str())
            }
            _ => None,
        }
    }

    /// The file the error refers to, if any.
    pub fn file(&self) -> Option<&std::path::Path> {
        match self {
            ConfigError::MissingBaseFile { path }
            | ConfigError::FileRead { path, .. }
            | ConfigError::FileParse { path, .. }
            | ConfigError::NotAMapping { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }

    pub(crate) fn key_not_found(key: &str) -> Self {
        ConfigError::KeyNotFound {
            key: key.to_string(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
