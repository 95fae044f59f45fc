//! Error types for markerguard
//!
//! None of these reach the command-intake boundary: the router turns every
//! failure into allow, deny or ignore. They surface through the persistence,
//! configuration and CLI paths.

use std::path::PathBuf;

/// Errors while reading the external marker store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error reading the store file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store file is not valid YAML
    #[error("yaml error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Store document has an unexpected layout
    #[error("unexpected store layout: {0}")]
    Shape(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors while loading or flushing the ownership table
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// IO error on the ownership file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ownership file could not be parsed or rendered
    #[error("yaml error on {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Ownership document has an unexpected layout
    #[error("unexpected ownership layout: {0}")]
    Shape(String),
}

impl PersistError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for `GuardConfig`
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Config parsed but holds an unusable value
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Combined markerguard error
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for markerguard operations
pub type GuardResult<T> = Result<T, GuardError>;
