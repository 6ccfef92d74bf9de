//! Error types for gobin-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while resolving the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("can't open [{path}]: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load. Includes file path and line context from serde_yaml.
    #[error("can't parse [{path}]: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// One of `hostname`, `user`, `identityfile` is unset after merging.
    #[error("Missing required parameter: {0}")]
    Missing(&'static str),

    #[error("can't find identity file: {}", .0.display())]
    IdentityFileNotFound(PathBuf),

    #[error("can't find source directory [{path}]: {source}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
