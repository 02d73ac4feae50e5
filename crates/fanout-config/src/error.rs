//! Configuration errors (spec SPEC_FULL.md §A2).

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: Utf8PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: Utf8PathBuf, #[source] source: toml::de::Error },

    #[error("could not determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}
