//! Source attribution for resolved configuration values: a `ConfigSource`
//! enum and effective-config reporting.

use camino::Utf8PathBuf;

/// Where a single resolved field's value came from. Precedence (lowest to
/// highest): `Default < File < Env < Cli`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    File(Utf8PathBuf),
    Env,
    Cli,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File(path) => write!(f, "config file ({path})"),
            Self::Env => write!(f, "environment"),
            Self::Cli => write!(f, "CLI"),
        }
    }
}
