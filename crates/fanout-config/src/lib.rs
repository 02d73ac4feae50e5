//! Layered configuration for the tako fan-out core (A1): built-in
//! defaults, a `tako.toml` `[fanout]` table, `TAKO_FANOUT_*` environment
//! variables, and CLI flags, in ascending precedence, with per-field
//! source attribution for status reporting.

pub mod config;
pub mod error;
pub mod source;

pub use config::{CliOverrides, FanOutConfig, CONFIG_FILE_NAME};
pub use error::ConfigError;
pub use source::ConfigSource;
