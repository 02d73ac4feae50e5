//! Event schema registry, validator and canonical fingerprinting (C1).

pub mod error;
pub mod fingerprint;
pub mod registry;
pub mod validator;

pub use error::EventError;
pub use fingerprint::{canonical_json, fingerprint};
pub use registry::SchemaRegistry;
pub use validator::validate;
