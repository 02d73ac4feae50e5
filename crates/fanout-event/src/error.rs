//! Event-model errors (spec §7 "Schema").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("schema {0} is not registered")]
    SchemaUnknown(String),

    #[error("schema identifier {0:?} is malformed, expected \"<type>@<major.minor.patch>\"")]
    SchemaInvalid(String),

    #[error("property {path}: {reason}")]
    PropertyInvalid { path: String, reason: String },
}
