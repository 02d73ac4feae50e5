//! Event and schema data model (spec §3).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Metadata attached to an [`Event`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Explicit event id. When present it overrides fingerprint derivation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// An immutable event record broadcast from a producer repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    /// `"<type>@<semver>"`, present only when the event is schema-bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl Default for Value {
    fn default() -> Self {
        Value::Object(BTreeMap::new())
    }
}

impl Event {
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            schema: None,
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Attach a fresh id + timestamp, used when idempotency is disabled
    /// (spec §4.6 step 2).
    #[must_use]
    pub fn with_fresh_identity(mut self, id: impl Into<String>) -> Self {
        self.metadata.id = Some(id.into());
        self.metadata.timestamp = Some(Utc::now());
        self
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.source.as_deref()
    }

    /// The semver portion of `schema`, if a schema is declared and the
    /// format is well-formed (`type@x.y.z`).
    #[must_use]
    pub fn schema_version(&self) -> Option<&str> {
        self.schema.as_deref().and_then(|s| s.split_once('@')).map(|(_, v)| v)
    }

    /// Convert to the legacy wire form (spec §6).
    #[must_use]
    pub fn to_legacy(&self) -> LegacyEvent {
        LegacyEvent {
            event_type: self.event_type.clone(),
            schema_version: self.schema_version().map(str::to_string),
            payload: self.payload.clone(),
            source: self.metadata.source.clone().unwrap_or_default(),
            timestamp: self
                .metadata
                .timestamp
                .map(|t| t.timestamp())
                .unwrap_or_else(|| Utc::now().timestamp()),
        }
    }

    /// Rebuild an enhanced event from the legacy wire form. Round-trips
    /// `{type, source, payload, timestamp}` and the bare schema version
    /// string (without the originating schema's type prefix, which the
    /// legacy form never carried).
    #[must_use]
    pub fn from_legacy(legacy: LegacyEvent) -> Self {
        let timestamp = DateTime::<Utc>::from_timestamp(legacy.timestamp, 0);
        Self {
            event_type: legacy.event_type,
            schema: None,
            payload: legacy.payload,
            metadata: EventMetadata {
                id: None,
                timestamp,
                source: Some(legacy.source),
                correlation: None,
                trace: None,
                headers: BTreeMap::new(),
            },
        }
    }
}

/// Backward-compatible wire form (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub payload: Value,
    pub source: String,
    pub timestamp: i64,
}

/// Primitive types a [`PropertySchema`] may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// A single declared property of a registered schema (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub r#enum: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A registered schema: `type@semver` identity plus its declared
/// properties and which of them are required after defaults apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSchema {
    pub event_type: String,
    pub version: String,
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl EventSchema {
    #[must_use]
    pub fn identifier(&self) -> String {
        format!("{}@{}", self.event_type, self.version)
    }
}
