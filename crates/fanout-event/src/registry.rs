//! Schema registration and defaults application (spec §4.1).

use dashmap::DashMap;

use fanout_types::{Event, EventSchema};

use crate::error::EventError;

/// Thread-safe registry of `type@semver` schemas, consulted by
/// [`crate::validator::validate`] whenever an event declares `schema`.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: DashMap<String, EventSchema>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { schemas: DashMap::new() }
    }

    pub fn register_schema(&self, schema: EventSchema) {
        self.schemas.insert(schema.identifier(), schema);
    }

    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<EventSchema> {
        self.schemas.get(identifier).map(|entry| entry.clone())
    }

    /// Fill in declared `default` values for any property missing from the
    /// event's payload object. No-op if the schema is unregistered (the
    /// caller's subsequent `validate` call surfaces `SchemaUnknown`) or the
    /// payload is not an object.
    pub fn apply_defaults(&self, event: &mut Event) -> Result<(), EventError> {
        let Some(schema_id) = event.schema.clone() else { return Ok(()) };
        check_identifier_shape(&schema_id)?;
        let Some(schema) = self.get(&schema_id) else {
            return Err(EventError::SchemaUnknown(schema_id));
        };

        let fanout_types::Value::Object(map) = &mut event.payload else { return Ok(()) };
        for (name, prop) in &schema.properties {
            if !map.contains_key(name) {
                if let Some(default) = &prop.default {
                    map.insert(name.clone(), default.clone());
                }
            }
        }
        Ok(())
    }
}

/// Reject a `schema` identifier that is not shaped like `<type>@<major.minor.patch>`
/// before it ever reaches a registry lookup, so a typo'd separator or a
/// non-numeric version segment surfaces as `SchemaInvalid` rather than a
/// `SchemaUnknown` that looks like the schema was simply never registered.
pub(crate) fn check_identifier_shape(identifier: &str) -> Result<(), EventError> {
    let Some((event_type, version)) = identifier.split_once('@') else {
        return Err(EventError::SchemaInvalid(identifier.to_string()));
    };
    if event_type.is_empty() {
        return Err(EventError::SchemaInvalid(identifier.to_string()));
    }
    let parts: Vec<&str> = version.split('.').collect();
    let well_formed = parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if !well_formed {
        return Err(EventError::SchemaInvalid(identifier.to_string()));
    }
    Ok(())
}
