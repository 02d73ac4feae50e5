//! Typed payload validation against a registered schema (spec §4.1).

use fanout_types::{EventSchema, PropertySchema, PropertyType, Value};

use crate::error::EventError;
use crate::registry::{check_identifier_shape, SchemaRegistry};

/// Validate `event.payload` against its declared `event.schema`, if any.
/// A missing `schema` field is trivially valid (schemas are opt-in).
pub fn validate(registry: &SchemaRegistry, event: &fanout_types::Event) -> Result<(), EventError> {
    let Some(schema_id) = &event.schema else { return Ok(()) };
    check_identifier_shape(schema_id)?;
    let schema = registry.get(schema_id).ok_or_else(|| EventError::SchemaUnknown(schema_id.clone()))?;
    validate_against(&schema, &event.payload)
}

fn validate_against(schema: &EventSchema, payload: &Value) -> Result<(), EventError> {
    let Value::Object(map) = payload else {
        return Err(EventError::PropertyInvalid {
            path: "$".to_string(),
            reason: "payload must be an object to validate against a schema".to_string(),
        });
    };

    for (name, prop) in &schema.properties {
        if let Some(value) = map.get(name) {
            validate_property(name, prop, value)?;
        }
    }

    for required in &schema.required {
        if !map.contains_key(required) {
            return Err(EventError::PropertyInvalid {
                path: required.clone(),
                reason: "required property is missing".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_property(path: &str, prop: &PropertySchema, value: &Value) -> Result<(), EventError> {
    match (prop.property_type, value) {
        (PropertyType::String, Value::String(s)) => {
            check_length(path, s.chars().count(), prop)?;
            check_enum(path, s, prop)?;
        }
        (PropertyType::Number, Value::Number(n)) => check_range(path, *n, prop)?,
        (PropertyType::Integer, Value::Number(n)) => {
            if n.fract() != 0.0 {
                return Err(invalid(path, format!("expected an integer, got {n}")));
            }
            check_range(path, *n, prop)?;
        }
        (PropertyType::Boolean, Value::Bool(_)) => {}
        (PropertyType::Array, Value::Array(items)) => check_length(path, items.len(), prop)?,
        (PropertyType::Object, Value::Object(_)) => {}
        (expected, got) => {
            return Err(invalid(path, format!("expected {expected:?}, got {}", got.type_name())));
        }
    }
    Ok(())
}

fn check_length(path: &str, len: usize, prop: &PropertySchema) -> Result<(), EventError> {
    if let Some(min) = prop.min_length {
        if len < min {
            return Err(invalid(path, format!("length {len} is below minimum {min}")));
        }
    }
    if let Some(max) = prop.max_length {
        if len > max {
            return Err(invalid(path, format!("length {len} exceeds maximum {max}")));
        }
    }
    Ok(())
}

fn check_range(path: &str, n: f64, prop: &PropertySchema) -> Result<(), EventError> {
    if let Some(min) = prop.minimum {
        if n < min {
            return Err(invalid(path, format!("{n} is below minimum {min}")));
        }
    }
    if let Some(max) = prop.maximum {
        if n > max {
            return Err(invalid(path, format!("{n} exceeds maximum {max}")));
        }
    }
    Ok(())
}

fn check_enum(path: &str, s: &str, prop: &PropertySchema) -> Result<(), EventError> {
    if !prop.r#enum.is_empty() && !prop.r#enum.iter().any(|v| v == s) {
        return Err(invalid(path, format!("{s:?} is not one of {:?}", prop.r#enum)));
    }
    Ok(())
}

fn invalid(path: &str, reason: String) -> EventError {
    EventError::PropertyInvalid { path: path.to_string(), reason }
}
