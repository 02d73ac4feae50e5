//! Canonical fingerprinting (spec §4.1).
//!
//! Two payloads that differ only in key order or numeric representation
//! must fingerprint identically. [`fanout_types::Value`] already stores
//! object keys in a `BTreeMap`, so lexicographic key ordering is
//! structural; this module only has to widen numbers to `f64` (already
//! true of `Value::Number`) and serialize through `serde_json`, whose
//! default `Map` is itself a `BTreeMap` (the `preserve_order` feature is
//! not enabled), so the JSON text it produces is canonical by construction.

use sha2::{Digest, Sha256};

use fanout_types::Event;

/// `fingerprint(event)`: the event's explicit metadata id if set, otherwise
/// `SHA-256(canonical_json({type, source, payload}))` as lowercase hex.
#[must_use]
pub fn fingerprint(event: &Event) -> String {
    if let Some(id) = &event.metadata.id {
        return id.clone();
    }

    let canonical = canonical_json(event);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Build the canonical JSON text fingerprinted over: `{type, source,
/// payload}`. Metadata fields other than `source` do not participate —
/// they are request-scoped bookkeeping, not part of the event's logical
/// identity.
#[must_use]
pub fn canonical_json(event: &Event) -> String {
    let value = serde_json::json!({
        "type": event.event_type,
        "source": event.metadata.source.clone().unwrap_or_default(),
        "payload": event.payload.to_json(),
    });
    // serde_json::Value's default Map is a BTreeMap, so keys serialize in
    // lexicographic order at every depth without a separate sort pass.
    value.to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_types::{Event, EventMetadata, Value};
    use std::collections::BTreeMap;

    fn event_with_payload(payload: Value) -> Event {
        Event {
            event_type: "release.published".to_string(),
            schema: None,
            payload,
            metadata: EventMetadata { source: Some("org/producer".to_string()), ..Default::default() },
        }
    }

    #[test]
    fn fingerprint_is_64_hex_chars() {
        let fp = fingerprint(&event_with_payload(Value::Null));
        assert_eq!(fp.len(), 64);
        assert!(fp.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn key_order_does_not_affect_fingerprint() {
        let mut a = BTreeMap::new();
        a.insert("version".to_string(), Value::String("2.1.0".to_string()));
        a.insert("channel".to_string(), Value::String("stable".to_string()));

        let mut b = BTreeMap::new();
        b.insert("channel".to_string(), Value::String("stable".to_string()));
        b.insert("version".to_string(), Value::String("2.1.0".to_string()));

        let fp_a = fingerprint(&event_with_payload(Value::Object(a)));
        let fp_b = fingerprint(&event_with_payload(Value::Object(b)));
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn numeric_reformatting_does_not_affect_fingerprint() {
        let fp_a = fingerprint(&event_with_payload(Value::Number(3.0)));
        let fp_b = fingerprint(&event_with_payload(Value::Number(3.000)));
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn explicit_id_overrides_computed_fingerprint() {
        let mut event = event_with_payload(Value::Null);
        event.metadata.id = Some("explicit-id".to_string());
        assert_eq!(fingerprint(&event), "explicit-id");
    }

    proptest::proptest! {
        #[test]
        fn fingerprint_is_deterministic(s in "[a-z]{1,10}") {
            let e1 = event_with_payload(Value::String(s.clone()));
            let e2 = event_with_payload(Value::String(s));
            proptest::prop_assert_eq!(fingerprint(&e1), fingerprint(&e2));
        }
    }
}
