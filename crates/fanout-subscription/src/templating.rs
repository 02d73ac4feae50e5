//! Input templating: `{{ .payload.<ident> }}` substitution (spec §4.2).

use std::collections::BTreeMap;

use fanout_types::{Event, Subscription, Value};

use crate::error::SubscriptionError;

/// For each `(name, template)` in `subscription.inputs`, substitute
/// `{{ .payload.<ident> }}` patterns from the event payload. Missing
/// fields fail the whole call with `InputFieldMissing` (spec §4.2).
pub fn process_inputs(event: &Event, subscription: &Subscription) -> Result<BTreeMap<String, String>, SubscriptionError> {
    let mut rendered = BTreeMap::new();
    for (name, template) in &subscription.inputs {
        rendered.insert(name.clone(), render_template(template, &event.payload)?);
    }
    Ok(rendered)
}

fn render_template(template: &str, payload: &Value) -> Result<String, SubscriptionError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            // Unterminated marker: pass the remaining text through verbatim
            // rather than erroring on a malformed template.
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let inner = after_open[..end].trim();
        let field = inner.strip_prefix(".payload.").map(str::trim).ok_or_else(|| {
            SubscriptionError::InputFieldMissing(inner.to_string())
        })?;

        let value = payload.get_path(field).ok_or_else(|| SubscriptionError::InputFieldMissing(field.to_string()))?;
        out.push_str(&value.to_plain_string());

        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_types::EventMetadata;
    use std::collections::BTreeMap;

    fn event_with(payload: Value) -> Event {
        Event { event_type: "release.published".to_string(), schema: None, payload, metadata: EventMetadata::default() }
    }

    #[test]
    fn substitutes_payload_field() {
        let mut payload = BTreeMap::new();
        payload.insert("version".to_string(), Value::String("2.1.0".to_string()));
        let event = event_with(Value::Object(payload));

        let rendered = render_template("release {{ .payload.version }}", &event.payload).unwrap();
        assert_eq!(rendered, "release 2.1.0");
    }

    #[test]
    fn missing_field_errors() {
        let event = event_with(Value::Object(BTreeMap::new()));
        assert!(matches!(
            render_template("{{ .payload.missing }}", &event.payload),
            Err(SubscriptionError::InputFieldMissing(_))
        ));
    }

    #[test]
    fn process_inputs_renders_every_declared_input() {
        let mut payload = BTreeMap::new();
        payload.insert("version".to_string(), Value::String("2.1.0".to_string()));
        let event = event_with(Value::Object(payload));

        let mut inputs = BTreeMap::new();
        inputs.insert("release_version".to_string(), "{{ .payload.version }}".to_string());
        let subscription = Subscription {
            artifact: "org/r1:default".to_string(),
            events: vec!["release.published".to_string()],
            workflow: "build".to_string(),
            schema_version: None,
            filters: Vec::new(),
            inputs,
        };

        let rendered = process_inputs(&event, &subscription).unwrap();
        assert_eq!(rendered.get("release_version"), Some(&"2.1.0".to_string()));
    }
}
