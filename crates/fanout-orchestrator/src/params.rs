//! Step `with:` parameter parsing (spec §4.6 step 1, §6 "Step invocation
//! surface"). Strict types: unknown keys and type mismatches are rejected
//! before any state is created.

use std::collections::BTreeMap;
use std::time::Duration;

use fanout_types::Value;

use crate::error::OrchestratorError;

/// Parsed `with:` block for a `tako/fan-out@v1` step.
#[derive(Debug, Clone)]
pub struct StepParams {
    pub event_type: String,
    pub wait_for_children: bool,
    /// `None` means "use defaults at the wait step" (spec: "0 means use
    /// defaults").
    pub timeout: Option<Duration>,
    /// `0` means "no cap, run every survivor concurrently".
    pub concurrency_limit: usize,
    pub payload: Value,
    pub schema_version: Option<String>,
}

const KNOWN_KEYS: &[&str] =
    &["event_type", "wait_for_children", "timeout", "concurrency_limit", "payload", "schema_version"];

/// Parse a step's `with:` mapping. Missing `event_type` fails with
/// `ParamMissing`; a present key of the wrong shape fails with
/// `ParamInvalid`; any key outside [`KNOWN_KEYS`] is rejected.
pub fn parse(with: &BTreeMap<String, Value>) -> Result<StepParams, OrchestratorError> {
    for key in with.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            return Err(OrchestratorError::ParamInvalid {
                field: key.clone(),
                wanted: "one of event_type/wait_for_children/timeout/concurrency_limit/payload/schema_version".to_string(),
                got: "unknown key".to_string(),
            });
        }
    }

    let event_type = match with.get("event_type") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(other) => {
            return Err(OrchestratorError::ParamInvalid {
                field: "event_type".to_string(),
                wanted: "string".to_string(),
                got: other.type_name().to_string(),
            });
        }
        None => return Err(OrchestratorError::ParamMissing("event_type".to_string())),
    };

    let wait_for_children = match with.get("wait_for_children") {
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(OrchestratorError::ParamInvalid {
                field: "wait_for_children".to_string(),
                wanted: "boolean".to_string(),
                got: other.type_name().to_string(),
            });
        }
        None => false,
    };

    let timeout = match with.get("timeout") {
        Some(Value::String(s)) => parse_duration(s).map(Some)?,
        Some(other) => {
            return Err(OrchestratorError::ParamInvalid {
                field: "timeout".to_string(),
                wanted: "duration string".to_string(),
                got: other.type_name().to_string(),
            });
        }
        None => None,
    };
    let timeout = timeout.filter(|d| !d.is_zero());

    let concurrency_limit = match with.get("concurrency_limit") {
        Some(Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => *n as usize,
        Some(other) => {
            return Err(OrchestratorError::ParamInvalid {
                field: "concurrency_limit".to_string(),
                wanted: "non-negative integer".to_string(),
                got: other.type_name().to_string(),
            });
        }
        None => 0,
    };

    let payload = with.get("payload").cloned().unwrap_or_else(|| Value::Object(BTreeMap::new()));

    let schema_version = match with.get("schema_version") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(OrchestratorError::ParamInvalid {
                field: "schema_version".to_string(),
                wanted: "string".to_string(),
                got: other.type_name().to_string(),
            });
        }
        None => None,
    };

    Ok(StepParams { event_type, wait_for_children, timeout, concurrency_limit, payload, schema_version })
}

/// Parse a Go-style duration string: a sequence of `<number><unit>` pairs
/// (`ms`, `s`, `m`, `h`), e.g. `"100ms"`, `"1m30s"`, `"0"`. A bare `"0"`
/// parses to a zero duration (distinct from "unset").
fn parse_duration(s: &str) -> Result<Duration, OrchestratorError> {
    let trimmed = s.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    let mut matched_any = false;

    while !rest.is_empty() {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(OrchestratorError::TimeoutParseError(s.to_string()));
        }
        let (number, after_number) = rest.split_at(digits_end);
        let unit_end = after_number.find(|c: char| c.is_ascii_digit()).unwrap_or(after_number.len());
        let (unit, after_unit) = after_number.split_at(unit_end);

        let value: f64 = number.parse().map_err(|_| OrchestratorError::TimeoutParseError(s.to_string()))?;
        let unit_secs = match unit {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(OrchestratorError::TimeoutParseError(s.to_string())),
        };
        total += Duration::from_secs_f64(value * unit_secs);
        matched_any = true;
        rest = after_unit;
    }

    if !matched_any {
        return Err(OrchestratorError::TimeoutParseError(s.to_string()));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn missing_event_type_fails() {
        let err = parse(&with(&[])).unwrap_err();
        assert!(matches!(err, OrchestratorError::ParamMissing(field) if field == "event_type"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = parse(&with(&[
            ("event_type", Value::String("push".to_string())),
            ("bogus", Value::Bool(true)),
        ]))
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::ParamInvalid { field, .. } if field == "bogus"));
    }

    #[test]
    fn wrong_type_is_param_invalid() {
        let err = parse(&with(&[("event_type", Value::Number(1.0))])).unwrap_err();
        assert!(matches!(err, OrchestratorError::ParamInvalid { field, .. } if field == "event_type"));
    }

    #[test]
    fn zero_timeout_means_unset() {
        let params = parse(&with(&[
            ("event_type", Value::String("push".to_string())),
            ("timeout", Value::String("0".to_string())),
        ]))
        .unwrap();
        assert!(params.timeout.is_none());
    }

    #[test]
    fn duration_string_parses_compound_units() {
        let params = parse(&with(&[
            ("event_type", Value::String("push".to_string())),
            ("timeout", Value::String("1m30s".to_string())),
        ]))
        .unwrap();
        assert_eq!(params.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn defaults_are_applied_when_absent() {
        let params = parse(&with(&[("event_type", Value::String("push".to_string()))])).unwrap();
        assert!(!params.wait_for_children);
        assert_eq!(params.concurrency_limit, 0);
        assert!(params.timeout.is_none());
        assert_eq!(params.payload, Value::Object(BTreeMap::new()));
    }
}
