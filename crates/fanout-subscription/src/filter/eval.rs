//! Filter program evaluation against the event context (spec §4.2).

use fanout_types::{Event, Value};

use super::ast::{CmpOp, Expr, Literal, Program};
use crate::error::SubscriptionError;

/// Worst-case node-evaluation budget per filter call — the "sandboxed
/// with a cost limit" requirement of spec §4.2. Expressions compiled from
/// subscription declarations are small; this only guards against a
/// pathologically deep hand-authored filter.
const COST_LIMIT: u32 = 10_000;

/// Evaluate a compiled program against `event`. Returns `Ok(bool)` on a
/// well-typed boolean result, `FilterEvalError` on a runtime error (e.g.
/// cost limit exceeded), `FilterTypeError` if the expression's value isn't
/// a boolean.
pub fn evaluate(program: &Program, event: &Event) -> Result<bool, SubscriptionError> {
    let mut budget = COST_LIMIT;
    let value = eval_expr(&program.expr, event, &mut budget).map_err(|reason| SubscriptionError::FilterEvalError {
        expression: program.source.clone(),
        reason,
    })?;
    match value {
        Value::Bool(b) => Ok(b),
        _ => Err(SubscriptionError::FilterTypeError { expression: program.source.clone() }),
    }
}

fn eval_expr(expr: &Expr, event: &Event, budget: &mut u32) -> Result<Value, String> {
    *budget = budget.checked_sub(1).ok_or_else(|| "filter evaluation cost limit exceeded".to_string())?;

    match expr {
        Expr::Literal(lit) => Ok(literal_to_value(lit)),
        Expr::Path(path) => Ok(resolve_path(event, path).unwrap_or(Value::Null)),
        Expr::Not(inner) => {
            let v = eval_expr(inner, event, budget)?;
            Ok(Value::Bool(!truthy(&v)))
        }
        Expr::And(l, r) => {
            let lv = eval_expr(l, event, budget)?;
            if !truthy(&lv) {
                return Ok(Value::Bool(false));
            }
            let rv = eval_expr(r, event, budget)?;
            Ok(Value::Bool(truthy(&rv)))
        }
        Expr::Or(l, r) => {
            let lv = eval_expr(l, event, budget)?;
            if truthy(&lv) {
                return Ok(Value::Bool(true));
            }
            let rv = eval_expr(r, event, budget)?;
            Ok(Value::Bool(truthy(&rv)))
        }
        Expr::Cmp(op, l, r) => {
            let lv = eval_expr(l, event, budget)?;
            let rv = eval_expr(r, event, budget)?;
            compare(*op, &lv, &rv)
        }
    }
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Resolve a dotted path rooted at one of the context fields listed in
/// spec §4.2: `event`, `payload`, `event_type`, `schema_version`, `source`.
fn resolve_path(event: &Event, path: &[String]) -> Option<Value> {
    let (root, rest) = path.split_first()?;
    let rest_path = rest.join(".");
    match root.as_str() {
        "payload" => {
            if rest.is_empty() {
                Some(event.payload.clone())
            } else {
                event.payload.get_path(&rest_path).cloned()
            }
        }
        "event_type" => Some(Value::String(event.event_type.clone())),
        "schema_version" => event.schema_version().map(|v| Value::String(v.to_string())),
        "source" => event.source().map(|s| Value::String(s.to_string())),
        "event" => {
            let synthesized = event_as_value(event);
            if rest.is_empty() {
                Some(synthesized)
            } else {
                synthesized.get_path(&rest_path).cloned()
            }
        }
        _ => None,
    }
}

fn event_as_value(event: &Event) -> Value {
    use std::collections::BTreeMap;
    let mut map = BTreeMap::new();
    map.insert("type".to_string(), Value::String(event.event_type.clone()));
    map.insert(
        "schema".to_string(),
        event.schema.clone().map(Value::String).unwrap_or(Value::Null),
    );
    map.insert(
        "source".to_string(),
        event.source().map(|s| Value::String(s.to_string())).unwrap_or(Value::Null),
    );
    map.insert("payload".to_string(), event.payload.clone());
    Value::Object(map)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<Value, String> {
    match op {
        CmpOp::Eq => Ok(Value::Bool(values_equal(left, right))),
        CmpOp::Ne => Ok(Value::Bool(!values_equal(left, right))),
        CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
            let (l, r) = match (left.as_f64(), right.as_f64()) {
                (Some(l), Some(r)) => (l, r),
                _ => match (left.as_str(), right.as_str()) {
                    (Some(l), Some(r)) => {
                        return Ok(Value::Bool(match op {
                            CmpOp::Gt => l > r,
                            CmpOp::Ge => l >= r,
                            CmpOp::Lt => l < r,
                            CmpOp::Le => l <= r,
                            _ => unreachable!(),
                        }));
                    }
                    _ => return Err("ordering comparison requires two numbers or two strings".to_string()),
                },
            };
            Ok(Value::Bool(match op {
                CmpOp::Gt => l > r,
                CmpOp::Ge => l >= r,
                CmpOp::Lt => l < r,
                CmpOp::Le => l <= r,
                _ => unreachable!(),
            }))
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    left == right
}

#[cfg(test)]
mod tests {
    use super::super::parse::compile;
    use super::*;
    use fanout_types::EventMetadata;
    use std::collections::BTreeMap;

    fn event_with(payload: Value) -> Event {
        Event { event_type: "release.published".to_string(), schema: None, payload, metadata: EventMetadata::default() }
    }

    #[test]
    fn not_null_comparison() {
        let program = compile("payload.version != null").unwrap();
        let mut payload = BTreeMap::new();
        payload.insert("version".to_string(), Value::String("2.1.0".to_string()));
        assert!(evaluate(&program, &event_with(Value::Object(payload))).unwrap());

        let program = compile("payload.version != null").unwrap();
        assert!(!evaluate(&program, &event_with(Value::Object(BTreeMap::new()))).unwrap());
    }

    #[test]
    fn logical_combinators() {
        let mut payload = BTreeMap::new();
        payload.insert("a".to_string(), Value::Bool(true));
        payload.insert("b".to_string(), Value::String("x".to_string()));
        let event = event_with(Value::Object(payload));

        let program = compile("payload.a && payload.b == \"x\"").unwrap();
        assert!(evaluate(&program, &event).unwrap());

        let program = compile("!payload.a || payload.b == \"y\"").unwrap();
        assert!(!evaluate(&program, &event).unwrap());
    }

    #[test]
    fn non_boolean_result_is_type_error() {
        let program = compile("payload.version").unwrap();
        let mut payload = BTreeMap::new();
        payload.insert("version".to_string(), Value::String("2.1.0".to_string()));
        let err = evaluate(&program, &event_with(Value::Object(payload))).unwrap_err();
        assert!(matches!(err, SubscriptionError::FilterTypeError { .. }));
    }

    #[test]
    fn event_type_and_source_are_addressable() {
        let mut event = event_with(Value::Null);
        event.metadata.source = Some("org/producer".to_string());

        let program = compile("event_type == \"release.published\" && source == \"org/producer\"").unwrap();
        assert!(evaluate(&program, &event).unwrap());
    }
}
