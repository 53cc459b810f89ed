//! The engine's native metadata predicate, evaluated against stored payloads.

use crate::types::Payload;
use serde_json::Value;
use std::cmp::Ordering;

/// A `where` clause. A condition on a field the payload lacks never matches.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    Gt(String, f64),
    Gte(String, f64),
    Lt(String, f64),
    Lte(String, f64),
    And(Vec<Where>),
    Or(Vec<Where>),
}

impl Where {
    pub fn matches(&self, payload: &Payload) -> bool {
        match self {
            Where::And(children) => children.iter().all(|w| w.matches(payload)),
            Where::Or(children) => children.iter().any(|w| w.matches(payload)),
            Where::Eq(field, value) => payload.get(field).is_some_and(|v| scalar_eq(v, value)),
            Where::Ne(field, value) => payload.get(field).is_some_and(|v| !scalar_eq(v, value)),
            Where::In(field, values) => payload
                .get(field)
                .is_some_and(|v| values.iter().any(|candidate| scalar_eq(v, candidate))),
            Where::Gt(field, bound) => compare(payload, field, *bound, |o| o == Ordering::Greater),
            Where::Gte(field, bound) => compare(payload, field, *bound, |o| o != Ordering::Less),
            Where::Lt(field, bound) => compare(payload, field, *bound, |o| o == Ordering::Less),
            Where::Lte(field, bound) => compare(payload, field, *bound, |o| o != Ordering::Greater),
        }
    }
}

/// Numbers compare by value (`1 == 1.0`); other scalars compare structurally.
fn scalar_eq(stored: &Value, expected: &Value) -> bool {
    match (stored, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        (a, b) => a == b,
    }
}

fn compare(payload: &Payload, field: &str, bound: f64, accept: impl Fn(Ordering) -> bool) -> bool {
    payload
        .get(field)
        .and_then(Value::as_f64)
        .and_then(|x| x.partial_cmp(&bound))
        .is_some_and(accept)
}
