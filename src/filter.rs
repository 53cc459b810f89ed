//! Backend-neutral metadata predicates.
//!
//! A [`Filter`] is a small tree of equality, membership, range and boolean
//! nodes. Each adapter translates it into its backend's native query language.
//! [`Filter::from_json`] accepts the operator-document form callers commonly
//! send over the wire:
//!
//! ```json
//! {
//!     "source": "react",
//!     "version": { "$gte": 18, "$lt": 19 },
//!     "$or": [ { "lang": "en" }, { "lang": { "$in": ["de", "fr"] } } ]
//! }
//! ```

use crate::error::{Result, StoreError};
use serde_json::Value;

/// Numeric bounds on a payload field. At least one bound must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Range {
    pub gt: Option<f64>,
    pub gte: Option<f64>,
    pub lt: Option<f64>,
    pub lte: Option<f64>,
}

impl Range {
    pub fn gt(mut self, v: f64) -> Self {
        self.gt = Some(v);
        self
    }

    pub fn gte(mut self, v: f64) -> Self {
        self.gte = Some(v);
        self
    }

    pub fn lt(mut self, v: f64) -> Self {
        self.lt = Some(v);
        self
    }

    pub fn lte(mut self, v: f64) -> Self {
        self.lte = Some(v);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }
}

/// Structured predicate over record payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals a scalar (string, number or bool).
    Eq { field: String, value: Value },
    /// Field is present and differs from a scalar.
    Ne { field: String, value: Value },
    /// Field equals any of the listed scalars.
    In { field: String, values: Vec<Value> },
    /// Numeric field within bounds.
    Range { field: String, range: Range },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn any_of<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn range(field: impl Into<String>, range: Range) -> Self {
        Filter::Range {
            field: field.into(),
            range,
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Parse the operator-document form (`$and`, `$or`, `$eq`, `$ne`, `$in`,
    /// `$gt`, `$gte`, `$lt`, `$lte`). Sibling keys are AND-ed.
    pub fn from_json(value: &Value) -> Result<Filter> {
        let filter = parse_document(value)?;
        filter.validate()?;
        Ok(filter)
    }

    /// Check structural invariants: scalar comparison values, non-empty
    /// membership lists, bounded ranges, non-empty boolean groups.
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Eq { field, value } | Filter::Ne { field, value } => {
                check_field(field)?;
                check_scalar(field, value)
            }
            Filter::In { field, values } => {
                check_field(field)?;
                if values.is_empty() {
                    return Err(StoreError::invalid(format!(
                        "filter on '{}': $in requires at least one value",
                        field
                    )));
                }
                values.iter().try_for_each(|v| check_scalar(field, v))
            }
            Filter::Range { field, range } => {
                check_field(field)?;
                if range.is_empty() {
                    return Err(StoreError::invalid(format!(
                        "filter on '{}': range requires at least one bound",
                        field
                    )));
                }
                let bounds = [range.gt, range.gte, range.lt, range.lte];
                if bounds.iter().flatten().any(|b| !b.is_finite()) {
                    return Err(StoreError::invalid(format!(
                        "filter on '{}': range bounds must be finite",
                        field
                    )));
                }
                Ok(())
            }
            Filter::And(children) | Filter::Or(children) => {
                if children.is_empty() {
                    return Err(StoreError::invalid("boolean filter group must not be empty"));
                }
                children.iter().try_for_each(Filter::validate)
            }
        }
    }
}

fn check_field(field: &str) -> Result<()> {
    if field.is_empty() {
        return Err(StoreError::invalid("filter field name must not be empty"));
    }
    Ok(())
}

fn check_scalar(field: &str, value: &Value) -> Result<()> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        other => Err(StoreError::invalid(format!(
            "filter on '{}': expected a string, number or bool, got {}",
            field, other
        ))),
    }
}

fn parse_document(value: &Value) -> Result<Filter> {
    let obj = value
        .as_object()
        .ok_or_else(|| StoreError::invalid("filter must be a JSON object"))?;
    if obj.is_empty() {
        return Err(StoreError::invalid("filter must not be empty"));
    }

    let mut clauses = Vec::with_capacity(obj.len());
    for (key, val) in obj {
        match key.as_str() {
            "$and" => clauses.push(Filter::And(parse_group(key, val)?)),
            "$or" => clauses.push(Filter::Or(parse_group(key, val)?)),
            op if op.starts_with('$') => {
                return Err(StoreError::invalid(format!("unsupported filter operator '{}'", op)))
            }
            field => match val {
                Value::Object(ops) => clauses.extend(parse_operators(field, ops)?),
                scalar => clauses.push(Filter::eq(field, scalar.clone())),
            },
        }
    }

    Ok(if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        Filter::And(clauses)
    })
}

fn parse_group(key: &str, value: &Value) -> Result<Vec<Filter>> {
    let items = value
        .as_array()
        .ok_or_else(|| StoreError::invalid(format!("{} expects an array of filters", key)))?;
    items.iter().map(parse_document).collect()
}

fn parse_operators(field: &str, ops: &serde_json::Map<String, Value>) -> Result<Vec<Filter>> {
    let mut out = Vec::new();
    let mut range = Range::default();

    for (op, operand) in ops {
        match op.as_str() {
            "$eq" => out.push(Filter::eq(field, operand.clone())),
            "$ne" => out.push(Filter::ne(field, operand.clone())),
            "$in" => {
                let values = operand.as_array().ok_or_else(|| {
                    StoreError::invalid(format!("filter on '{}': $in expects an array", field))
                })?;
                out.push(Filter::any_of(field, values.iter().cloned()));
            }
            "$gt" => range.gt = Some(bound(field, op, operand)?),
            "$gte" => range.gte = Some(bound(field, op, operand)?),
            "$lt" => range.lt = Some(bound(field, op, operand)?),
            "$lte" => range.lte = Some(bound(field, op, operand)?),
            other => {
                return Err(StoreError::invalid(format!(
                    "filter on '{}': unsupported operator '{}'",
                    field, other
                )))
            }
        }
    }

    if !range.is_empty() {
        out.push(Filter::range(field, range));
    }
    if out.is_empty() {
        return Err(StoreError::invalid(format!(
            "filter on '{}': operator object must not be empty",
            field
        )));
    }
    Ok(out)
}

fn bound(field: &str, op: &str, operand: &Value) -> Result<f64> {
    operand.as_f64().ok_or_else(|| {
        StoreError::invalid(format!("filter on '{}': {} expects a number", field, op))
    })
}
