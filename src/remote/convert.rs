//! Translation between crate types and Qdrant's wire types.

use crate::embedded::scoring::distance_to_score;
use crate::error::{Result, StoreError};
use crate::filter::{Filter, Range};
use crate::store::{self, SearchRequest};
use crate::types::{DistanceMetric, Payload, VectorSearchResult};
use qdrant_client::qdrant::{
    self, point_id::PointIdOptions, points_selector::PointsSelectorOneOf, value::Kind,
    vectors_output::VectorsOptions, Condition, Distance, ListValue, PointId, PointsIdsList,
    PointsSelector, ScoredPoint, Struct,
};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Payload key holding the caller's original record id.
pub const RECORD_ID_KEY: &str = "_record_id";

/// Qdrant point ids must be unsigned integers or UUIDs. UUID strings are used
/// verbatim; anything else maps to a stable UUIDv5 of the string.
pub fn point_id(id: &str) -> PointId {
    let uuid = Uuid::parse_str(id).unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()));
    PointId::from(uuid.to_string())
}

fn point_id_string(id: &PointId) -> Option<String> {
    match id.point_id_options.as_ref()? {
        PointIdOptions::Num(n) => Some(n.to_string()),
        PointIdOptions::Uuid(s) => Some(s.clone()),
    }
}

pub fn to_distance(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Euclidean => Distance::Euclid,
        DistanceMetric::Dot => Distance::Dot,
    }
}

pub fn from_distance(distance: i32) -> Result<DistanceMetric> {
    match Distance::try_from(distance) {
        Ok(Distance::Cosine) => Ok(DistanceMetric::Cosine),
        Ok(Distance::Euclid) => Ok(DistanceMetric::Euclidean),
        Ok(Distance::Dot) => Ok(DistanceMetric::Dot),
        _ => Err(StoreError::unavailable(
            "remote",
            format!("unsupported distance {}", distance),
        )),
    }
}

/// Map a Qdrant score into [0, 1], higher is closer. Qdrant reports cosine and
/// dot as similarities and euclid as a raw distance; all three go through the
/// same conversion as the embedded engine.
pub fn normalize_score(metric: DistanceMetric, raw: f32) -> f32 {
    let distance = match metric {
        DistanceMetric::Cosine => 1.0 - raw,
        DistanceMetric::Euclidean => raw,
        DistanceMetric::Dot => -raw,
    };
    distance_to_score(metric, distance)
}

/// Server-side bound matching a normalized score threshold. For euclid this
/// is a maximum distance. `None` when every point clears the threshold.
pub fn native_threshold(metric: DistanceMetric, threshold: f32) -> Option<f32> {
    if threshold <= 0.0 {
        return None;
    }
    Some(match metric {
        DistanceMetric::Cosine => 2.0 * threshold - 1.0,
        DistanceMetric::Euclidean => 1.0 / threshold - 1.0,
        DistanceMetric::Dot => threshold,
    })
}

/// Normalize, threshold and rank the points of a query response.
pub fn to_results(
    metric: DistanceMetric,
    points: Vec<ScoredPoint>,
    request: &SearchRequest,
) -> Vec<VectorSearchResult> {
    let results = points
        .into_iter()
        .map(|point| {
            let (id, payload) = from_point_payload(point.id.as_ref(), point.payload);
            VectorSearchResult {
                id,
                score: normalize_score(metric, point.score),
                payload,
                vector: if request.with_vectors {
                    dense_vector(point.vectors)
                } else {
                    None
                },
            }
        })
        .collect();
    store::rank_results(results, request.limit, request.score_threshold)
}

/// Points to delete: the listed ids, the filter's matches, or their union.
pub fn delete_selector(
    ids: Option<&[String]>,
    filter: Option<&Filter>,
) -> Result<Option<PointsSelector>> {
    let ids: Option<Vec<PointId>> = ids.map(|ids| ids.iter().map(|id| point_id(id)).collect());
    let filter = filter.map(to_qdrant_filter).transpose()?;
    let selector = match (ids, filter) {
        (Some(ids), None) => PointsSelectorOneOf::Points(PointsIdsList { ids }),
        (None, Some(filter)) => PointsSelectorOneOf::Filter(filter),
        // A point goes if its id is listed or it matches.
        (Some(ids), Some(filter)) => PointsSelectorOneOf::Filter(qdrant::Filter::should([
            Condition::has_id(ids),
            Condition::from(filter),
        ])),
        (None, None) => return Ok(None),
    };
    Ok(Some(PointsSelector {
        points_selector_one_of: Some(selector),
    }))
}

pub fn json_to_value(value: &Value) -> qdrant::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(ListValue {
            values: items.iter().map(json_to_value).collect(),
        }),
        Value::Object(fields) => Kind::StructValue(Struct {
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        }),
    };
    qdrant::Value { kind: Some(kind) }
}

pub fn value_to_json(value: qdrant::Value) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(d)) => Number::from_f64(d).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

/// Build a point payload, recording the caller's id under [`RECORD_ID_KEY`].
pub fn to_point_payload(id: &str, payload: &Payload) -> qdrant_client::Payload {
    let mut out = qdrant_client::Payload::new();
    for (key, value) in payload {
        out.insert(key.clone(), json_to_value(value));
    }
    out.insert(RECORD_ID_KEY, json_to_value(&Value::String(id.to_string())));
    out
}

/// Recover the caller's id and payload from a returned point.
pub fn from_point_payload(
    id: Option<&PointId>,
    mut fields: HashMap<String, qdrant::Value>,
) -> (String, Payload) {
    let record_id = match fields.remove(RECORD_ID_KEY).map(value_to_json) {
        Some(Value::String(s)) => s,
        _ => id.and_then(point_id_string).unwrap_or_default(),
    };
    let payload = fields
        .into_iter()
        .map(|(k, v)| (k, value_to_json(v)))
        .collect();
    (record_id, payload)
}

/// Extract the single unnamed dense vector, if one was returned.
#[allow(deprecated)]
pub fn dense_vector(vectors: Option<qdrant::VectorsOutput>) -> Option<Vec<f32>> {
    match vectors?.vectors_options? {
        VectorsOptions::Vector(v) => Some(v.data),
        VectorsOptions::Vectors(_) => None,
    }
}

/// Translate a filter into a native Qdrant filter.
pub fn to_qdrant_filter(filter: &Filter) -> Result<qdrant::Filter> {
    Ok(match filter {
        Filter::And(children) => qdrant::Filter::must(conditions(children)?),
        Filter::Or(children) => qdrant::Filter::should(conditions(children)?),
        leaf => qdrant::Filter::must([to_condition(leaf)?]),
    })
}

fn conditions(children: &[Filter]) -> Result<Vec<Condition>> {
    children.iter().map(to_condition).collect()
}

fn to_condition(filter: &Filter) -> Result<Condition> {
    match filter {
        Filter::Eq { field, value } => eq_condition(field, value),
        // Present and different: neither empty nor equal.
        Filter::Ne { field, value } => Ok(qdrant::Filter::must_not([
            Condition::is_empty(field.clone()),
            eq_condition(field, value)?,
        ])
        .into()),
        Filter::In { field, values } => in_condition(field, values),
        Filter::Range { field, range } => Ok(Condition::range(field.clone(), to_range(range))),
        Filter::And(_) | Filter::Or(_) => Ok(to_qdrant_filter(filter)?.into()),
    }
}

fn eq_condition(field: &str, value: &Value) -> Result<Condition> {
    match value {
        Value::String(s) => Ok(Condition::matches(field, s.clone())),
        Value::Bool(b) => Ok(Condition::matches(field, *b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Condition::matches(field, i)),
            // Qdrant has no float match; a closed range is equivalent.
            (None, Some(f)) => Ok(Condition::range(field, to_range(&Range::default().gte(f).lte(f)))),
            _ => Err(StoreError::invalid(format!("unsupported number for `{}`", field))),
        },
        other => Err(StoreError::invalid(format!(
            "`{}` must be compared with a scalar, got {}",
            field, other
        ))),
    }
}

fn in_condition(field: &str, values: &[Value]) -> Result<Condition> {
    let strings: Option<Vec<String>> = values.iter().map(|v| v.as_str().map(String::from)).collect();
    if let Some(strings) = strings {
        return Ok(Condition::matches(field, strings));
    }
    let integers: Option<Vec<i64>> = values.iter().map(Value::as_i64).collect();
    if let Some(integers) = integers {
        return Ok(Condition::matches(field, integers));
    }
    let alternatives = values
        .iter()
        .map(|v| eq_condition(field, v))
        .collect::<Result<Vec<_>>>()?;
    Ok(qdrant::Filter::should(alternatives).into())
}

fn to_range(range: &Range) -> qdrant::Range {
    qdrant::Range {
        lt: range.lt,
        gt: range.gt,
        gte: range.gte,
        lte: range.lte,
    }
}

/// Classify a client error by its message.
pub fn classify(err: impl std::fmt::Display, name: &str) -> StoreError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("doesn't exist") || lower.contains("does not exist") {
        StoreError::not_found(name)
    } else if lower.contains("already exists") {
        StoreError::already_exists(name)
    } else {
        StoreError::unavailable("remote", message)
    }
}
