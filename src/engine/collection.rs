//! In-memory collection state with an exact (brute-force) scan.

use crate::engine::distance::Space;
use crate::engine::error::Result;
use crate::engine::where_clause::Where;
use crate::types::Payload;
use std::collections::{BTreeMap, HashMap};

/// A record as the engine stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A query hit with its raw distance (lower is closer).
#[derive(Debug, Clone)]
pub struct Hit {
    pub id: String,
    pub distance: f32,
    pub payload: Payload,
    pub vector: Option<Vec<f32>>,
}

/// A named set of records sharing one similarity space.
#[derive(Debug)]
pub struct Collection {
    name: String,
    space: Space,
    /// Opaque caller metadata persisted with the collection
    metadata: BTreeMap<String, String>,
    records: HashMap<String, StoredRecord>,
}

impl Collection {
    pub fn new(name: impl Into<String>, space: Space, metadata: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            space,
            metadata,
            records: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Insert or replace the record stored under `id`.
    pub fn upsert(&mut self, id: String, vector: Vec<f32>, payload: Payload) {
        self.records.insert(id, StoredRecord { vector, payload });
    }

    /// Remove a record. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.records.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&StoredRecord> {
        self.records.get(id)
    }

    /// Ids of every record whose payload satisfies `clause`, sorted.
    pub fn matching_ids(&self, clause: &Where) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .iter()
            .filter(|(_, r)| clause.matches(&r.payload))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Any one stored record, used to infer the dimension of legacy collections.
    pub fn peek(&self) -> Option<&StoredRecord> {
        self.records.values().next()
    }

    /// Iterate over all (id, record) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StoredRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Scan every record, returning the `n` closest sorted by distance
    /// ascending, ties by id ascending.
    pub fn query(
        &self,
        query: &[f32],
        n: usize,
        clause: Option<&Where>,
        include_vectors: bool,
    ) -> Result<Vec<Hit>> {
        let mut scored: Vec<(&String, &StoredRecord, f32)> = self
            .records
            .iter()
            .filter(|(_, r)| clause.map_or(true, |w| w.matches(&r.payload)))
            .map(|(id, r)| Ok((id, r, self.space.distance(query, &r.vector)?)))
            .collect::<Result<Vec<_>>>()?;

        scored.sort_by(|a, b| a.2.total_cmp(&b.2).then_with(|| a.0.cmp(b.0)));
        scored.truncate(n);

        Ok(scored
            .into_iter()
            .map(|(id, r, distance)| Hit {
                id: id.clone(),
                distance,
                payload: r.payload.clone(),
                vector: include_vectors.then(|| r.vector.clone()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn collection(space: Space) -> Collection {
        let mut c = Collection::new("docs", space, BTreeMap::new());
        c.upsert("v1".into(), vec![1.0, 0.0, 0.0], Payload::new());
        c.upsert("v2".into(), vec![0.0, 1.0, 0.0], Payload::new());
        c.upsert("v3".into(), vec![1.0, 1.0, 0.0], Payload::new());
        c
    }

    #[test]
    fn test_query_orders_by_distance() {
        let c = collection(Space::L2);
        let hits = c.query(&[1.0, 0.0, 0.0], 2, None, false).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "v1");
        assert_relative_eq!(hits[0].distance, 0.0, epsilon = 1e-6);
        assert!(hits[0].vector.is_none());
    }

    #[test]
    fn test_query_ties_break_by_id() {
        let mut c = Collection::new("docs", Space::Cosine, BTreeMap::new());
        c.upsert("b".into(), vec![0.0, 1.0], Payload::new());
        c.upsert("a".into(), vec![0.0, 2.0], Payload::new());
        let hits = c.query(&[1.0, 0.0], 2, None, false).unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let mut c = collection(Space::L2);
        c.upsert("v1".into(), vec![5.0, 5.0, 5.0], Payload::new());
        assert_eq!(c.len(), 3);
        assert_eq!(c.get("v1").unwrap().vector, vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_query_with_clause_and_vectors() {
        let mut c = Collection::new("docs", Space::L2, BTreeMap::new());
        let react = json!({"source": "react"}).as_object().cloned().unwrap();
        let vue = json!({"source": "vue"}).as_object().cloned().unwrap();
        c.upsert("r".into(), vec![1.0, 0.0], react);
        c.upsert("v".into(), vec![1.0, 0.0], vue);

        let clause = Where::Eq("source".into(), json!("vue"));
        let hits = c.query(&[1.0, 0.0], 10, Some(&clause), true).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "v");
        assert_eq!(hits[0].vector.as_deref(), Some(&[1.0, 0.0][..]));
        assert_eq!(c.matching_ids(&clause), vec!["v".to_string()]);
    }

    #[test]
    fn test_remove() {
        let mut c = collection(Space::L2);
        assert!(c.remove("v1"));
        assert!(!c.remove("v1"));
        assert_eq!(c.len(), 2);
    }
}
