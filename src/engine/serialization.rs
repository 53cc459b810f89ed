//! Serialization utilities: bincode for frames and snapshots, JSON for payloads.
//!
//! bincode cannot decode self-describing values, so payloads travel as JSON
//! text inside bincode-encoded structures.

use crate::engine::distance::Space;
use crate::engine::error::{EngineError, Result};
use crate::types::Payload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable representation of a stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedRecord {
    pub id: String,
    pub data: Vec<f32>,
    pub payload_json: String,
}

impl SerializedRecord {
    pub fn encode(id: &str, data: &[f32], payload: &Payload) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            data: data.to_vec(),
            payload_json: payload_to_json(payload)?,
        })
    }

    pub fn decode_payload(&self) -> Result<Payload> {
        payload_from_json(&self.payload_json)
    }
}

/// Serializable representation of one collection.
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedCollection {
    pub name: String,
    pub space: Space,
    pub metadata: BTreeMap<String, String>,
    pub records: Vec<SerializedRecord>,
}

/// Serializable representation of the full engine state.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub collections: Vec<SerializedCollection>,
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| EngineError::SerializationError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| EngineError::SerializationError(e.to_string()))
}

pub fn payload_to_json(payload: &Payload) -> Result<String> {
    serde_json::to_string(payload).map_err(|e| EngineError::SerializationError(e.to_string()))
}

pub fn payload_from_json(text: &str) -> Result<Payload> {
    serde_json::from_str(text).map_err(|e| EngineError::SerializationError(e.to_string()))
}
