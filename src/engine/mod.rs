//! Embedded engine: multi-collection exact search over a WAL + snapshot store.
//!
//! The engine is synchronous and single-process. Every mutation is appended
//! to the write-ahead log before it is applied in memory; a checkpoint writes
//! a full snapshot and truncates the log. On open, the latest snapshot is
//! loaded and the log is replayed on top of it.

pub mod collection;
pub mod distance;
pub mod error;
pub mod serialization;
pub mod snapshot;
pub mod wal;
pub mod where_clause;

pub use collection::{Collection, Hit, StoredRecord};
pub use distance::Space;
pub use error::{EngineError, Result};
pub use where_clause::Where;

use crate::types::Payload;
use serialization::{DatabaseSnapshot, SerializedCollection, SerializedRecord};
use snapshot::SnapshotManager;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use wal::{WalEntry, WriteAheadLog};

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Checkpoint after this many WAL entries.
    pub checkpoint_interval: usize,
    /// Emit anonymized usage events on the `telemetry` tracing target.
    pub anonymized_telemetry: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
            anonymized_telemetry: true,
        }
    }
}

/// One record to write: (id, vector, payload).
pub type RecordInput = (String, Vec<f32>, Payload);

/// Persistent engine holding every collection in memory.
pub struct Engine {
    collections: BTreeMap<String, Collection>,
    wal: WriteAheadLog,
    snapshot_mgr: SnapshotManager,
    wal_count: usize,
    settings: EngineSettings,
}

impl Engine {
    /// Open or create a persistent database at the given directory.
    pub fn open(data_dir: impl AsRef<Path>, settings: EngineSettings) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let snapshot_mgr = SnapshotManager::new(data_dir)?;
        let mut wal = WriteAheadLog::open(data_dir.join("wal.log"))?;
        let mut collections = BTreeMap::new();

        if let Some(snapshot) = snapshot_mgr.load()? {
            Self::apply_snapshot(&mut collections, snapshot)?;
        }

        let entries = wal.recover()?;
        for entry in &entries {
            Self::apply_wal_entry(&mut collections, entry)?;
        }

        tracing::debug!(
            path = %data_dir.display(),
            collections = collections.len(),
            replayed = entries.len(),
            "engine opened"
        );

        let engine = Self {
            collections,
            wal,
            snapshot_mgr,
            wal_count: entries.len(),
            settings,
        };
        engine.emit_telemetry("engine_opened");
        Ok(engine)
    }

    fn apply_snapshot(
        collections: &mut BTreeMap<String, Collection>,
        snapshot: DatabaseSnapshot,
    ) -> Result<()> {
        for sc in snapshot.collections {
            let mut collection = Collection::new(sc.name.clone(), sc.space, sc.metadata);
            for record in sc.records {
                let payload = record.decode_payload()?;
                collection.upsert(record.id, record.data, payload);
            }
            collections.insert(sc.name, collection);
        }
        Ok(())
    }

    /// Apply a single WAL entry. Entries for collections that no longer
    /// exist are skipped.
    fn apply_wal_entry(
        collections: &mut BTreeMap<String, Collection>,
        entry: &WalEntry,
    ) -> Result<()> {
        match entry {
            WalEntry::CreateCollection {
                name,
                space,
                metadata,
            } => {
                collections.insert(
                    name.clone(),
                    Collection::new(name.clone(), *space, metadata.clone()),
                );
            }
            WalEntry::DropCollection { name } => {
                collections.remove(name);
            }
            WalEntry::Upsert {
                collection,
                records,
            } => {
                if let Some(c) = collections.get_mut(collection) {
                    for record in records {
                        let payload = record.decode_payload()?;
                        c.upsert(record.id.clone(), record.data.clone(), payload);
                    }
                }
            }
            WalEntry::Delete { collection, ids } => {
                if let Some(c) = collections.get_mut(collection) {
                    for id in ids {
                        c.remove(id);
                    }
                }
            }
            WalEntry::Checkpoint => {}
        }
        Ok(())
    }

    /// Create an empty collection, writing to WAL first.
    pub fn create_collection(
        &mut self,
        name: &str,
        space: Space,
        metadata: BTreeMap<String, String>,
    ) -> Result<()> {
        if self.collections.contains_key(name) {
            return Err(EngineError::CollectionExists {
                name: name.to_string(),
            });
        }

        self.log(WalEntry::CreateCollection {
            name: name.to_string(),
            space,
            metadata: metadata.clone(),
        })?;
        self.collections
            .insert(name.to_string(), Collection::new(name, space, metadata));
        self.emit_telemetry("collection_created");
        self.maybe_checkpoint();
        Ok(())
    }

    /// Drop a collection and all of its records.
    pub fn delete_collection(&mut self, name: &str) -> Result<()> {
        self.collection(name)?;
        self.log(WalEntry::DropCollection {
            name: name.to_string(),
        })?;
        self.collections.remove(name);
        self.emit_telemetry("collection_deleted");
        self.maybe_checkpoint();
        Ok(())
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Collection names in ascending order.
    pub fn list_collections(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn collection(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| EngineError::CollectionMissing {
                name: name.to_string(),
            })
    }

    /// Insert or replace a batch of records. The batch is one WAL entry.
    pub fn upsert(&mut self, name: &str, records: Vec<RecordInput>) -> Result<usize> {
        let collection = self.collection(name)?;
        if records.is_empty() {
            return Ok(0);
        }

        // Records already stored fix the dimension for the rest of the batch.
        if let Some(expected) = collection
            .peek()
            .map(|r| r.vector.len())
            .or_else(|| records.first().map(|(_, v, _)| v.len()))
        {
            if let Some((_, v, _)) = records.iter().find(|(_, v, _)| v.len() != expected) {
                return Err(EngineError::DimensionMismatch {
                    expected,
                    actual: v.len(),
                });
            }
        }

        let serialized = records
            .iter()
            .map(|(id, vector, payload)| SerializedRecord::encode(id, vector, payload))
            .collect::<Result<Vec<_>>>()?;
        self.log(WalEntry::Upsert {
            collection: name.to_string(),
            records: serialized,
        })?;

        let count = records.len();
        let collection = self.collection_mut(name)?;
        for (id, vector, payload) in records {
            collection.upsert(id, vector, payload);
        }
        self.emit_telemetry("records_upserted");
        self.maybe_checkpoint();
        Ok(count)
    }

    /// The `n` nearest records by raw distance.
    pub fn query(
        &self,
        name: &str,
        query: &[f32],
        n: usize,
        clause: Option<&Where>,
        include_vectors: bool,
    ) -> Result<Vec<Hit>> {
        self.collection(name)?
            .query(query, n, clause, include_vectors)
    }

    /// Stored records for the ids that exist, in request order.
    pub fn get(&self, name: &str, ids: &[String]) -> Result<Vec<(String, StoredRecord)>> {
        let collection = self.collection(name)?;
        Ok(ids
            .iter()
            .filter_map(|id| collection.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }

    /// Delete the union of `ids` and the records matching `clause`.
    /// Returns how many records were removed.
    pub fn delete(&mut self, name: &str, ids: &[String], clause: Option<&Where>) -> Result<usize> {
        let collection = self.collection(name)?;

        let mut targets: BTreeSet<String> = ids
            .iter()
            .filter(|id| collection.get(id).is_some())
            .cloned()
            .collect();
        if let Some(clause) = clause {
            targets.extend(collection.matching_ids(clause));
        }
        if targets.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = targets.into_iter().collect();
        self.log(WalEntry::Delete {
            collection: name.to_string(),
            ids: ids.clone(),
        })?;

        let collection = self.collection_mut(name)?;
        let removed = ids.iter().filter(|id| collection.remove(id)).count();
        self.emit_telemetry("records_deleted");
        self.maybe_checkpoint();
        Ok(removed)
    }

    pub fn count(&self, name: &str) -> Result<usize> {
        Ok(self.collection(name)?.len())
    }

    /// Force a checkpoint: snapshot + truncate WAL.
    pub fn checkpoint(&mut self) -> Result<()> {
        let snapshot = self.build_snapshot()?;
        self.snapshot_mgr.save(&snapshot)?;

        self.wal.append(&WalEntry::Checkpoint)?;
        self.wal.truncate()?;
        self.wal_count = 0;

        tracing::debug!(collections = self.collections.len(), "checkpoint written");
        Ok(())
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| EngineError::CollectionMissing {
                name: name.to_string(),
            })
    }

    fn log(&mut self, entry: WalEntry) -> Result<()> {
        self.wal.append(&entry)?;
        self.wal_count += 1;
        Ok(())
    }

    /// Checkpoint once the WAL reaches the interval. The mutation is already
    /// durable in the WAL, so a failed checkpoint is logged, not returned.
    fn maybe_checkpoint(&mut self) {
        if self.wal_count >= self.settings.checkpoint_interval {
            if let Err(e) = self.checkpoint() {
                tracing::warn!(error = %e, wal_entries = self.wal_count, "checkpoint failed");
            }
        }
    }

    fn build_snapshot(&self) -> Result<DatabaseSnapshot> {
        let collections = self
            .collections
            .values()
            .map(|c| {
                let mut records = c
                    .iter()
                    .map(|(id, r)| SerializedRecord::encode(id, &r.vector, &r.payload))
                    .collect::<Result<Vec<_>>>()?;
                records.sort_by(|a, b| a.id.cmp(&b.id));
                Ok(SerializedCollection {
                    name: c.name().to_string(),
                    space: c.space(),
                    metadata: c.metadata().clone(),
                    records,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DatabaseSnapshot { collections })
    }

    fn emit_telemetry(&self, event: &'static str) {
        if self.settings.anonymized_telemetry {
            tracing::trace!(target: "telemetry", event, "usage event");
        }
    }
}
