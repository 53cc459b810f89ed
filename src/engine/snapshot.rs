//! Snapshot: save/load full engine state to/from disk.

use crate::engine::error::{EngineError, Result};
use crate::engine::serialization::{self, DatabaseSnapshot};
use std::fs;
use std::path::{Path, PathBuf};

/// Manages saving and loading engine snapshots.
pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    /// Create a snapshot manager for the given directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.bin")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Save a snapshot to disk. The data file is replaced atomically via rename.
    pub fn save(&self, snapshot: &DatabaseSnapshot) -> Result<()> {
        let data = serialization::to_bincode(snapshot)?;
        let tmp = self.dir.join("snapshot.bin.tmp");
        fs::write(&tmp, &data)?;
        fs::File::open(&tmp)?.sync_all()?;
        fs::rename(&tmp, self.snapshot_path())?;

        // Human-readable summary; never read back.
        let collections: Vec<serde_json::Value> = snapshot
            .collections
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "space": c.space.as_str(),
                    "record_count": c.records.len(),
                    "metadata": c.metadata,
                })
            })
            .collect();
        let manifest = serde_json::json!({ "collections": collections });
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| EngineError::SerializationError(e.to_string()))?;
        fs::write(self.manifest_path(), &manifest_bytes)?;

        Ok(())
    }

    /// Load a snapshot from disk, or return None if no snapshot exists.
    pub fn load(&self) -> Result<Option<DatabaseSnapshot>> {
        if !self.exists() {
            return Ok(None);
        }

        let data = fs::read(self.snapshot_path())?;
        let snapshot: DatabaseSnapshot = serialization::from_bincode(&data)?;
        Ok(Some(snapshot))
    }

    /// Check if a snapshot exists.
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }
}
