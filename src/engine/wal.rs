//! Write-Ahead Log (WAL) for crash recovery.
//!
//! Each entry is written as: [length: u32][crc32: u32][payload: bincode(WalEntry)]
//! The WAL is append-only and fsynced after each write. An upsert batch is a
//! single entry, so replay applies a batch entirely or not at all.

use crate::engine::distance::Space;
use crate::engine::error::{EngineError, Result};
use crate::engine::serialization::{self, SerializedRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// A single WAL entry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum WalEntry {
    CreateCollection {
        name: String,
        space: Space,
        metadata: BTreeMap<String, String>,
    },
    DropCollection {
        name: String,
    },
    Upsert {
        collection: String,
        records: Vec<SerializedRecord>,
    },
    Delete {
        collection: String,
        ids: Vec<String>,
    },
    Checkpoint,
}

/// Write-Ahead Log file manager.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
}

impl WriteAheadLog {
    /// Open (or create) a WAL file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Append an entry to the WAL and fsync.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        let payload = serialization::to_bincode(entry)?;
        let crc = crc32fast::hash(&payload);
        let len = u32::try_from(payload.len())
            .map_err(|_| EngineError::StorageError("WAL entry exceeds 4 GiB".to_string()))?;

        // One write per frame keeps a torn frame detectable by length/CRC.
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);
        self.file.write_all(&frame)?;
        self.sync()?;

        Ok(())
    }

    /// Fsync the WAL file.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Replay all valid entries from the WAL.
    /// Stops at the first corrupted or incomplete entry (crash tolerance).
    pub fn replay(&self) -> Result<Vec<WalEntry>> {
        Ok(self.read_frames()?.0)
    }

    /// Replay, then cut the file back to the end of the last valid frame so
    /// later appends are not stranded behind a torn tail.
    pub fn recover(&mut self) -> Result<Vec<WalEntry>> {
        let (entries, valid_len) = self.read_frames()?;
        let file_len = self.file.metadata()?.len();
        if valid_len < file_len {
            tracing::warn!(
                path = %self.path.display(),
                valid_len,
                discarded = file_len - valid_len,
                "discarding torn WAL tail"
            );
            self.file.set_len(valid_len)?;
            self.sync()?;
        }
        Ok(entries)
    }

    /// Valid entries plus the byte offset where the valid prefix ends.
    fn read_frames(&self) -> Result<(Vec<WalEntry>, u64)> {
        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let mut header = [0u8; 8];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(EngineError::IoError(e)),
            }
            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            // A length past the end of the file is a corrupt header.
            if len > file_len.saturating_sub(offset + 8) {
                break;
            }

            let mut payload = vec![0u8; len as usize];
            if reader.read_exact(&mut payload).is_err() {
                break; // Truncated
            }

            if crc32fast::hash(&payload) != expected_crc {
                break; // Corrupted
            }

            match serialization::from_bincode::<WalEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(_) => break,
            }
            offset += 8 + len;
        }

        Ok((entries, offset))
    }

    /// Truncate the WAL file (after a successful checkpoint).
    pub fn truncate(&mut self) -> Result<()> {
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.file.sync_all()?;
        // Reopen in append mode for subsequent frames.
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}
