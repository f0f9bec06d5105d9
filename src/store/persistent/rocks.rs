//! RocksDB-backed implementation of [`StorageBackend`].

use async_trait::async_trait;
use rocksdb::{ColumnFamily, Direction, IteratorMode, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{VersoError, VersoResult};
use crate::model::{PublishRecord, PublishState, Tag, Version, VersionId};
use crate::store::{StorageBackend, StoreOp};

use super::{CF_COUNTERS, CF_PUBLISH_HISTORY, CF_PUBLISH_STATE, CF_TAGS, CF_VERSIONS};

/// Separates the content id from the rest of a composite key. Content ids
/// never contain control characters, so the prefix is unambiguous.
const KEY_SEPARATOR: u8 = 0x00;

/// Suffix of the per-content publish log sequence key in `counters`.
const HISTORY_SEQ_SUFFIX: &[u8] = b"publish_seq";

pub struct RocksBackend {
    db: Arc<DB>,
    /// Serializes batches so sequence reads and writes cannot interleave.
    write_lock: Mutex<()>,
}

impl RocksBackend {
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    fn serialize<T: Serialize>(&self, value: &T, what: &str) -> VersoResult<Vec<u8>> {
        bincode::serialize(value)
            .map_err(|e| VersoError::Internal(format!("Failed to serialize {}: {}", what, e)))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8], what: &str) -> VersoResult<T> {
        bincode::deserialize(bytes)
            .map_err(|e| VersoError::Internal(format!("Failed to deserialize {}: {}", what, e)))
    }

    fn cf(&self, name: &str) -> VersoResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| VersoError::Internal(format!("Missing {} column family", name)))
    }

    /// `[content_id][0x00]`
    fn content_prefix(content_id: &str) -> Vec<u8> {
        let mut key = content_id.as_bytes().to_vec();
        key.push(KEY_SEPARATOR);
        key
    }

    /// `[content_id][0x00][version_id BE]`, so versions iterate in id order.
    fn version_key(content_id: &str, version_id: VersionId) -> Vec<u8> {
        let mut key = Self::content_prefix(content_id);
        key.extend_from_slice(&version_id.to_be_bytes());
        key
    }

    /// `[content_id][0x00][sequence BE]`, so the log iterates in append order.
    fn history_key(content_id: &str, seq: u64) -> Vec<u8> {
        let mut key = Self::content_prefix(content_id);
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    /// `[content_id][0x00]publish_seq`, holding the next log sequence number.
    fn history_seq_key(content_id: &str) -> Vec<u8> {
        let mut key = Self::content_prefix(content_id);
        key.extend_from_slice(HISTORY_SEQ_SUFFIX);
        key
    }

    fn read_counter(&self, key: &[u8]) -> VersoResult<Option<u64>> {
        let cf = self.cf(CF_COUNTERS)?;
        let bytes = self
            .db
            .get_cf(cf, key)
            .map_err(|e| VersoError::Storage(format!("Failed to read counter: {}", e)))?;

        match bytes {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| VersoError::Internal("Corrupt counter value".to_string()))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    fn get_value<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
        what: &str,
    ) -> VersoResult<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key) {
            Ok(Some(bytes)) => Ok(Some(self.deserialize(&bytes, what)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(VersoError::Storage(format!("Failed to read {}: {}", what, e))),
        }
    }

    /// All values whose key starts with `prefix`, in key order.
    fn scan_prefix<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        prefix: &[u8],
        what: &str,
    ) -> VersoResult<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut values = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| VersoError::Storage(format!("Failed to scan {}: {}", what, e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(self.deserialize(&value, what)?);
        }
        Ok(values)
    }

    /// Add one op to `batch`. `history_seqs` tracks the next publish log
    /// sequence of every content id appended to within this batch.
    fn stage(
        &self,
        batch: &mut WriteBatch,
        history_seqs: &mut HashMap<String, u64>,
        op: &StoreOp,
    ) -> VersoResult<()> {
        match op {
            StoreOp::PutVersion(version) => {
                let key = Self::version_key(&version.content_id, version.id);
                batch.put_cf(self.cf(CF_VERSIONS)?, key, self.serialize(version, "version")?);
            }
            StoreOp::DeleteVersion {
                content_id,
                version_id,
            } => {
                let key = Self::version_key(content_id, *version_id);
                batch.delete_cf(self.cf(CF_VERSIONS)?, key);
            }
            StoreOp::PutNextVersionId {
                content_id,
                next_id,
            } => {
                batch.put_cf(
                    self.cf(CF_COUNTERS)?,
                    content_id.as_bytes(),
                    next_id.to_be_bytes(),
                );
            }
            StoreOp::PutPublishState { content_id, state } => {
                batch.put_cf(
                    self.cf(CF_PUBLISH_STATE)?,
                    content_id.as_bytes(),
                    self.serialize(state, "publish state")?,
                );
            }
            StoreOp::AppendPublishRecord(record) => {
                let seq = match history_seqs.get(&record.content_id) {
                    Some(seq) => *seq,
                    None => self
                        .read_counter(&Self::history_seq_key(&record.content_id))?
                        .unwrap_or(0),
                };
                history_seqs.insert(record.content_id.clone(), seq + 1);
                batch.put_cf(
                    self.cf(CF_PUBLISH_HISTORY)?,
                    Self::history_key(&record.content_id, seq),
                    self.serialize(record, "publish record")?,
                );
            }
            StoreOp::PutTag(tag) => {
                batch.put_cf(
                    self.cf(CF_TAGS)?,
                    tag.name.as_bytes(),
                    self.serialize(tag, "tag")?,
                );
            }
            StoreOp::DeleteTag(name) => {
                batch.delete_cf(self.cf(CF_TAGS)?, name.as_bytes());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for RocksBackend {
    async fn get_version(
        &self,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Option<Version>> {
        self.get_value(
            CF_VERSIONS,
            &Self::version_key(content_id, version_id),
            "version",
        )
    }

    async fn list_versions(&self, content_id: &str) -> VersoResult<Vec<Version>> {
        self.scan_prefix(CF_VERSIONS, &Self::content_prefix(content_id), "version")
    }

    async fn next_version_id(&self, content_id: &str) -> VersoResult<VersionId> {
        Ok(self.read_counter(content_id.as_bytes())?.unwrap_or(1))
    }

    async fn publish_state(&self, content_id: &str) -> VersoResult<PublishState> {
        Ok(self
            .get_value(CF_PUBLISH_STATE, content_id.as_bytes(), "publish state")?
            .unwrap_or_default())
    }

    async fn publish_history(&self, content_id: &str) -> VersoResult<Vec<PublishRecord>> {
        self.scan_prefix(
            CF_PUBLISH_HISTORY,
            &Self::content_prefix(content_id),
            "publish record",
        )
    }

    async fn get_tag(&self, name: &str) -> VersoResult<Option<Tag>> {
        self.get_value(CF_TAGS, name.as_bytes(), "tag")
    }

    async fn list_tags(&self) -> VersoResult<Vec<Tag>> {
        let cf = self.cf(CF_TAGS)?;
        let mut tags = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) =
                item.map_err(|e| VersoError::Storage(format!("Failed to scan tags: {}", e)))?;
            tags.push(self.deserialize(&value, "tag")?);
        }
        Ok(tags)
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> VersoResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut batch = WriteBatch::default();
        let mut history_seqs = HashMap::new();
        for op in &ops {
            self.stage(&mut batch, &mut history_seqs, op)?;
        }
        for (content_id, next) in &history_seqs {
            batch.put_cf(
                self.cf(CF_COUNTERS)?,
                Self::history_seq_key(content_id),
                next.to_be_bytes(),
            );
        }
        self.db
            .write(batch)
            .map_err(|e| VersoError::Storage(format!("Failed to write batch: {}", e)))
    }
}
