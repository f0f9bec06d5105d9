use std::sync::Arc;

use crate::error::VersoResult;
use crate::model::{ContentId, PublishRecord, PublishState, Tag, Version, VersionId};
use crate::store::StorageBackend;

// ---------------------------------------------------------------------------
// Transaction: all-or-nothing batches of store writes
// ---------------------------------------------------------------------------

/// Individual writes that can be part of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    PutVersion(Version),
    DeleteVersion {
        content_id: ContentId,
        version_id: VersionId,
    },
    /// Advance the id counter of a content stream.
    PutNextVersionId {
        content_id: ContentId,
        next_id: VersionId,
    },
    PutPublishState {
        content_id: ContentId,
        state: PublishState,
    },
    AppendPublishRecord(PublishRecord),
    PutTag(Tag),
    DeleteTag(String),
}

/// Collects store writes and applies them as one atomic batch.
///
/// ## Design
/// Uses a write-ahead pattern:
/// 1. Components validate against committed state and stage operations
/// 2. On commit, the whole batch is handed to the backend in one call
/// 3. Dropping an uncommitted transaction discards every staged write
///
/// Reads never observe staged operations, so every check a component makes
/// runs against the state the batch will be applied to, as long as the
/// caller holds the relevant critical section until commit.
#[derive(Debug, Default)]
pub struct Transaction {
    ops: Vec<StoreOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation to this transaction.
    pub fn stage(&mut self, op: StoreOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Commit all staged operations atomically.
    pub async fn commit(self, backend: &Arc<dyn StorageBackend>) -> VersoResult<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        let count = self.ops.len();
        backend.apply(self.ops).await?;
        tracing::debug!(ops = count, "Transaction committed");
        Ok(())
    }
}
