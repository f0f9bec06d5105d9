pub mod memory;
pub mod persistent;
pub mod publish;
pub mod tags;
pub mod transaction;
pub mod versions;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StorageBackendKind, StorageConfig};
use crate::error::VersoResult;
use crate::model::{PublishRecord, PublishState, Tag, Version, VersionId};

pub use memory::InMemoryBackend;
pub use publish::PublishStateMachine;
pub use tags::TagIndex;
pub use transaction::{StoreOp, Transaction};
pub use versions::VersionStore;

#[cfg(feature = "rocksdb-storage")]
pub use persistent::{open_db, RocksBackend};

// ---------------------------------------------------------------------------
// StorageBackend trait: the persistence substrate
// ---------------------------------------------------------------------------

/// Trait for durable storage of versions, tags, publish state and the
/// publish log.
///
/// Reads see only committed state. All writes go through [`apply`], which
/// must apply the whole batch or nothing.
///
/// [`apply`]: StorageBackend::apply
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get a version by content id and version id.
    async fn get_version(
        &self,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Option<Version>>;

    /// List all versions of a content stream, ordered by id ascending.
    async fn list_versions(&self, content_id: &str) -> VersoResult<Vec<Version>>;

    /// The id the next created version will receive. Starts at 1 and never
    /// moves backwards.
    async fn next_version_id(&self, content_id: &str) -> VersoResult<VersionId>;

    /// Current publish slot of a content stream.
    async fn publish_state(&self, content_id: &str) -> VersoResult<PublishState>;

    /// Publish log of a content stream, oldest first.
    async fn publish_history(&self, content_id: &str) -> VersoResult<Vec<PublishRecord>>;

    /// Get a tag by name.
    async fn get_tag(&self, name: &str) -> VersoResult<Option<Tag>>;

    /// List every tag, ordered by name.
    async fn list_tags(&self) -> VersoResult<Vec<Tag>>;

    /// Tags labelling one version, ordered by name.
    async fn tags_for_version(
        &self,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Vec<Tag>> {
        Ok(self
            .list_tags()
            .await?
            .into_iter()
            .filter(|tag| tag.labels(content_id, version_id))
            .collect())
    }

    /// Apply a batch of writes atomically.
    async fn apply(&self, ops: Vec<StoreOp>) -> VersoResult<()>;
}

/// Open the backend selected by configuration.
pub fn open_backend(config: &StorageConfig) -> VersoResult<Arc<dyn StorageBackend>> {
    match config.backend {
        StorageBackendKind::Memory => {
            tracing::info!("Using in-memory storage backend");
            Ok(Arc::new(InMemoryBackend::new()))
        }
        #[cfg(feature = "rocksdb-storage")]
        StorageBackendKind::Rocksdb => {
            tracing::info!(path = %config.path.display(), "Opening RocksDB storage backend");
            let db = open_db(&config.path)?;
            Ok(Arc::new(RocksBackend::new(db)))
        }
        #[cfg(not(feature = "rocksdb-storage"))]
        StorageBackendKind::Rocksdb => Err(crate::error::VersoError::ConfigError(
            "storage.backend 'rocksdb' requires the rocksdb-storage feature".to_string(),
        )),
    }
}
