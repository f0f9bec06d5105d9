use chrono::Utc;
use std::sync::Arc;

use crate::config::LimitsConfig;
use crate::error::{VersoError, VersoResult};
use crate::model::{validate_content_id, Version, VersionId, VersionStatus};
use crate::store::{StorageBackend, StoreOp, Transaction};

/// Ownership of all version records, per content stream.
///
/// Versions are append-only; only status and publish metadata change after
/// creation. Mutating methods stage their writes in a [`Transaction`] and
/// expect the caller to hold the content stream's critical section until
/// the transaction commits.
#[derive(Clone)]
pub struct VersionStore {
    backend: Arc<dyn StorageBackend>,
    limits: LimitsConfig,
}

impl VersionStore {
    pub fn new(backend: Arc<dyn StorageBackend>, limits: LimitsConfig) -> Self {
        Self { backend, limits }
    }

    /// Stage a new draft version with the next id of `content_id`.
    pub async fn create(
        &self,
        tx: &mut Transaction,
        content_id: &str,
        content: String,
        message: Option<String>,
    ) -> VersoResult<Version> {
        validate_content_id(content_id)?;
        self.validate_content(&content)?;
        let message = message.unwrap_or_default();
        self.validate_message(&message)?;

        let id = self.backend.next_version_id(content_id).await?;
        let version = Version::draft(content_id, id, content, message);

        tx.stage(StoreOp::PutVersion(version.clone()));
        tx.stage(StoreOp::PutNextVersionId {
            content_id: content_id.to_string(),
            next_id: id + 1,
        });
        Ok(version)
    }

    pub async fn get(&self, content_id: &str, version_id: VersionId) -> VersoResult<Version> {
        self.backend
            .get_version(content_id, version_id)
            .await?
            .ok_or_else(|| VersoError::version_not_found(content_id, version_id))
    }

    /// All versions of `content_id`, ordered by id ascending.
    pub async fn list(&self, content_id: &str) -> VersoResult<Vec<Version>> {
        self.backend.list_versions(content_id).await
    }

    /// Stage removal of a draft version. Published versions are rejected.
    pub async fn delete(
        &self,
        tx: &mut Transaction,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Version> {
        let version = self.get(content_id, version_id).await?;
        if version.is_published() {
            return Err(VersoError::Conflict(format!(
                "version {} of '{}' is published; unpublish it before deleting",
                version_id, content_id
            )));
        }

        tx.stage(StoreOp::DeleteVersion {
            content_id: content_id.to_string(),
            version_id,
        });
        Ok(version)
    }

    /// Stage a status change. Publishing requires `published_by`; returning
    /// to draft clears publish metadata.
    pub async fn set_status(
        &self,
        tx: &mut Transaction,
        content_id: &str,
        version_id: VersionId,
        status: VersionStatus,
        published_by: Option<&str>,
    ) -> VersoResult<Version> {
        let mut version = self.get(content_id, version_id).await?;
        match status {
            VersionStatus::Published => {
                let publisher = published_by.ok_or_else(|| {
                    VersoError::Validation("publishedBy is required to publish".to_string())
                })?;
                version.mark_published(publisher, Utc::now());
            }
            VersionStatus::Draft => version.mark_draft(),
        }

        tx.stage(StoreOp::PutVersion(version.clone()));
        Ok(version)
    }

    fn validate_content(&self, content: &str) -> VersoResult<()> {
        if content.trim().is_empty() {
            return Err(VersoError::Validation(
                "content must not be empty".to_string(),
            ));
        }
        if content.len() > self.limits.max_content_bytes {
            return Err(VersoError::Validation(format!(
                "content exceeds {} bytes",
                self.limits.max_content_bytes
            )));
        }
        Ok(())
    }

    fn validate_message(&self, message: &str) -> VersoResult<()> {
        if message.trim().chars().count() > self.limits.max_message_chars {
            return Err(VersoError::Validation(format!(
                "message exceeds {} characters",
                self.limits.max_message_chars
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBackend;

    fn store() -> (VersionStore, Arc<dyn StorageBackend>) {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        (
            VersionStore::new(backend.clone(), LimitsConfig::default()),
            backend,
        )
    }

    async fn create(
        store: &VersionStore,
        backend: &Arc<dyn StorageBackend>,
        content: &str,
    ) -> Version {
        let mut tx = Transaction::new();
        let version = store
            .create(&mut tx, "default", content.to_string(), None)
            .await
            .unwrap();
        tx.commit(backend).await.unwrap();
        version
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let (store, backend) = store();
        assert_eq!(create(&store, &backend, "a").await.id, 1);
        assert_eq!(create(&store, &backend, "b").await.id, 2);

        let listed = store.list("default").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].content, "a");
    }

    #[tokio::test]
    async fn test_uncommitted_create_is_invisible() {
        let (store, _backend) = store();
        let mut tx = Transaction::new();
        store
            .create(&mut tx, "default", "a".to_string(), None)
            .await
            .unwrap();
        drop(tx);

        assert!(store.list("default").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (store, _backend) = store();
        let mut tx = Transaction::new();

        let empty = store.create(&mut tx, "default", "  \n".to_string(), None).await;
        assert!(matches!(empty, Err(VersoError::Validation(_))));

        let oversized = "x".repeat(1_000_001);
        let big = store.create(&mut tx, "default", oversized, None).await;
        assert!(matches!(big, Err(VersoError::Validation(_))));

        let long_message = Some("m".repeat(501));
        let msg = store
            .create(&mut tx, "default", "ok".to_string(), long_message)
            .await;
        assert!(matches!(msg, Err(VersoError::Validation(_))));

        assert!(tx.is_empty());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let (store, backend) = store();
        create(&store, &backend, "a").await;
        let second = create(&store, &backend, "b").await;

        let mut tx = Transaction::new();
        store.delete(&mut tx, "default", second.id).await.unwrap();
        tx.commit(&backend).await.unwrap();

        assert_eq!(create(&store, &backend, "c").await.id, 3);
    }

    #[tokio::test]
    async fn test_delete_published_conflicts() {
        let (store, backend) = store();
        let v = create(&store, &backend, "a").await;

        let mut tx = Transaction::new();
        store
            .set_status(&mut tx, "default", v.id, VersionStatus::Published, Some("alice"))
            .await
            .unwrap();
        tx.commit(&backend).await.unwrap();

        let mut tx = Transaction::new();
        let result = store.delete(&mut tx, "default", v.id).await;
        assert!(matches!(result, Err(VersoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (store, _backend) = store();
        let err = store.get("default", 42).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
