use std::sync::Arc;

use crate::error::{VersoError, VersoResult};
use crate::model::{PublishRecord, PublishState, Version, VersionId, VersionStatus};
use crate::store::{StorageBackend, StoreOp, Transaction, VersionStore};

// ---------------------------------------------------------------------------
// PublishStateMachine: the single publish slot of each content stream
// ---------------------------------------------------------------------------

/// Tracks which version, if any, is published for each content stream.
///
/// States are `Unpublished` and `Published(versionId)`; the initial state is
/// `Unpublished` and there is no terminal state. The slot record and the
/// version statuses are always staged in the same transaction, so they
/// cannot disagree after a commit.
#[derive(Clone)]
pub struct PublishStateMachine {
    backend: Arc<dyn StorageBackend>,
    versions: VersionStore,
}

impl PublishStateMachine {
    pub fn new(backend: Arc<dyn StorageBackend>, versions: VersionStore) -> Self {
        Self { backend, versions }
    }

    pub async fn state(&self, content_id: &str) -> VersoResult<PublishState> {
        self.backend.publish_state(content_id).await
    }

    /// The currently published version.
    pub async fn current(&self, content_id: &str) -> VersoResult<Version> {
        match self.state(content_id).await? {
            PublishState::Published { version_id } => self.versions.get(content_id, version_id).await,
            PublishState::Unpublished => Err(VersoError::NothingPublished(content_id.to_string())),
        }
    }

    pub async fn history(&self, content_id: &str) -> VersoResult<Vec<PublishRecord>> {
        self.backend.publish_history(content_id).await
    }

    /// Any state → `Published(version_id)`. A different previously
    /// published version is demoted to draft in the same transaction.
    pub async fn publish(
        &self,
        tx: &mut Transaction,
        content_id: &str,
        version_id: VersionId,
        published_by: &str,
    ) -> VersoResult<Version> {
        let published_by = published_by.trim();
        if published_by.is_empty() {
            return Err(VersoError::Validation(
                "publishedBy must not be empty".to_string(),
            ));
        }

        // Resolve the target first so a missing version stages nothing.
        self.versions.get(content_id, version_id).await?;

        if let PublishState::Published { version_id: previous } = self.state(content_id).await? {
            if previous != version_id {
                self.versions
                    .set_status(tx, content_id, previous, VersionStatus::Draft, None)
                    .await?;
                tracing::info!(
                    content_id,
                    version_id = previous,
                    "Demoting previously published version"
                );
            }
        }

        let version = self
            .versions
            .set_status(
                tx,
                content_id,
                version_id,
                VersionStatus::Published,
                Some(published_by),
            )
            .await?;

        tx.stage(StoreOp::PutPublishState {
            content_id: content_id.to_string(),
            state: PublishState::Published { version_id },
        });
        tx.stage(StoreOp::AppendPublishRecord(PublishRecord {
            content_id: content_id.to_string(),
            version_id,
            published_by: published_by.to_string(),
            published_at: version.published_at.unwrap_or(version.timestamp),
        }));

        Ok(version)
    }

    /// `Published(version_id)` → `Unpublished`.
    pub async fn unpublish(
        &self,
        tx: &mut Transaction,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Version> {
        self.versions.get(content_id, version_id).await?;

        let state = self.state(content_id).await?;
        if !state.is_published(version_id) {
            return Err(VersoError::Conflict(format!(
                "version {} of '{}' is not the published version",
                version_id, content_id
            )));
        }

        let version = self
            .versions
            .set_status(tx, content_id, version_id, VersionStatus::Draft, None)
            .await?;
        tx.stage(StoreOp::PutPublishState {
            content_id: content_id.to_string(),
            state: PublishState::Unpublished,
        });
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::store::InMemoryBackend;

    async fn setup() -> (PublishStateMachine, VersionStore, Arc<dyn StorageBackend>) {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        backend
            .apply(vec![
                StoreOp::PutVersion(Version::draft("default", 1, "one", "")),
                StoreOp::PutVersion(Version::draft("default", 2, "two", "")),
            ])
            .await
            .unwrap();
        let versions = VersionStore::new(backend.clone(), LimitsConfig::default());
        (
            PublishStateMachine::new(backend.clone(), versions.clone()),
            versions,
            backend,
        )
    }

    async fn publish(
        machine: &PublishStateMachine,
        backend: &Arc<dyn StorageBackend>,
        id: VersionId,
        by: &str,
    ) -> VersoResult<Version> {
        let mut tx = Transaction::new();
        let version = machine.publish(&mut tx, "default", id, by).await?;
        tx.commit(backend).await?;
        Ok(version)
    }

    #[tokio::test]
    async fn test_initial_state_is_unpublished() {
        let (machine, _, _) = setup().await;
        assert_eq!(machine.state("default").await.unwrap(), PublishState::Unpublished);
        assert!(matches!(
            machine.current("default").await,
            Err(VersoError::NothingPublished(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_demotes_previous() {
        let (machine, versions, backend) = setup().await;
        publish(&machine, &backend, 1, "alice").await.unwrap();
        let second = publish(&machine, &backend, 2, "bob").await.unwrap();

        assert_eq!(second.published_by.as_deref(), Some("bob"));
        let first = versions.get("default", 1).await.unwrap();
        assert_eq!(first.status, VersionStatus::Draft);
        assert!(first.published_by.is_none());
        assert!(first.published_at.is_none());

        assert_eq!(
            machine.state("default").await.unwrap(),
            PublishState::Published { version_id: 2 }
        );
        assert_eq!(machine.current("default").await.unwrap().id, 2);

        let history = machine.history("default").await.unwrap();
        let ids: Vec<VersionId> = history.iter().map(|r| r.version_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unpublish_requires_current_version() {
        let (machine, _, backend) = setup().await;
        publish(&machine, &backend, 1, "alice").await.unwrap();

        let mut tx = Transaction::new();
        let err = machine.unpublish(&mut tx, "default", 2).await.unwrap_err();
        assert!(err.is_conflict());

        let mut tx = Transaction::new();
        let version = machine.unpublish(&mut tx, "default", 1).await.unwrap();
        tx.commit(&backend).await.unwrap();
        assert_eq!(version.status, VersionStatus::Draft);
        assert_eq!(machine.state("default").await.unwrap(), PublishState::Unpublished);
    }

    #[tokio::test]
    async fn test_publish_missing_version_stages_nothing() {
        let (machine, _, _) = setup().await;
        let mut tx = Transaction::new();
        let err = machine.publish(&mut tx, "default", 7, "alice").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(tx.is_empty());
    }

    #[tokio::test]
    async fn test_empty_publisher_rejected() {
        let (machine, _, backend) = setup().await;
        let err = publish(&machine, &backend, 1, "  ").await.unwrap_err();
        assert!(err.is_validation());
    }
}
