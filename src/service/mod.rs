//! Version control service: the facade every outer surface talks to.
//!
//! Owns the version store, tag index and publish state machine, and the
//! critical sections that serialize mutations. Every mutating operation
//! follows the same shape: lock, validate and stage into a [`Transaction`],
//! commit, unlock.

pub mod locks;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::LimitsConfig;
use crate::diff::{self, Change, DiffSummary};
use crate::error::VersoResult;
use crate::model::{validate_content_id, PublishRecord, PublishState, Tag, Version, VersionId};
use crate::store::{
    InMemoryBackend, PublishStateMachine, StorageBackend, TagIndex, Transaction, VersionStore,
};

pub use locks::{ContentGuard, ContentLocks};

/// Line diff between two versions of one content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDiff {
    pub from_version_id: VersionId,
    pub to_version_id: VersionId,
    pub changes: Vec<Change>,
    pub additions: usize,
    pub deletions: usize,
}

pub struct VersionControlService {
    backend: Arc<dyn StorageBackend>,
    versions: VersionStore,
    tags: TagIndex,
    publisher: PublishStateMachine,
    content_locks: ContentLocks,
    tag_lock: Mutex<()>,
}

impl VersionControlService {
    pub fn new(backend: Arc<dyn StorageBackend>, limits: LimitsConfig) -> Self {
        let versions = VersionStore::new(backend.clone(), limits);
        let tags = TagIndex::new(backend.clone(), versions.clone(), limits);
        let publisher = PublishStateMachine::new(backend.clone(), versions.clone());
        Self {
            backend,
            versions,
            tags,
            publisher,
            content_locks: ContentLocks::new(),
            tag_lock: Mutex::new(()),
        }
    }

    /// Service over a fresh in-memory backend with default limits.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()), LimitsConfig::default())
    }

    /// Enter the critical section of a well-formed content id.
    async fn lock_content(&self, content_id: &str) -> VersoResult<ContentGuard<'_>> {
        validate_content_id(content_id)?;
        Ok(self.content_locks.lock(content_id).await)
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    pub async fn create_version(
        &self,
        content_id: &str,
        content: String,
        message: Option<String>,
    ) -> VersoResult<Version> {
        let _guard = self.lock_content(content_id).await?;
        let mut tx = Transaction::new();
        let version = self.versions.create(&mut tx, content_id, content, message).await?;
        tx.commit(&self.backend).await?;

        tracing::info!(content_id, version_id = version.id, "Created version");
        Ok(version)
    }

    pub async fn list_versions(&self, content_id: &str) -> VersoResult<Vec<Version>> {
        self.versions.list(content_id).await
    }

    pub async fn get_version(
        &self,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Version> {
        self.versions.get(content_id, version_id).await
    }

    /// Delete a draft version together with every tag labelling it.
    pub async fn delete_version(
        &self,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Version> {
        let _content = self.lock_content(content_id).await?;
        let _tags = self.tag_lock.lock().await;

        let mut tx = Transaction::new();
        let version = match self.versions.delete(&mut tx, content_id, version_id).await {
            Ok(version) => version,
            Err(err) => {
                if err.is_conflict() {
                    tracing::warn!(content_id, version_id, "Refused to delete published version");
                }
                return Err(err);
            }
        };
        let removed = self
            .tags
            .delete_for_version(&mut tx, content_id, version_id)
            .await?;
        tx.commit(&self.backend).await?;

        tracing::info!(
            content_id,
            version_id,
            tags_removed = removed.len(),
            "Deleted version"
        );
        Ok(version)
    }

    /// Create a new draft carrying the content of `target_id`.
    pub async fn revert(&self, content_id: &str, target_id: VersionId) -> VersoResult<Version> {
        let _guard = self.lock_content(content_id).await?;
        let target = self.versions.get(content_id, target_id).await?;

        let mut tx = Transaction::new();
        let version = self
            .versions
            .create(
                &mut tx,
                content_id,
                target.content,
                Some(format!("Reverted to version {}", target_id)),
            )
            .await?;
        tx.commit(&self.backend).await?;

        tracing::info!(
            content_id,
            version_id = version.id,
            reverted_to = target_id,
            "Reverted content"
        );
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    pub async fn current_version(&self, content_id: &str) -> VersoResult<Version> {
        self.publisher.current(content_id).await
    }

    pub async fn publish(
        &self,
        content_id: &str,
        version_id: VersionId,
        published_by: &str,
    ) -> VersoResult<Version> {
        let _guard = self.lock_content(content_id).await?;
        let mut tx = Transaction::new();
        let version = self
            .publisher
            .publish(&mut tx, content_id, version_id, published_by)
            .await?;
        tx.commit(&self.backend).await?;

        tracing::info!(
            content_id,
            version_id,
            published_by = version.published_by.as_deref().unwrap_or_default(),
            "Published version"
        );
        Ok(version)
    }

    pub async fn unpublish(&self, content_id: &str, version_id: VersionId) -> VersoResult<Version> {
        let _guard = self.lock_content(content_id).await?;
        let mut tx = Transaction::new();
        let version = match self.publisher.unpublish(&mut tx, content_id, version_id).await {
            Ok(version) => version,
            Err(err) => {
                if err.is_conflict() {
                    tracing::warn!(content_id, version_id, "Version is not published");
                }
                return Err(err);
            }
        };
        tx.commit(&self.backend).await?;

        tracing::info!(content_id, version_id, "Unpublished version");
        Ok(version)
    }

    pub async fn publish_state(&self, content_id: &str) -> VersoResult<PublishState> {
        self.publisher.state(content_id).await
    }

    pub async fn publish_history(&self, content_id: &str) -> VersoResult<Vec<PublishRecord>> {
        self.publisher.history(content_id).await
    }

    // -----------------------------------------------------------------------
    // Diff
    // -----------------------------------------------------------------------

    pub async fn diff(
        &self,
        content_id: &str,
        from_id: VersionId,
        to_id: VersionId,
    ) -> VersoResult<VersionDiff> {
        let from = self.versions.get(content_id, from_id).await?;
        let to = self.versions.get(content_id, to_id).await?;

        let (changes, summary) = diff::diff_with_summary(&from.content, &to.content);
        let DiffSummary {
            additions,
            deletions,
        } = summary;
        Ok(VersionDiff {
            from_version_id: from_id,
            to_version_id: to_id,
            changes,
            additions,
            deletions,
        })
    }

    /// The same comparison as [`diff`](Self::diff), rendered as a unified patch.
    pub async fn patch(
        &self,
        content_id: &str,
        from_id: VersionId,
        to_id: VersionId,
        context: usize,
    ) -> VersoResult<String> {
        let diff = self.diff(content_id, from_id, to_id).await?;
        Ok(diff::render_unified(
            &diff.changes,
            &format!("version {}", from_id),
            &format!("version {}", to_id),
            context,
        ))
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    pub async fn create_tag(
        &self,
        content_id: &str,
        version_id: VersionId,
        name: &str,
    ) -> VersoResult<Tag> {
        let _content = self.lock_content(content_id).await?;
        let _tags = self.tag_lock.lock().await;

        let mut tx = Transaction::new();
        let tag = match self.tags.create(&mut tx, content_id, version_id, name).await {
            Ok(tag) => tag,
            Err(err) => {
                if err.is_conflict() {
                    tracing::warn!(tag = name, "Tag name already in use");
                }
                return Err(err);
            }
        };
        tx.commit(&self.backend).await?;

        tracing::info!(content_id, version_id, tag = %tag.name, "Created tag");
        Ok(tag)
    }

    pub async fn get_tag(&self, name: &str) -> VersoResult<Tag> {
        self.tags.get(name).await
    }

    pub async fn list_tags(&self) -> VersoResult<Vec<Tag>> {
        self.tags.list().await
    }

    /// Tags of one version. The version itself must exist.
    pub async fn list_version_tags(
        &self,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Vec<Tag>> {
        self.versions.get(content_id, version_id).await?;
        self.tags.list_by_version(content_id, version_id).await
    }

    pub async fn rename_tag(&self, old_name: &str, new_name: &str) -> VersoResult<Tag> {
        let _tags = self.tag_lock.lock().await;
        let mut tx = Transaction::new();
        let tag = self.tags.update(&mut tx, old_name, new_name).await?;
        tx.commit(&self.backend).await?;

        tracing::info!(from = old_name, tag = %tag.name, "Renamed tag");
        Ok(tag)
    }

    pub async fn delete_tag(&self, name: &str) -> VersoResult<Tag> {
        let _tags = self.tag_lock.lock().await;
        let mut tx = Transaction::new();
        let tag = self.tags.delete(&mut tx, name).await?;
        tx.commit(&self.backend).await?;

        tracing::info!(tag = %tag.name, "Deleted tag");
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ChangeKind;
    use crate::error::VersoError;
    use crate::model::VersionStatus;

    #[tokio::test]
    async fn test_publish_flow_scenario() {
        let service = VersionControlService::in_memory();

        let v1 = service
            .create_version("default", "hello".into(), Some("init".into()))
            .await
            .unwrap();
        assert_eq!(v1.id, 1);
        assert_eq!(v1.status, VersionStatus::Draft);

        let published = service.publish("default", 1, "alice").await.unwrap();
        assert_eq!(published.published_by.as_deref(), Some("alice"));

        let v2 = service
            .create_version("default", "hello world".into(), None)
            .await
            .unwrap();
        assert_eq!(v2.id, 2);
        assert_eq!(v2.message, "New version");

        service.publish("default", 2, "bob").await.unwrap();
        let first = service.get_version("default", 1).await.unwrap();
        assert_eq!(first.status, VersionStatus::Draft);
        assert_eq!(service.current_version("default").await.unwrap().id, 2);

        let diff = service.diff("default", 1, 2).await.unwrap();
        let added: Vec<&Change> = diff
            .changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Added)
            .collect();
        assert_eq!(added.len(), 1);
        assert!(added[0].text.contains("world"));
        assert_eq!(diff.additions, 1);
        assert_eq!(diff.deletions, 1);

        let reverted = service.revert("default", 1).await.unwrap();
        assert_eq!(reverted.id, 3);
        assert_eq!(reverted.content, "hello");
        assert_eq!(reverted.message, "Reverted to version 1");
        assert_eq!(reverted.status, VersionStatus::Draft);
        assert_eq!(service.current_version("default").await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_revert_leaves_target_untouched() {
        let service = VersionControlService::in_memory();
        service.create_version("doc", "a\n".into(), None).await.unwrap();
        service.create_version("doc", "b\n".into(), None).await.unwrap();
        let before = service.get_version("doc", 1).await.unwrap();

        service.revert("doc", 1).await.unwrap();
        assert_eq!(service.get_version("doc", 1).await.unwrap(), before);
        assert_eq!(service.list_versions("doc").await.unwrap().len(), 3);

        let err = service.revert("doc", 99).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(service.list_versions("doc").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_cascades_tags() {
        let service = VersionControlService::in_memory();
        service.create_version("doc", "a".into(), None).await.unwrap();
        service.publish("doc", 1, "alice").await.unwrap();
        service.create_tag("doc", 1, "v1").await.unwrap();

        let err = service.delete_version("doc", 1).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(service.get_tag("v1").await.is_ok());

        service.unpublish("doc", 1).await.unwrap();
        service.delete_version("doc", 1).await.unwrap();
        assert!(service.get_tag("v1").await.unwrap_err().is_not_found());
        assert!(service.list_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_diff_identical_and_missing() {
        let service = VersionControlService::in_memory();
        service.create_version("doc", "same\n".into(), None).await.unwrap();

        let diff = service.diff("doc", 1, 1).await.unwrap();
        assert_eq!(diff.additions, 0);
        assert_eq!(diff.deletions, 0);
        assert!(diff.changes.iter().all(|c| c.kind == ChangeKind::Unchanged));

        let err = service.diff("doc", 1, 2).await.unwrap_err();
        assert!(matches!(err, VersoError::VersionNotFound { version_id: 2, .. }));
    }

    #[tokio::test]
    async fn test_patch_labels() {
        let service = VersionControlService::in_memory();
        service.create_version("doc", "a\n".into(), None).await.unwrap();
        service.create_version("doc", "b\n".into(), None).await.unwrap();

        let patch = service.patch("doc", 1, 2, 3).await.unwrap();
        assert!(patch.starts_with("--- version 1\n+++ version 2\n"));
        assert!(patch.contains("-a\n"));
        assert!(patch.contains("+b\n"));
    }

    #[tokio::test]
    async fn test_version_tags_require_version() {
        let service = VersionControlService::in_memory();
        let err = service.list_version_tags("doc", 1).await.unwrap_err();
        assert!(err.is_not_found());

        service.create_version("doc", "a".into(), None).await.unwrap();
        service.create_tag("doc", 1, "first").await.unwrap();
        service.rename_tag("first", "initial").await.unwrap();

        let tags = service.list_version_tags("doc", 1).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "initial");

        service.delete_tag("initial").await.unwrap();
        assert!(service.delete_tag("initial").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rejected_content_ids_leave_no_lock_entries() {
        let service = VersionControlService::in_memory();
        for i in 0..1000 {
            let id = format!("{}{}", "x".repeat(500), i);
            let err = service
                .create_version(&id, "body".into(), None)
                .await
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert!(service.content_locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_operations() {
        let service = VersionControlService::in_memory();
        for i in 0..50 {
            let id = format!("random-{i}");
            let err = service.publish(&id, 1, "alice").await.unwrap_err();
            assert!(err.is_not_found());
        }
        service.create_version("doc", "a".into(), None).await.unwrap();
        service.create_tag("doc", 1, "t").await.unwrap();
        service.delete_version("doc", 1).await.unwrap();

        assert_eq!(service.content_locks.len(), 0);
    }
}
