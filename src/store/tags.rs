use std::sync::Arc;

use crate::config::LimitsConfig;
use crate::error::{VersoError, VersoResult};
use crate::model::{Tag, VersionId};
use crate::store::{StorageBackend, StoreOp, Transaction, VersionStore};

/// Global index of tag name → version.
///
/// Names are unique across every content stream. Mutating methods stage
/// their writes; the caller must hold the tag namespace critical section
/// (and, for `create`, the content stream's too) until commit.
#[derive(Clone)]
pub struct TagIndex {
    backend: Arc<dyn StorageBackend>,
    versions: VersionStore,
    limits: LimitsConfig,
}

impl TagIndex {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        versions: VersionStore,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            backend,
            versions,
            limits,
        }
    }

    pub async fn create(
        &self,
        tx: &mut Transaction,
        content_id: &str,
        version_id: VersionId,
        name: &str,
    ) -> VersoResult<Tag> {
        let name = self.normalize(name)?;
        self.versions.get(content_id, version_id).await?;
        self.ensure_available(&name).await?;

        let tag = Tag::new(name, content_id, version_id);
        tx.stage(StoreOp::PutTag(tag.clone()));
        Ok(tag)
    }

    pub async fn get(&self, name: &str) -> VersoResult<Tag> {
        self.backend
            .get_tag(name)
            .await?
            .ok_or_else(|| VersoError::TagNotFound(name.to_string()))
    }

    pub async fn list(&self) -> VersoResult<Vec<Tag>> {
        self.backend.list_tags().await
    }

    pub async fn list_by_version(
        &self,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Vec<Tag>> {
        self.backend.tags_for_version(content_id, version_id).await
    }

    /// Stage a rename. The tag keeps its target and creation time.
    pub async fn update(
        &self,
        tx: &mut Transaction,
        old_name: &str,
        new_name: &str,
    ) -> VersoResult<Tag> {
        let existing = self.get(old_name).await?;
        let new_name = self.normalize(new_name)?;
        if new_name == existing.name {
            return Ok(existing);
        }
        self.ensure_available(&new_name).await?;

        let renamed = existing.renamed(new_name);
        tx.stage(StoreOp::DeleteTag(existing.name));
        tx.stage(StoreOp::PutTag(renamed.clone()));
        Ok(renamed)
    }

    pub async fn delete(&self, tx: &mut Transaction, name: &str) -> VersoResult<Tag> {
        let existing = self.get(name).await?;
        tx.stage(StoreOp::DeleteTag(existing.name.clone()));
        Ok(existing)
    }

    /// Stage removal of every tag labelling a version. Returns the removed tags.
    pub async fn delete_for_version(
        &self,
        tx: &mut Transaction,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Vec<Tag>> {
        let tags = self.list_by_version(content_id, version_id).await?;
        for tag in &tags {
            tx.stage(StoreOp::DeleteTag(tag.name.clone()));
        }
        Ok(tags)
    }

    async fn ensure_available(&self, name: &str) -> VersoResult<()> {
        if let Some(existing) = self.backend.get_tag(name).await? {
            return Err(VersoError::Conflict(format!(
                "tag '{}' already exists on version {} of '{}'",
                name, existing.version_id, existing.content_id
            )));
        }
        Ok(())
    }

    /// Trim and validate a tag name. Names are used as URL path segments.
    fn normalize(&self, name: &str) -> VersoResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VersoError::Validation(
                "tag name must not be empty".to_string(),
            ));
        }
        if name.chars().count() > self.limits.max_tag_chars {
            return Err(VersoError::Validation(format!(
                "tag name exceeds {} characters",
                self.limits.max_tag_chars
            )));
        }
        if name.chars().any(|c| c == '/' || c.is_control()) {
            return Err(VersoError::Validation(
                "tag name must not contain '/' or control characters".to_string(),
            ));
        }
        Ok(name.to_string())
    }
}
