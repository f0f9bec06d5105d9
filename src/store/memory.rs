use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::error::VersoResult;
use crate::model::{ContentId, PublishRecord, PublishState, Tag, Version, VersionId};
use crate::store::{StorageBackend, StoreOp};

// ---------------------------------------------------------------------------
// InMemoryBackend: for testing and development
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    versions: HashMap<ContentId, BTreeMap<VersionId, Version>>,
    next_ids: HashMap<ContentId, VersionId>,
    publish_states: HashMap<ContentId, PublishState>,
    publish_history: HashMap<ContentId, Vec<PublishRecord>>,
    tags: BTreeMap<String, Tag>,
}

impl State {
    fn apply(&mut self, op: StoreOp) {
        match op {
            StoreOp::PutVersion(version) => {
                self.versions
                    .entry(version.content_id.clone())
                    .or_default()
                    .insert(version.id, version);
            }
            StoreOp::DeleteVersion {
                content_id,
                version_id,
            } => {
                if let Some(versions) = self.versions.get_mut(&content_id) {
                    versions.remove(&version_id);
                }
            }
            StoreOp::PutNextVersionId {
                content_id,
                next_id,
            } => {
                self.next_ids.insert(content_id, next_id);
            }
            StoreOp::PutPublishState { content_id, state } => {
                self.publish_states.insert(content_id, state);
            }
            StoreOp::AppendPublishRecord(record) => {
                self.publish_history
                    .entry(record.content_id.clone())
                    .or_default()
                    .push(record);
            }
            StoreOp::PutTag(tag) => {
                self.tags.insert(tag.name.clone(), tag);
            }
            StoreOp::DeleteTag(name) => {
                self.tags.remove(&name);
            }
        }
    }
}

/// In-memory backend keeping all state behind one lock, so every batch is
/// applied atomically with respect to readers.
pub struct InMemoryBackend {
    state: RwLock<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get_version(
        &self,
        content_id: &str,
        version_id: VersionId,
    ) -> VersoResult<Option<Version>> {
        let state = self.state.read().await;
        Ok(state
            .versions
            .get(content_id)
            .and_then(|versions| versions.get(&version_id))
            .cloned())
    }

    async fn list_versions(&self, content_id: &str) -> VersoResult<Vec<Version>> {
        let state = self.state.read().await;
        Ok(state
            .versions
            .get(content_id)
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn next_version_id(&self, content_id: &str) -> VersoResult<VersionId> {
        let state = self.state.read().await;
        Ok(state.next_ids.get(content_id).copied().unwrap_or(1))
    }

    async fn publish_state(&self, content_id: &str) -> VersoResult<PublishState> {
        let state = self.state.read().await;
        Ok(state
            .publish_states
            .get(content_id)
            .copied()
            .unwrap_or_default())
    }

    async fn publish_history(&self, content_id: &str) -> VersoResult<Vec<PublishRecord>> {
        let state = self.state.read().await;
        Ok(state
            .publish_history
            .get(content_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_tag(&self, name: &str) -> VersoResult<Option<Tag>> {
        let state = self.state.read().await;
        Ok(state.tags.get(name).cloned())
    }

    async fn list_tags(&self) -> VersoResult<Vec<Tag>> {
        let state = self.state.read().await;
        Ok(state.tags.values().cloned().collect())
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> VersoResult<()> {
        let mut state = self.state.write().await;
        for op in ops {
            state.apply(op);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_batch_and_read_back() {
        let backend = InMemoryBackend::new();
        let v1 = Version::draft("default", 1, "hello", "init");

        backend
            .apply(vec![
                StoreOp::PutVersion(v1.clone()),
                StoreOp::PutNextVersionId {
                    content_id: "default".to_string(),
                    next_id: 2,
                },
            ])
            .await
            .unwrap();

        assert_eq!(backend.get_version("default", 1).await.unwrap(), Some(v1));
        assert_eq!(backend.next_version_id("default").await.unwrap(), 2);
        assert_eq!(backend.next_version_id("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let backend = InMemoryBackend::new();
        let ops = [3, 1, 2]
            .into_iter()
            .map(|id| StoreOp::PutVersion(Version::draft("default", id, "x", "")))
            .collect();
        backend.apply(ops).await.unwrap();

        let ids: Vec<VersionId> = backend
            .list_versions("default")
            .await
            .unwrap()
            .iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_tags_for_version_filters_by_content() {
        let backend = InMemoryBackend::new();
        backend
            .apply(vec![
                StoreOp::PutTag(Tag::new("a", "default", 1)),
                StoreOp::PutTag(Tag::new("b", "other", 1)),
                StoreOp::PutTag(Tag::new("c", "default", 2)),
            ])
            .await
            .unwrap();

        let tags = backend.tags_for_version("default", 1).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "a");
    }
}
