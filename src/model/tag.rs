use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::version::{ContentId, VersionId};

/// A human-readable label pointing at one version.
///
/// Tag names are unique across the whole namespace, not per content stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub content_id: ContentId,
    pub version_id: VersionId,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(
        name: impl Into<String>,
        content_id: impl Into<ContentId>,
        version_id: VersionId,
    ) -> Self {
        Self {
            name: name.into(),
            content_id: content_id.into(),
            version_id,
            created_at: Utc::now(),
        }
    }

    /// Copy of this tag under a new name, keeping its target and creation time.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn labels(&self, content_id: &str, version_id: VersionId) -> bool {
        self.content_id == content_id && self.version_id == version_id
    }
}
