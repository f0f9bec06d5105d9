use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::version::{ContentId, VersionId};

/// The single publish slot of a content stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublishState {
    #[default]
    Unpublished,
    #[serde(rename_all = "camelCase")]
    Published { version_id: VersionId },
}

impl PublishState {
    pub fn published_version(&self) -> Option<VersionId> {
        match self {
            PublishState::Unpublished => None,
            PublishState::Published { version_id } => Some(*version_id),
        }
    }

    pub fn is_published(&self, id: VersionId) -> bool {
        self.published_version() == Some(id)
    }
}

/// One entry of a content stream's publish log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRecord {
    pub content_id: ContentId,
    pub version_id: VersionId,
    pub published_by: String,
    pub published_at: DateTime<Utc>,
}
