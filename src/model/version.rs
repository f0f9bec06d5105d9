use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{VersoError, VersoResult};

// ---------------------------------------------------------------------------
// Version: an immutable content snapshot with lifecycle status
// ---------------------------------------------------------------------------

/// A version identifier, unique and increasing within one content stream.
pub type VersionId = u64;

/// Identifies the logical content stream a version belongs to.
pub type ContentId = String;

/// Message used when a version is created without one.
pub const DEFAULT_MESSAGE: &str = "New version";

const MAX_CONTENT_ID_CHARS: usize = 128;

/// Lifecycle status of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Draft,
    Published,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single version entry in a content stream's history.
///
/// `content` is always the full snapshot, never a delta, so any two versions
/// can be compared or restored without replaying history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: VersionId,
    pub content_id: ContentId,
    pub content: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: VersionStatus,
    pub published_by: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Version {
    /// Create a new draft version. An empty message falls back to
    /// [`DEFAULT_MESSAGE`].
    pub fn draft(
        content_id: impl Into<ContentId>,
        id: VersionId,
        content: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let message = match message.trim() {
            "" => DEFAULT_MESSAGE.to_string(),
            trimmed => trimmed.to_string(),
        };

        Self {
            id,
            content_id: content_id.into(),
            content: content.into(),
            message,
            timestamp: Utc::now(),
            status: VersionStatus::Draft,
            published_by: None,
            published_at: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == VersionStatus::Published
    }

    /// Mark this version as published by `publisher` at `at`.
    pub fn mark_published(&mut self, publisher: impl Into<String>, at: DateTime<Utc>) {
        self.status = VersionStatus::Published;
        self.published_by = Some(publisher.into());
        self.published_at = Some(at);
    }

    /// Return this version to draft and clear publish metadata.
    pub fn mark_draft(&mut self) {
        self.status = VersionStatus::Draft;
        self.published_by = None;
        self.published_at = None;
    }
}

/// Validate a content stream identifier.
///
/// Content ids appear as URL path segments and as storage key prefixes, so
/// they must be non-empty, bounded, and free of `/` and control characters.
pub fn validate_content_id(content_id: &str) -> VersoResult<()> {
    if content_id.is_empty() {
        return Err(VersoError::Validation(
            "content id must not be empty".to_string(),
        ));
    }
    if content_id.chars().count() > MAX_CONTENT_ID_CHARS {
        return Err(VersoError::Validation(format!(
            "content id exceeds {} characters",
            MAX_CONTENT_ID_CHARS
        )));
    }
    if content_id.chars().any(|c| c == '/' || c.is_control()) {
        return Err(VersoError::Validation(
            "content id must not contain '/' or control characters".to_string(),
        ));
    }
    Ok(())
}
