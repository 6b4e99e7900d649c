use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ATTACHMENT_STATUS: &str = "inherit";

/// A stored image registered with the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: i64,
    /// Product the asset was attached to.
    pub parent_id: Option<i64>,
    pub file_path: String,
    pub mime_type: String,
    pub title: String,
    pub status: String,
    pub metadata: Option<MediaMetadata>,
    pub created_at: DateTime<Utc>,
}

impl MediaAsset {
    pub fn new(
        parent_id: i64,
        file_path: impl Into<String>,
        mime_type: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            parent_id: Some(parent_id),
            file_path: file_path.into(),
            mime_type: mime_type.into(),
            title: title.into(),
            status: ATTACHMENT_STATUS.to_string(),
            metadata: None,
            created_at: Utc::now(),
        }
    }
}

/// Dimensions and derived sizes of a stored image. Persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    /// Path relative to the uploads directory.
    pub file: String,
    pub filesize: u64,
    #[serde(default)]
    pub sizes: BTreeMap<String, DerivedSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSize {
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
}
