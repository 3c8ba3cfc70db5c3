use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored paste: metadata plus the text itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paste {
    pub id: String,
    pub language_id: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Everything about a paste except its content, for cheap listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteMetadata {
    pub id: String,
    pub language_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Paste {
    pub fn from_parts(metadata: PasteMetadata, data: String) -> Self {
        Paste {
            id: metadata.id,
            language_id: metadata.language_id,
            data,
            created_at: metadata.created_at,
            updated_at: metadata.updated_at,
            expires_at: metadata.expires_at,
        }
    }

    pub fn metadata(&self) -> PasteMetadata {
        PasteMetadata {
            id: self.id.clone(),
            language_id: self.language_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        }
    }

    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        expired(self.expires_at, now)
    }
}

impl PasteMetadata {
    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        expired(self.expires_at, now)
    }
}

fn expired(expires_at: Option<DateTime<Utc>>, now: &DateTime<Utc>) -> bool {
    matches!(expires_at, Some(expires_at) if expires_at < *now)
}

/// Whether `id` can be used as a single directory name or object key segment.
pub fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.chars().any(char::is_control)
}
