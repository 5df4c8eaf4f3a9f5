//! Document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which store served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Persistent store surviving restarts.
    Durable,
    /// In-process fallback, lost on restart.
    Volatile,
}

impl StorageTier {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StorageTier::Durable => "durable",
            StorageTier::Volatile => "volatile",
        }
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The latest saved content of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    /// Store-assigned record identifier.
    pub id: String,
    /// Room the document belongs to (unique per store).
    pub room_id: String,
    /// Document content.
    pub content: String,
    /// When the content was last saved.
    pub updated_at: DateTime<Utc>,
}

/// Acknowledgment of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Identifier of the record that now holds the content.
    pub document_id: String,
    /// Timestamp recorded with the content.
    pub updated_at: DateTime<Utc>,
    /// Tier that accepted the save.
    pub tier: StorageTier,
}

/// A document read back together with the tier it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub document: StoredDocument,
    pub tier: StorageTier,
}
