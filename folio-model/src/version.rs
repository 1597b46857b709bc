use crate::Document;
use folio_types::{Timestamp, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Publish status of a document in a versioned collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    #[default]
    Draft,
    Published,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    /// Reads a status from a document value; anything unrecognised is `None`.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match value?.as_str()? {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A version snapshot to be appended by the storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVersion {
    pub collection: String,
    pub parent: String,
    pub snapshot: Document,
    pub status: DocStatus,
    pub scheduled_publish_at: Option<Timestamp>,
}

/// An immutable historical snapshot of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: VersionId,
    pub collection: String,
    /// Id of the document this snapshot belongs to.
    pub parent: String,
    pub snapshot: Document,
    pub status: DocStatus,
    pub created_at: Timestamp,
    pub scheduled_publish_at: Option<Timestamp>,
}
