//! Uploaded document metadata.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Largest file accepted for upload (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Prefix under which uploaded files are stored.
pub const STORAGE_PREFIX: &str = "documents";

/// Review state assigned by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Verified => "Verified",
            Self::Rejected => "Rejected",
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            other => Err(CoreError::Validation(format!(
                "Unknown document status '{other}'"
            ))),
        }
    }
}

/// Filter for `GET /documents`. `All` sends no `status_filter`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(DocumentStatus),
}

impl StatusFilter {
    pub fn query_value(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Only(status) => Some(status.as_str()),
        }
    }

    pub fn matches(self, status: DocumentStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == status,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

/// A document as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DbId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub doc_type: Option<String>,
    pub file_url: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub visa_id: Option<DbId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<Timestamp>,
}

/// Metadata registered with `POST /documents` once the file is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub file_url: String,
    pub file_path: String,
    pub size: String,
    pub visa_id: Option<DbId>,
    pub description: Option<String>,
}

/// Partial update for `PUT /documents/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Storage object path for a file uploaded at `unix_millis`.
pub fn storage_path(unix_millis: i64, file_name: &str) -> String {
    format!("{STORAGE_PREFIX}/{unix_millis}_{file_name}")
}

/// Default document name for a file: its name up to the first dot.
pub fn default_document_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Count of documents per status, in `pending`, `verified`, `rejected` order.
pub fn status_counts(documents: &[DocumentRecord]) -> [(DocumentStatus, usize); 3] {
    [
        DocumentStatus::Pending,
        DocumentStatus::Verified,
        DocumentStatus::Rejected,
    ]
    .map(|status| {
        let count = documents.iter().filter(|d| d.status == status).count();
        (status, count)
    })
}
