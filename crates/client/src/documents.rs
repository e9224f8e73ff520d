//! Document upload and deletion.
//!
//! An upload stores the file in object storage first and only then
//! registers its metadata with the backend. Deletion removes both.

use japa_core::documents::{
    default_document_name, storage_path, DocumentRecord, NewDocument, MAX_UPLOAD_BYTES,
};
use japa_core::format::format_file_size;
use japa_core::types::DbId;

use crate::api::{ApiClient, ApiError};
use crate::storage::{ObjectStorage, ProgressFn, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Please select a file to upload")]
    MissingFile,

    #[error("Please enter a document name")]
    MissingName,

    #[error("File size must be less than 10MB")]
    TooLarge,

    #[error("Failed to upload file. Please try again.")]
    Upload(#[source] StorageError),

    #[error("Failed to remove stored file: {0}")]
    Storage(#[source] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Everything the upload form collects.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub name: String,
    pub doc_type: Option<String>,
    pub description: Option<String>,
    pub visa_id: Option<DbId>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Option<Vec<u8>>,
}

impl UploadRequest {
    /// Start a request for a file, naming the document after the file.
    pub fn for_file(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        Self {
            name: default_document_name(&file_name).to_string(),
            file_name,
            bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Checks that need no I/O.
    pub fn check(&self) -> Result<(), DocumentError> {
        let bytes = match &self.bytes {
            Some(bytes) if !self.file_name.trim().is_empty() => bytes,
            _ => return Err(DocumentError::MissingFile),
        };
        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(DocumentError::TooLarge);
        }
        if self.name.trim().is_empty() {
            return Err(DocumentError::MissingName);
        }
        Ok(())
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Upload a file and register it with the backend.
///
/// Progress is reported as a percentage while the file is stored. When
/// storing fails nothing is registered.
pub async fn upload_document(
    api: &ApiClient,
    storage: &dyn ObjectStorage,
    request: UploadRequest,
    progress: ProgressFn<'_>,
) -> Result<DocumentRecord, DocumentError> {
    request.check()?;
    let UploadRequest {
        name,
        doc_type,
        description,
        visa_id,
        file_name,
        content_type,
        bytes,
    } = request;
    let bytes = bytes.ok_or(DocumentError::MissingFile)?;
    let size = format_file_size(bytes.len() as u64);
    let path = storage_path(chrono::Utc::now().timestamp_millis(), &file_name);
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    let file_url = storage
        .upload(&path, bytes, &content_type, progress)
        .await
        .map_err(|e| {
            tracing::error!(path = %path, error = %e, "Document upload failed");
            DocumentError::Upload(e)
        })?;

    let document = NewDocument {
        name: name.trim().to_string(),
        doc_type: non_blank(&doc_type),
        file_url,
        file_path: path,
        size,
        visa_id,
        description: non_blank(&description),
    };
    let record = api.create_document(&document).await?;
    tracing::info!(document_id = record.id, path = %document.file_path, "Document registered");
    Ok(record)
}

/// Delete a document's stored file and its backend record.
///
/// A file that is already gone from storage is logged and the record is
/// still deleted; any other storage failure stops before the record is
/// touched.
pub async fn delete_document(
    api: &ApiClient,
    storage: &dyn ObjectStorage,
    document: &DocumentRecord,
) -> Result<(), DocumentError> {
    if let Some(path) = document.file_path.as_deref().filter(|p| !p.is_empty()) {
        match storage.delete(path).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(document_id = document.id, path, "Stored file already missing");
            }
            Err(e) => return Err(DocumentError::Storage(e)),
        }
    }
    api.delete_document(document.id).await?;
    tracing::info!(document_id = document.id, "Document deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn request_names_document_after_file() {
        let request = UploadRequest::for_file("passport.scan.pdf", vec![1, 2, 3]);
        assert_eq!(request.name, "passport");
        assert!(request.check().is_ok());
    }

    #[test]
    fn missing_file_is_reported_before_name() {
        let request = UploadRequest::default();
        assert_matches!(request.check(), Err(DocumentError::MissingFile));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut request = UploadRequest::for_file("cv.pdf", vec![0]);
        request.name = "   ".into();
        assert_matches!(request.check(), Err(DocumentError::MissingName));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let request = UploadRequest::for_file("big.bin", vec![0; MAX_UPLOAD_BYTES as usize + 1]);
        assert_matches!(request.check(), Err(DocumentError::TooLarge));
    }
}
