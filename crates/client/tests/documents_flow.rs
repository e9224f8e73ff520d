//! Integration tests for document upload and deletion through the
//! resumable storage protocol and the documents API.

mod common;

use std::sync::Mutex;

use assert_matches::assert_matches;
use japa_client::documents::{delete_document, upload_document, DocumentError, UploadRequest};
use japa_client::storage::{FirebaseStorage, MemoryStorage, StorageError, UPLOAD_CHUNK_SIZE};
use japa_core::documents::{DocumentStatus, StatusFilter, MAX_UPLOAD_BYTES};

fn storage(base_url: &str) -> FirebaseStorage {
    FirebaseStorage::new(reqwest::Client::new(), base_url, common::BUCKET)
}

fn passport(len: usize) -> UploadRequest {
    let mut request = UploadRequest::for_file("passport.scan.pdf", vec![7u8; len]);
    request.doc_type = Some("passport".into());
    request.description = Some("   ".into());
    request.content_type = Some("application/pdf".into());
    request
}

// ---------------------------------------------------------------------------
// Test: a multi-chunk upload is stored then registered
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chunked_upload_registers_document() {
    let (base_url, state) = common::spawn().await;
    let api = common::authed_client(&base_url);
    let storage = storage(&base_url);
    let seen = Mutex::new(Vec::new());
    let progress = |p: u8| seen.lock().unwrap().push(p);

    let len = UPLOAD_CHUNK_SIZE + UPLOAD_CHUNK_SIZE / 2;
    let record = upload_document(&api, &storage, passport(len), &progress)
        .await
        .unwrap();

    assert_eq!(record.name, "passport");
    assert_eq!(record.doc_type.as_deref(), Some("passport"));
    assert_eq!(record.description, None);
    assert_eq!(record.status, DocumentStatus::Pending);
    assert_eq!(record.size.as_deref(), Some("768 KB"));
    let path = record.file_path.clone().unwrap();
    assert!(path.starts_with("documents/"));
    assert!(path.ends_with("_passport.scan.pdf"));
    assert!(record.file_url.contains("alt=media"));
    assert!(record.file_url.contains("token=dl-token"));

    let backend = state.lock().unwrap();
    assert_eq!(backend.objects[&path].len(), len);
    assert_eq!(backend.upload_commands, vec!["upload", "upload, finalize"]);
    assert_eq!(*seen.lock().unwrap(), vec![0, 66, 100]);
}

// ---------------------------------------------------------------------------
// Test: an oversized file never reaches storage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_file_is_rejected_up_front() {
    let (base_url, state) = common::spawn().await;
    let api = common::authed_client(&base_url);
    let storage = MemoryStorage::new();

    let err = upload_document(&api, &storage, passport(MAX_UPLOAD_BYTES as usize + 1), &|_: u8| {})
        .await
        .unwrap_err();

    assert_matches!(err, DocumentError::TooLarge);
    assert_eq!(err.to_string(), "File size must be less than 10MB");
    assert!(storage.is_empty());
    assert!(state.lock().unwrap().documents.is_empty());
}

// ---------------------------------------------------------------------------
// Test: a storage failure registers nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_upload_registers_nothing() {
    let (base_url, state) = common::spawn().await;
    let api = common::authed_client(&base_url);
    let wrong_bucket = FirebaseStorage::new(reqwest::Client::new(), &base_url, "elsewhere");

    let err = upload_document(&api, &wrong_bucket, passport(10), &|_: u8| {})
        .await
        .unwrap_err();

    assert_matches!(err, DocumentError::Upload(StorageError::Status { status: 404, .. }));
    assert_eq!(err.to_string(), "Failed to upload file. Please try again.");
    assert!(state.lock().unwrap().documents.is_empty());
}

// ---------------------------------------------------------------------------
// Test: delete removes the stored file and the record
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_file_and_record() {
    let (base_url, state) = common::spawn().await;
    let api = common::authed_client(&base_url);
    let storage = storage(&base_url);
    let record = upload_document(&api, &storage, passport(64), &|_: u8| {})
        .await
        .unwrap();

    delete_document(&api, &storage, &record).await.unwrap();

    let backend = state.lock().unwrap();
    assert!(backend.objects.is_empty());
    assert!(backend.documents.is_empty());
}

#[tokio::test]
async fn delete_tolerates_missing_file() {
    let (base_url, state) = common::spawn().await;
    let api = common::authed_client(&base_url);
    let storage = storage(&base_url);
    let record = upload_document(&api, &storage, passport(64), &|_: u8| {})
        .await
        .unwrap();
    state.lock().unwrap().objects.clear();

    delete_document(&api, &storage, &record).await.unwrap();
    assert!(state.lock().unwrap().documents.is_empty());
}

// ---------------------------------------------------------------------------
// Test: status filters are applied by the backend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_filters_by_status() {
    let (base_url, state) = common::spawn().await;
    let api = common::authed_client(&base_url);
    let storage = MemoryStorage::new();
    for file_name in ["visa.pdf", "bank-statement.pdf"] {
        let request = UploadRequest::for_file(file_name, vec![1u8; 8]);
        upload_document(&api, &storage, request, &|_: u8| {}).await.unwrap();
    }
    state.lock().unwrap().documents[1]["status"] = "verified".into();

    let all = api.list_documents(StatusFilter::All).await.unwrap();
    let verified = api
        .list_documents(StatusFilter::Only(DocumentStatus::Verified))
        .await
        .unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0].id, 2);
    assert_eq!(verified[0].name, "bank-statement");
    assert!(all[0].file_url.starts_with("memory://documents/"));
    assert_eq!(storage.len(), 2);
    assert!(storage.get(all[0].file_path.as_deref().unwrap()).is_some());
}
