//! Object storage for uploaded documents.
//!
//! [`FirebaseStorage`] speaks the Firebase Storage REST protocol: a
//! resumable session is started, the file is sent in fixed-size chunks
//! with the last chunk finalizing the object, and the returned download
//! token becomes the public URL. [`MemoryStorage`] keeps objects in
//! memory for tests and offline use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde::Deserialize;

/// Chunk size for resumable uploads. Must be a multiple of 256 KiB.
pub const UPLOAD_CHUNK_SIZE: usize = 512 * 1024;

/// Receives upload progress as a whole percentage, `0..=100`.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Storage returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage bucket is not configured")]
    MissingBucket,

    #[error("Storage protocol error: {0}")]
    Protocol(String),
}

/// Where uploaded files go.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` and return its public download URL.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        progress: ProgressFn<'_>,
    ) -> Result<String, StorageError>;

    /// Remove the object at `path`. A missing object is
    /// [`StorageError::NotFound`].
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Percentage of `done` out of `total`; an empty total counts as done.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

// ---------------------------------------------------------------------------
// Firebase
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

/// Firebase Storage REST client for one bucket.
#[derive(Debug, Clone)]
pub struct FirebaseStorage {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    auth_token: Option<String>,
}

impl FirebaseStorage {
    pub fn new(client: reqwest::Client, base_url: &str, bucket: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            auth_token: None,
        }
    }

    /// Send `Authorization: Firebase <token>` with every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// `{base}/v0/b/{bucket}/o`, the collection URL.
    fn objects_url(&self) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::Protocol(format!("invalid storage URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Protocol("storage URL cannot be a base".into()))?
            .extend(["v0", "b", &self.bucket, "o"]);
        Ok(url)
    }

    /// URL of a single object; `/` inside the path is percent-encoded.
    fn object_url(&self, path: &str) -> Result<Url, StorageError> {
        let mut url = self.objects_url()?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Protocol("storage URL cannot be a base".into()))?
            .push(path);
        Ok(url)
    }

    /// Public download URL for an object with the given token.
    pub fn download_url(&self, path: &str, token: &str) -> Result<String, StorageError> {
        let mut url = self.object_url(path)?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        Ok(url.to_string())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header("Authorization", format!("Firebase {token}")),
            None => request,
        }
    }

    async fn start_session(
        &self,
        path: &str,
        total: usize,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let mut url = self.objects_url()?;
        url.query_pairs_mut()
            .append_pair("name", path)
            .append_pair("uploadType", "resumable");

        let response = self
            .authorize(self.client.post(url))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", total.to_string())
            .header("X-Goog-Upload-Header-Content-Type", content_type)
            .json(&serde_json::json!({ "name": path, "contentType": content_type }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        upload_url(response.headers())
    }
}

fn upload_url(headers: &HeaderMap) -> Result<String, StorageError> {
    headers
        .get("X-Goog-Upload-URL")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| StorageError::Protocol("missing X-Goog-Upload-URL header".into()))
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(StorageError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ObjectStorage for FirebaseStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        progress: ProgressFn<'_>,
    ) -> Result<String, StorageError> {
        let total = bytes.len();
        let session_url = self.start_session(path, total, content_type).await?;
        tracing::debug!(path, total, "Started resumable upload");
        progress(0);

        let mut offset = 0;
        let mut metadata = None;
        // An empty file still needs one finalizing request.
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![&[][..]]
        } else {
            bytes.chunks(UPLOAD_CHUNK_SIZE).collect()
        };
        let last = chunks.len() - 1;

        for (index, chunk) in chunks.into_iter().enumerate() {
            let command = if index == last { "upload, finalize" } else { "upload" };
            let response = self
                .authorize(self.client.post(&session_url))
                .header("X-Goog-Upload-Command", command)
                .header("X-Goog-Upload-Offset", offset.to_string())
                .body(chunk.to_vec())
                .send()
                .await?;
            let response = ensure_success(response).await?;
            offset += chunk.len();
            progress(percent(offset, total));

            if index == last {
                metadata = Some(response.json::<ObjectMetadata>().await?);
            }
        }

        let metadata = metadata
            .ok_or_else(|| StorageError::Protocol("upload finished without metadata".into()))?;
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| StorageError::Protocol("object has no download token".into()))?;
        tracing::info!(path = %metadata.name, bytes = total, "Upload finalized");
        self.download_url(&metadata.name, token)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let response = self
            .authorize(self.client.delete(self.object_url(path)?))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(path.to_string()));
        }
        ensure_success(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// In-process object store. URLs are `memory://{path}`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(path).cloned())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        progress: ProgressFn<'_>,
    ) -> Result<String, StorageError> {
        progress(0);
        self.objects
            .lock()
            .map_err(|_| StorageError::Protocol("memory storage poisoned".into()))?
            .insert(path.to_string(), bytes);
        progress(100);
        Ok(format!("memory://{path}"))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Protocol("memory storage poisoned".into()))?
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(5, 10), 50);
        assert_eq!(percent(15, 10), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn object_paths_are_encoded_as_one_segment() {
        let storage = FirebaseStorage::new(
            reqwest::Client::new(),
            "https://firebasestorage.googleapis.com/",
            "japa.appspot.com",
        );
        let url = storage
            .download_url("documents/17_cv final.pdf", "tok")
            .unwrap();
        assert_eq!(
            url,
            "https://firebasestorage.googleapis.com/v0/b/japa.appspot.com/o/\
             documents%2F17_cv%20final.pdf?alt=media&token=tok"
        );
    }

    #[tokio::test]
    async fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        let url = storage
            .upload("documents/1_a.txt", b"hi".to_vec(), "text/plain", &|_: u8| {})
            .await
            .unwrap();
        assert_eq!(url, "memory://documents/1_a.txt");
        assert_eq!(storage.get("documents/1_a.txt").as_deref(), Some(&b"hi"[..]));

        storage.delete("documents/1_a.txt").await.unwrap();
        assert!(matches!(
            storage.delete("documents/1_a.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
