//! File-storage collaborator.
//!
//! The gateway holds the storage reference internally; buyers only ever see
//! the bearer token. [`HttpFileStorage`] fetches the stored object over
//! HTTP (the upload host keeps files at unguessable URLs) and exposes the
//! response body as a byte stream for passthrough.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
#[cfg(test)]
use mockall::automock;
use tokio_stream::{Stream, StreamExt};

use crate::infra::{CommerceError, Result};

/// Connect/read timeout for storage fetches.
const STORAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// A streamed file body.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send>>;

/// A fetched storage object.
pub struct FileObject {
    pub content_type: String,
    pub body: ByteStream,
}

/// Fetches stored file bytes by internal reference.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn fetch(&self, file_url: &str) -> Result<FileObject>;
}

/// HTTP-backed file storage client.
pub struct HttpFileStorage {
    http: reqwest::Client,
}

impl HttpFileStorage {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(STORAGE_TIMEOUT)
            .build()
            .expect("default reqwest client");

        Self { http }
    }
}

impl Default for HttpFileStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStorage for HttpFileStorage {
    async fn fetch(&self, file_url: &str) -> Result<FileObject> {
        let response = self
            .http
            .get(file_url)
            .send()
            .await
            .map_err(|e| CommerceError::Storage(format!("fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CommerceError::Storage(format!(
                "storage returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));

        Ok(FileObject {
            content_type,
            body: Box::pin(body),
        })
    }
}
