use std::collections::HashMap;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::RwLock;

use crate::{bytes_stream, validate_key, BlobError, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, PutResult};

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: Option<String>,
    stored_at: i64,
}

/// Process-local store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, content_type: Option<&str>, mut stream: ByteStream) -> BlobResult<PutResult> {
        validate_key(key)?;

        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }

        let data = buf.freeze();
        let size_bytes = data.len() as u64;

        self.blobs.write().await.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.map(str::to_string),
                stored_at: chrono::Utc::now().timestamp(),
            },
        );

        Ok(PutResult { etag: None, size_bytes })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let blob = self
            .blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::not_found(key))?;

        Ok(GetResult {
            size_bytes: blob.data.len() as u64,
            stream: bytes_stream(blob.data),
            content_type: blob.content_type,
            etag: None,
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let blobs = self.blobs.read().await;
        let blob = blobs.get(key).ok_or_else(|| BlobError::not_found(key))?;

        Ok(ObjectHead {
            size_bytes: blob.data.len() as u64,
            content_type: blob.content_type.clone(),
            etag: None,
            last_modified: Some(blob.stored_at),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
