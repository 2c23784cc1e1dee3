use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;

use crate::{
    validate_key, BlobConfig, BlobError, BlobKeyStrategy, BlobPut, BlobReceipt, BlobResult, BlobStore, ByteStream,
    OpenedBlob, TimestampKeyStrategy,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What services embed: a store, a key strategy and the upload limits.
#[derive(Clone)]
pub struct BlobAdapter {
    store: Arc<dyn BlobStore>,
    keys: Arc<dyn BlobKeyStrategy>,
    config: BlobConfig,
}

impl BlobAdapter {
    pub fn new<S: BlobStore + 'static>(store: S, config: BlobConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    pub fn from_arc(store: Arc<dyn BlobStore>, config: BlobConfig) -> Self {
        Self {
            store,
            keys: Arc::new(TimestampKeyStrategy),
            config,
        }
    }

    /// Streams `body` into the store under a freshly generated key.
    ///
    /// The size limit is enforced on the bytes actually seen, so a
    /// missing or lying `size_hint` cannot get past it.
    pub async fn put(&self, put: BlobPut, body: ByteStream) -> BlobResult<BlobReceipt> {
        let limit = self.config.max_blob_bytes;

        if let Some(size) = put.size_hint {
            if size > limit {
                return Err(BlobError::TooLarge { limit });
            }
        }

        let content_type = put
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        if !self.config.allows_content_type(&content_type) {
            return Err(BlobError::invalid(format!("Unsupported content type: {content_type}")));
        }

        let key = self.keys.object_key(put.filename.as_deref());
        validate_key(&key)?;

        let exceeded = Arc::new(AtomicBool::new(false));
        let limited = limit_stream(body, limit, Arc::clone(&exceeded));

        let result = match self.store.put(&key, Some(&content_type), limited).await {
            Ok(result) => result,
            Err(_) if exceeded.load(Ordering::SeqCst) => return Err(BlobError::TooLarge { limit }),
            Err(e) => return Err(e),
        };

        tracing::debug!(key = %key, size = result.size_bytes, store = self.store.kind(), "blob stored");

        let mut receipt = BlobReceipt::new(key, result.size_bytes).with_content_type(content_type);
        if let Some(filename) = put.filename {
            receipt = receipt.with_filename(filename);
        }
        if let Some(etag) = result.etag {
            receipt = receipt.with_etag(etag);
        }

        Ok(receipt)
    }

    pub async fn open(&self, key: &str) -> BlobResult<OpenedBlob> {
        validate_key(key)?;

        let got = self.store.get(key).await?;
        let mut receipt = BlobReceipt::new(key.to_string(), got.size_bytes);
        if let Some(ct) = got.content_type {
            receipt = receipt.with_content_type(ct);
        }
        if let Some(etag) = got.etag {
            receipt = receipt.with_etag(etag);
        }

        Ok(OpenedBlob::new(receipt, got.stream))
    }

    pub async fn head(&self, key: &str) -> BlobResult<BlobReceipt> {
        validate_key(key)?;

        let head = self.store.head(key).await?;
        let mut receipt = BlobReceipt::new(key.to_string(), head.size_bytes);
        if let Some(ct) = head.content_type {
            receipt = receipt.with_content_type(ct);
        }
        if let Some(etag) = head.etag {
            receipt = receipt.with_etag(etag);
        }
        if let Some(ts) = head.last_modified {
            receipt = receipt.with_created_at(ts);
        }

        Ok(receipt)
    }

    pub async fn exists(&self, key: &str) -> BlobResult<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Idempotent.
    pub async fn delete(&self, key: &str) -> BlobResult<()> {
        validate_key(key)?;
        self.store.delete(key).await
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }
}

fn limit_stream(body: ByteStream, limit: u64, exceeded: Arc<AtomicBool>) -> ByteStream {
    let mut seen: u64 = 0;
    Box::pin(body.map(move |chunk| {
        let chunk = chunk?;
        seen += chunk.len() as u64;
        if seen > limit {
            exceeded.store(true, Ordering::SeqCst);
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("blob exceeds {limit} bytes"),
            ));
        }
        Ok(chunk)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bytes_stream, MemoryBlobStore};
    use futures_util::TryStreamExt;

    fn adapter(config: BlobConfig) -> BlobAdapter {
        BlobAdapter::new(MemoryBlobStore::new(), config)
    }

    async fn read_all(stream: ByteStream) -> Vec<u8> {
        let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn put_then_open_returns_the_same_bytes() {
        let blobs = adapter(BlobConfig::default());

        let receipt = blobs
            .put(
                BlobPut::new().with_filename("fire.png").with_content_type("image/png"),
                bytes_stream(&b"\x89PNG-fire"[..]),
            )
            .await
            .unwrap();

        assert!(receipt.key.ends_with("-fire.png"));
        assert_eq!(receipt.size_bytes, 9);

        let opened = blobs.open(&receipt.key).await.unwrap();
        assert_eq!(opened.content_type(), "image/png");
        assert_eq!(read_all(opened.stream).await, b"\x89PNG-fire");
    }

    #[tokio::test]
    async fn oversized_stream_is_rejected_without_a_size_hint() {
        let blobs = adapter(BlobConfig::default().with_max_blob_bytes(4));

        let chunks = futures_util::stream::iter(vec![
            Ok::<_, io::Error>(bytes::Bytes::from_static(b"abc")),
            Ok(bytes::Bytes::from_static(b"def")),
        ]);
        let err = blobs.put(BlobPut::new(), Box::pin(chunks)).await.unwrap_err();

        assert!(matches!(err, BlobError::TooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn oversized_size_hint_fails_fast() {
        let blobs = adapter(BlobConfig::default().with_max_blob_bytes(4));

        let err = blobs
            .put(BlobPut::new().with_size_hint(5), bytes_stream(&b"12345"[..]))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn disallowed_content_type_is_invalid() {
        let blobs = adapter(BlobConfig::default().with_allowed_content_types(["image/png"]));

        let err = blobs
            .put(BlobPut::new().with_content_type("text/html"), bytes_stream(&b"<p>"[..]))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Invalid { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_exists_follows_it() {
        let blobs = adapter(BlobConfig::default());
        let receipt = blobs.put(BlobPut::new(), bytes_stream(&b"x"[..])).await.unwrap();

        assert!(blobs.exists(&receipt.key).await.unwrap());
        blobs.delete(&receipt.key).await.unwrap();
        blobs.delete(&receipt.key).await.unwrap();
        assert!(!blobs.exists(&receipt.key).await.unwrap());
        assert!(matches!(blobs.open(&receipt.key).await, Err(BlobError::NotFound { .. })));
    }

    #[tokio::test]
    async fn path_like_keys_never_reach_the_store() {
        let blobs = adapter(BlobConfig::default());
        assert!(matches!(blobs.open("../secret").await, Err(BlobError::Invalid { .. })));
        assert!(matches!(blobs.delete("a/b").await, Err(BlobError::Invalid { .. })));
    }
}
