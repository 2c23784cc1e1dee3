use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{validate_key, BlobError, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, PutResult};

const SIDECAR_SUFFIX: &str = ".meta.json";

/// Sidecar written next to each blob as `<key>.meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobSidecar {
    content_type: Option<String>,
    size_bytes: u64,
    stored_at: i64,
}

/// Blobs as flat files under one directory.
///
/// Writes go to a hidden temporary file that is synced and renamed into
/// place, so a reader never sees a partial blob.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sidecars and hidden temp files share the directory with blobs and
    /// must not be addressable as blobs themselves.
    fn check_key(key: &str) -> BlobResult<()> {
        validate_key(key)?;
        if key.starts_with('.') || key.ends_with(SIDECAR_SUFFIX) {
            return Err(BlobError::invalid(format!("Invalid blob key: '{key}'")));
        }
        Ok(())
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}{SIDECAR_SUFFIX}"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.root.join(format!(".{key}.{}.part", Uuid::new_v4().simple()))
    }

    async fn write_stream(path: &Path, mut stream: ByteStream) -> BlobResult<u64> {
        let mut file = fs::File::create(path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }

    async fn write_sidecar(&self, key: &str, sidecar: &BlobSidecar) -> BlobResult<()> {
        let tmp = self.temp_path(key);
        let json = serde_json::to_vec(sidecar)?;

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, self.sidecar_path(key)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_sidecar(&self, key: &str) -> Option<BlobSidecar> {
        let raw = fs::read(self.sidecar_path(key)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    async fn remove_if_present(path: &Path) -> BlobResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn map_not_found(key: &str, e: io::Error) -> BlobError {
        if e.kind() == io::ErrorKind::NotFound {
            BlobError::not_found(key)
        } else {
            e.into()
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, content_type: Option<&str>, stream: ByteStream) -> BlobResult<PutResult> {
        Self::check_key(key)?;
        fs::create_dir_all(&self.root).await?;

        let tmp = self.temp_path(key);
        let size_bytes = match Self::write_stream(&tmp, stream).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        let sidecar = BlobSidecar {
            content_type: content_type.map(str::to_string),
            size_bytes,
            stored_at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = self.write_sidecar(key, &sidecar).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp, self.blob_path(key)).await {
            let _ = fs::remove_file(&tmp).await;
            let _ = fs::remove_file(self.sidecar_path(key)).await;
            return Err(e.into());
        }

        Ok(PutResult { etag: None, size_bytes })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        Self::check_key(key)?;

        let path = self.blob_path(key);
        let file = fs::File::open(&path).await.map_err(|e| Self::map_not_found(key, e))?;
        let size_bytes = file.metadata().await?.len();
        let sidecar = self.read_sidecar(key).await;

        Ok(GetResult {
            stream: Box::pin(ReaderStream::new(file)),
            size_bytes,
            content_type: sidecar.and_then(|s| s.content_type),
            etag: None,
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        Self::check_key(key)?;

        let meta = fs::metadata(self.blob_path(key))
            .await
            .map_err(|e| Self::map_not_found(key, e))?;
        let sidecar = self.read_sidecar(key).await;

        Ok(ObjectHead {
            size_bytes: meta.len(),
            content_type: sidecar.as_ref().and_then(|s| s.content_type.clone()),
            etag: None,
            last_modified: sidecar.map(|s| s.stored_at),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        Self::check_key(key)?;

        Self::remove_if_present(&self.blob_path(key)).await?;
        Self::remove_if_present(&self.sidecar_path(key)).await
    }

    fn kind(&self) -> &'static str {
        "fs"
    }
}
