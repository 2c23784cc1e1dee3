//! Shared state: the document store and the image blob adapter.

use std::sync::Arc;

use anyhow::Result;
use deck_blob::{BlobAdapter, BlobConfig, BlobError, FsBlobStore, MemoryBlobStore, S3BlobStore};
use deck_core::errors::DeckError;

use crate::config::{BlobBackend, DocumentBackend, StudioConfig, ALLOWED_IMAGE_TYPES};
use crate::documents::{DocumentStore, MemoryDocumentStore};

pub struct StudioState {
    pub documents: Arc<dyn DocumentStore>,
    pub images: BlobAdapter,
    /// Prefix for `imageUrl`, e.g. `/files`.
    pub files_path: String,
}

impl StudioState {
    pub fn new(documents: Arc<dyn DocumentStore>, images: BlobAdapter, files_path: impl Into<String>) -> Self {
        Self {
            documents,
            images,
            files_path: files_path.into(),
        }
    }

    pub async fn from_config(config: &StudioConfig) -> Result<Self> {
        let documents = open_documents(&config.documents).await?;
        let images = open_images(config).await?;

        tracing::info!(
            documents = documents.kind(),
            images = images.store_kind(),
            "storage ready"
        );

        Ok(Self::new(documents, images, config.files_path.clone()))
    }

    pub fn image_url(&self, key: &str) -> String {
        format!("{}/{key}", self.files_path.trim_end_matches('/'))
    }
}

async fn open_documents(backend: &DocumentBackend) -> Result<Arc<dyn DocumentStore>> {
    match backend {
        DocumentBackend::Memory { snapshot: None } => Ok(Arc::new(MemoryDocumentStore::new())),
        DocumentBackend::Memory { snapshot: Some(path) } => Ok(Arc::new(MemoryDocumentStore::open(path).await?)),
        #[cfg(feature = "mongodb")]
        DocumentBackend::Mongo { uri, database } => Ok(Arc::new(
            crate::documents::MongoDocumentStore::connect(uri, database).await?,
        )),
        #[cfg(not(feature = "mongodb"))]
        DocumentBackend::Mongo { .. } => {
            anyhow::bail!("DOCUMENT_STORE=mongodb needs deck-studio built with the `mongodb` feature")
        }
    }
}

async fn open_images(config: &StudioConfig) -> Result<BlobAdapter> {
    let limits = BlobConfig::default()
        .with_max_blob_bytes(config.max_image_bytes)
        .with_allowed_content_types(ALLOWED_IMAGE_TYPES.iter().copied());

    let adapter = match &config.blobs {
        BlobBackend::Memory => BlobAdapter::new(MemoryBlobStore::new(), limits),
        BlobBackend::Fs { root } => {
            tokio::fs::create_dir_all(root).await?;
            BlobAdapter::new(FsBlobStore::new(root), limits)
        }
        BlobBackend::S3(s3) => BlobAdapter::new(S3BlobStore::connect(s3.clone()).await?, limits),
    };
    Ok(adapter)
}

/// Client-facing form of a blob failure.
pub fn blob_error(err: BlobError) -> anyhow::Error {
    let deck = match &err {
        BlobError::NotFound { .. } => DeckError::not_found("File not found"),
        BlobError::Invalid { message } => DeckError::bad_request(message.clone()),
        BlobError::TooLarge { limit } => {
            DeckError::payload_too_large(format!("Image exceeds the limit of {limit} bytes"))
        }
        BlobError::Backend { .. } => DeckError::unavailable("Blob storage unavailable"),
        _ => DeckError::general_error("Blob storage failure"),
    };
    deck.with_source(err.into()).into_anyhow()
}
