use serde::{Deserialize, Serialize};

use crate::ByteStream;

/// What the adapter hands back after storing a blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobReceipt {
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub filename: Option<String>,
    pub etag: Option<String>,
    /// Unix seconds
    pub created_at: i64,
}

impl BlobReceipt {
    pub fn new(key: String, size_bytes: u64) -> Self {
        Self {
            key,
            size_bytes,
            content_type: None,
            filename: None,
            etag: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }
}

/// A blob opened for reading.
pub struct OpenedBlob {
    pub receipt: BlobReceipt,
    pub stream: ByteStream,
}

impl OpenedBlob {
    pub fn new(receipt: BlobReceipt, stream: ByteStream) -> Self {
        Self { receipt, stream }
    }

    pub fn content_length(&self) -> u64 {
        self.receipt.size_bytes
    }

    pub fn content_type(&self) -> &str {
        self.receipt
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}
