//! # deck-blob
//!
//! Streaming blob storage for the card studio. Services embed a
//! [`BlobAdapter`]; the adapter names new blobs, enforces upload limits and
//! delegates bytes to a [`BlobStore`] backend.
//!
//! ```text
//! ┌─────────────────┐
//! │   Your Service  │  ← business logic only
//! ├─────────────────┤
//! │   BlobAdapter   │  ← keys, size and type limits
//! ├─────────────────┤
//! │   BlobStore     │  ← memory / fs / S3
//! └─────────────────┘
//! ```
//!
//! ```rust
//! use deck_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let blobs = BlobAdapter::new(MemoryBlobStore::new(), BlobConfig::default());
//!
//! let receipt = blobs
//!     .put(
//!         BlobPut::new().with_filename("charmander.png").with_content_type("image/png"),
//!         deck_blob::bytes_stream(&b"fake png"[..]),
//!     )
//!     .await?;
//!
//! let opened = blobs.open(&receipt.key).await?;
//! assert_eq!(opened.content_length(), 8);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod config;
mod error;
mod fs_store;
mod memory_store;
mod receipt;
mod s3_store;
pub mod store;
mod types;

pub use adapter::BlobAdapter;
pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use fs_store::FsBlobStore;
pub use memory_store::MemoryBlobStore;
pub use receipt::{BlobReceipt, OpenedBlob};
pub use s3_store::{S3BlobStore, S3Config};
pub use store::{
    sanitize_filename, validate_key, BlobKeyStrategy, BlobStore, GetResult, ObjectHead, PutResult,
    TimestampKeyStrategy,
};
pub use types::{bytes_stream, BlobPut, ByteStream};

pub mod prelude {
    pub use crate::{
        BlobAdapter, BlobConfig, BlobError, BlobPut, BlobReceipt, BlobResult, BlobStore, ByteStream, FsBlobStore,
        MemoryBlobStore,
    };
}
