use async_trait::async_trait;
use uuid::Uuid;

use crate::{BlobError, BlobResult, ByteStream};

/// Storage primitives every backend implements.
///
/// Keys are flat names produced by a [`BlobKeyStrategy`]; stores reject
/// anything [`validate_key`] refuses.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the stream under `key`. Durable once this returns `Ok`.
    async fn put(&self, key: &str, content_type: Option<&str>, stream: ByteStream) -> BlobResult<PutResult>;

    async fn get(&self, key: &str) -> BlobResult<GetResult>;

    async fn head(&self, key: &str) -> BlobResult<ObjectHead>;

    /// Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Short backend name for logs.
    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    /// Unix seconds
    pub last_modified: Option<i64>,
}

/// Strategy for naming new blobs
pub trait BlobKeyStrategy: Send + Sync {
    fn object_key(&self, filename: Option<&str>) -> String;
}

/// `<unix-millis>-<8 hex>-<sanitised file name>`
#[derive(Debug, Clone, Default)]
pub struct TimestampKeyStrategy;

impl BlobKeyStrategy for TimestampKeyStrategy {
    fn object_key(&self, filename: Option<&str>) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let nonce = Uuid::new_v4().simple().to_string();
        let name = sanitize_filename(filename.unwrap_or_default());
        format!("{millis}-{}-{name}", &nonce[..8])
    }
}

const MAX_NAME_CHARS: usize = 100;
const FALLBACK_NAME: &str = "upload";

/// Keeps `[A-Za-z0-9._-]`, replaces everything else with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_CHARS)
        .collect();

    let cleaned = cleaned.replace("..", "_");
    if cleaned.trim_matches(|c| c == '.' || c == '_').is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

pub fn validate_key(key: &str) -> BlobResult<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(BlobError::invalid(format!("Invalid blob key: '{key}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_filename("charmander.png"), "charmander.png");
        assert_eq!(sanitize_filename("my card (1).jpg"), "my_card__1_.jpg");
        assert_eq!(sanitize_filename("C:\\Users\\ash\\pika.gif"), "pika.gif");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
    }

    #[test]
    fn sanitize_falls_back_and_caps_length() {
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("???"), "upload");
        assert_eq!(sanitize_filename(&"a".repeat(300)).len(), 100);
    }

    #[test]
    fn generated_keys_are_valid_and_distinct() {
        let keys = TimestampKeyStrategy;
        let a = keys.object_key(Some("card.png"));
        let b = keys.object_key(Some("card.png"));

        assert_ne!(a, b);
        assert!(a.ends_with("-card.png"));
        assert!(validate_key(&a).is_ok());

        let parts: Vec<&str> = a.splitn(3, '-').collect();
        assert!(parts[0].parse::<i64>().is_ok());
        assert_eq!(parts[1].len(), 8);
    }

    #[test]
    fn traversal_keys_are_rejected() {
        for bad in ["", "a/b", "a\\b", "..", "x..y"] {
            assert!(matches!(validate_key(bad), Err(BlobError::Invalid { .. })), "{bad}");
        }
    }
}
