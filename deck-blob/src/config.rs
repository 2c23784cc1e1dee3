/// Limits applied by [`crate::BlobAdapter`] before anything reaches a store.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Absolute max size for a single blob, counted while streaming.
    pub max_blob_bytes: u64,

    /// Accepted media types (`type/subtype`, parameters ignored).
    /// `None` accepts anything.
    pub allowed_content_types: Option<Vec<String>>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            max_blob_bytes: 10 * 1024 * 1024, // 10MB
            allowed_content_types: None,
        }
    }
}

impl BlobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    pub fn with_allowed_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_content_types = Some(types.into_iter().map(|t| t.into().to_ascii_lowercase()).collect());
        self
    }

    pub fn allows_content_type(&self, content_type: &str) -> bool {
        let Some(allowed) = &self.allowed_content_types else {
            return true;
        };

        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        allowed.iter().any(|a| *a == essence)
    }
}
