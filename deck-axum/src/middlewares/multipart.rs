use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use deck_core::errors::DeckError;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tower::{Layer, Service};

use crate::{DeckAxumError, Uploads};

/// Where uploaded file parts are kept while the request is handled.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum FileEncoding {
    /// Stream each file part to a temporary file (default).
    #[default]
    TempFile,
    /// Buffer each file part in memory. Only sensible with small limits.
    Memory,
}

/// Configuration for multipart to JSON conversion
#[derive(Clone, Debug)]
pub struct MultipartConfig {
    /// Maximum size of any single part in bytes (None = unlimited)
    pub max_file_size: Option<u64>,
    /// Maximum total request size in bytes (None = unlimited)
    pub max_total_size: Option<u64>,
    /// Allowed content types for files (empty = all allowed)
    pub allowed_content_types: HashSet<String>,
    pub file_encoding: FileEncoding,
    /// Field names to treat as files (empty = auto-detect)
    pub file_fields: HashSet<String>,
    /// Field names to treat as text (empty = auto-detect)
    pub text_fields: HashSet<String>,
    pub temp_dir: PathBuf,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_file_size: Some(10 * 1024 * 1024),  // 10MB
            max_total_size: Some(12 * 1024 * 1024), // 12MB
            allowed_content_types: HashSet::new(),
            file_encoding: FileEncoding::TempFile,
            file_fields: HashSet::new(),
            text_fields: HashSet::new(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = Some(size);
        self
    }

    pub fn max_total_size(mut self, size: u64) -> Self {
        self.max_total_size = Some(size);
        self
    }

    pub fn allow_content_type(mut self, content_type: &str) -> Self {
        self.allowed_content_types.insert(content_type.to_ascii_lowercase());
        self
    }

    pub fn file_encoding(mut self, encoding: FileEncoding) -> Self {
        self.file_encoding = encoding;
        self
    }

    pub fn file_field(mut self, field_name: &str) -> Self {
        self.file_fields.insert(field_name.to_string());
        self
    }

    pub fn text_field(mut self, field_name: &str) -> Self {
        self.text_fields.insert(field_name.to_string());
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    fn is_file_field(&self, name: &str, filename: Option<&str>, content_type: Option<&str>) -> bool {
        if !self.file_fields.is_empty() {
            self.file_fields.contains(name)
        } else if !self.text_fields.is_empty() {
            !self.text_fields.contains(name)
        } else {
            filename.is_some() || content_type.is_some_and(|ct| !ct.starts_with("text/"))
        }
    }

    fn allows(&self, content_type: Option<&str>) -> bool {
        if self.allowed_content_types.is_empty() {
            return true;
        }
        let essence = content_type
            .unwrap_or("application/octet-stream")
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_content_types.contains(&essence)
    }
}

#[derive(Debug, Clone)]
enum FileContent {
    TempFile(PathBuf),
    Memory(Bytes),
}

/// One file part of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size: u64,
    content: FileContent,
}

impl UploadedFile {
    pub fn in_memory(
        field: impl Into<String>,
        filename: Option<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            field: field.into(),
            filename,
            content_type,
            size: data.len() as u64,
            content: FileContent::Memory(data),
        }
    }

    pub fn temp_path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::TempFile(p) => Some(p),
            FileContent::Memory(_) => None,
        }
    }

    /// Streams the file content without buffering it.
    pub async fn open(&self) -> io::Result<BoxStream<'static, io::Result<Bytes>>> {
        match &self.content {
            FileContent::TempFile(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(ReaderStream::new(file).boxed())
            }
            FileContent::Memory(data) => {
                let data = data.clone();
                Ok(stream::once(async move { Ok(data) }).boxed())
            }
        }
    }

    /// What replaces the file part in the JSON body.
    pub fn summary(&self) -> Value {
        json!({
            "filename": self.filename,
            "contentType": self.content_type,
            "size": self.size,
        })
    }

    async fn cleanup(&self) {
        if let FileContent::TempFile(path) = &self.content {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove upload temp file");
                }
            }
        }
    }
}

/// Converts `multipart/form-data` requests into JSON for the REST handlers.
///
/// Text parts become string fields. File parts are kept aside as
/// [`UploadedFile`]s (reachable through [`Uploads`] / `RestParams::files`)
/// and replaced in the JSON by a `{filename, contentType, size}` summary.
/// Temporary files are removed once the inner service has answered.
#[derive(Clone, Default)]
pub struct MultipartToJson {
    config: Arc<MultipartConfig>,
}

impl MultipartToJson {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MultipartConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for MultipartToJson {
    type Service = MultipartToJsonService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MultipartToJsonService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

#[derive(Clone)]
pub struct MultipartToJsonService<S> {
    inner: S,
    config: Arc<MultipartConfig>,
}

impl<S> Service<Request<Body>> for MultipartToJsonService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // the driven instance is the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let is_multipart = req
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("multipart/form-data"));

            if !is_multipart {
                return inner.call(req).await;
            }

            match convert_multipart_to_json(req, &config).await {
                Ok((json_req, files)) => {
                    tracing::debug!(files = files.len(), "multipart request converted to JSON");
                    let res = inner.call(json_req).await;
                    for file in files.iter() {
                        file.cleanup().await;
                    }
                    res
                }
                Err(e) => Ok(DeckAxumError::from(e).into_response()),
            }
        })
    }
}

fn map_multer_error(err: multer::Error) -> DeckError {
    match err {
        multer::Error::StreamSizeExceeded { limit } => {
            DeckError::payload_too_large(format!("Request body exceeds the limit of {limit} bytes"))
        }
        multer::Error::FieldSizeExceeded { limit, field_name } => DeckError::payload_too_large(format!(
            "Field '{}' exceeds the limit of {limit} bytes",
            field_name.unwrap_or_default()
        )),
        other => DeckError::bad_request(format!("Failed to parse multipart data: {other}")),
    }
}

fn io_failure(e: io::Error) -> DeckError {
    DeckError::general_error(format!("Failed to buffer upload: {e}")).with_source(e.into())
}

async fn read_to_temp(field: &mut multer::Field<'static>, dir: &Path) -> Result<(PathBuf, u64), DeckError> {
    tokio::fs::create_dir_all(dir).await.map_err(io_failure)?;
    let path = dir.join(format!("deck-upload-{}", uuid::Uuid::new_v4().simple()));

    let result = async {
        let mut file = tokio::fs::File::create(&path).await.map_err(io_failure)?;
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(map_multer_error)? {
            file.write_all(&chunk).await.map_err(io_failure)?;
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(io_failure)?;
        Ok::<_, DeckError>(size)
    }
    .await;

    match result {
        Ok(size) => Ok((path, size)),
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            Err(e)
        }
    }
}

async fn read_to_memory(field: &mut multer::Field<'static>) -> Result<Bytes, DeckError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(map_multer_error)? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

async fn convert_multipart_to_json(
    req: Request<Body>,
    config: &MultipartConfig,
) -> Result<(Request<Body>, Arc<Vec<UploadedFile>>), DeckError> {
    let (mut parts, body) = req.into_parts();

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| DeckError::bad_request("Missing boundary in multipart content-type"))?;

    let mut limit = multer::SizeLimit::new();
    if let Some(total) = config.max_total_size {
        limit = limit.whole_stream(total);
    }
    if let Some(per_field) = config.max_file_size {
        limit = limit.per_field(per_field);
    }

    let mut multipart = multer::Multipart::with_constraints(
        body.into_data_stream(),
        boundary,
        multer::Constraints::new().size_limit(limit),
    );

    let mut json_map = Map::new();
    let mut files: Vec<UploadedFile> = Vec::new();

    let outcome: Result<(), DeckError> = async {
        while let Some(mut field) = multipart.next_field().await.map_err(map_multer_error)? {
            let name = field.name().unwrap_or("unknown").to_string();
            let content_type = field.content_type().map(|ct| ct.to_string());
            let filename = field.file_name().map(str::to_string);

            if !config.is_file_field(&name, filename.as_deref(), content_type.as_deref()) {
                let value = field.text().await.map_err(map_multer_error)?;
                json_map.insert(name, Value::String(value));
                continue;
            }

            // an empty <input type="file"> still submits a part
            let no_file_chosen = filename.as_deref().map_or(true, str::is_empty);

            if !no_file_chosen && !config.allows(content_type.as_deref()) {
                return Err(DeckError::bad_request(format!(
                    "Content type '{}' is not allowed for field '{name}'",
                    content_type.as_deref().unwrap_or("application/octet-stream")
                )));
            }

            let file = match config.file_encoding {
                FileEncoding::TempFile => {
                    let (path, size) = read_to_temp(&mut field, &config.temp_dir).await?;
                    UploadedFile {
                        field: name.clone(),
                        filename,
                        content_type,
                        size,
                        content: FileContent::TempFile(path),
                    }
                }
                FileEncoding::Memory => {
                    let data = read_to_memory(&mut field).await?;
                    UploadedFile::in_memory(name.clone(), filename, content_type, data)
                }
            };

            if no_file_chosen && file.size == 0 {
                file.cleanup().await;
                continue;
            }

            json_map.insert(name, file.summary());
            files.push(file);
        }
        Ok(())
    }
    .await;

    if let Err(e) = outcome {
        for file in &files {
            file.cleanup().await;
        }
        return Err(e);
    }

    let json_bytes = serde_json::to_vec(&Value::Object(json_map))
        .map_err(|e| DeckError::general_error(format!("Failed to encode multipart fields: {e}")))?;

    let files = Arc::new(files);
    parts.headers.remove(header::TRANSFER_ENCODING);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(json_bytes.len()));
    parts.extensions.insert(Uploads(Arc::clone(&files)));

    Ok((Request::from_parts(parts, Body::from(json_bytes)), files))
}
