//! Process configuration, read once from the environment (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};

pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,https://pokemon-card-creator.onrender.com";

pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "application/octet-stream",
];

pub fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "unparsable env var, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentBackend {
    /// In-process maps, optionally snapshotted to a JSON file.
    Memory { snapshot: Option<PathBuf> },
    Mongo { uri: String, database: String },
}

#[derive(Debug, Clone)]
pub enum BlobBackend {
    Memory,
    Fs { root: PathBuf },
    S3(deck_blob::S3Config),
}

/// What happens to the old blob when a card gets a new image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacedImages {
    #[default]
    Delete,
    Keep,
}

impl FromStr for ReplacedImages {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "keep" => Ok(Self::Keep),
            other => bail!("unknown replaced-images policy '{other}' (expected delete|keep)"),
        }
    }
}

impl std::fmt::Display for ReplacedImages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Keep => "keep",
        })
    }
}

/// What deleting a design does to the cards that reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDesignDelete {
    /// Cards keep the dangling id and read back with `cardDesign: null`.
    #[default]
    Orphan,
    /// Referencing cards get `cardDesign` cleared.
    Nullify,
    /// Refuse with 409 while any card references the design.
    Restrict,
}

impl FromStr for OnDesignDelete {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orphan" => Ok(Self::Orphan),
            "nullify" => Ok(Self::Nullify),
            "restrict" => Ok(Self::Restrict),
            other => bail!("unknown on-delete policy '{other}' (expected orphan|nullify|restrict)"),
        }
    }
}

impl std::fmt::Display for OnDesignDelete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Orphan => "orphan",
            Self::Nullify => "nullify",
            Self::Restrict => "restrict",
        })
    }
}

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub documents: DocumentBackend,
    pub blobs: BlobBackend,
    pub max_image_bytes: u64,
    pub static_dir: Option<PathBuf>,
    /// Mount point of the file route, also the prefix of `imageUrl`.
    pub files_path: String,
    pub replaced_images: ReplacedImages,
    pub on_design_delete: OnDesignDelete,
    pub expand_design: bool,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: split_list(DEFAULT_CORS_ORIGINS),
            documents: DocumentBackend::Memory { snapshot: None },
            blobs: BlobBackend::Fs {
                root: PathBuf::from("uploads"),
            },
            max_image_bytes: 10 * 1024 * 1024,
            static_dir: None,
            files_path: "/files".to_string(),
            replaced_images: ReplacedImages::Delete,
            on_design_delete: OnDesignDelete::Orphan,
            expand_design: true,
        }
    }
}

fn mib_to_bytes(mib: u64) -> u64 {
    mib.saturating_mul(1024 * 1024)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl StudioConfig {
    /// In-memory stores everywhere; what the tests run against.
    pub fn in_memory() -> Self {
        Self {
            blobs: BlobBackend::Memory,
            ..Self::default()
        }
    }

    /// Loads `.env` (if any) and reads the environment.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(e.into());
            }
        }

        let defaults = Self::default();

        let documents = match env_var_or("DOCUMENT_STORE", "memory".to_string()).to_ascii_lowercase().as_str() {
            "memory" => DocumentBackend::Memory {
                snapshot: env_opt("DOCUMENTS_PATH").map(PathBuf::from),
            },
            "mongodb" | "mongo" => DocumentBackend::Mongo {
                uri: env_opt("MONGODB_URI").ok_or_else(|| anyhow::anyhow!("MONGODB_URI is required for DOCUMENT_STORE=mongodb"))?,
                database: env_var_or("MONGODB_DATABASE", "card-studio".to_string()),
            },
            other => bail!("unknown DOCUMENT_STORE '{other}' (expected memory|mongodb)"),
        };

        let blobs = match env_var_or("BLOB_STORE", "fs".to_string()).to_ascii_lowercase().as_str() {
            "memory" => BlobBackend::Memory,
            "fs" => BlobBackend::Fs {
                root: PathBuf::from(env_var_or("UPLOAD_DIR", "uploads".to_string())),
            },
            "s3" => BlobBackend::S3(deck_blob::S3Config {
                bucket: env_opt("S3_BUCKET").ok_or_else(|| anyhow::anyhow!("S3_BUCKET is required for BLOB_STORE=s3"))?,
                region: env_var_or("S3_REGION", "us-east-1".to_string()),
                endpoint_url: env_opt("S3_ENDPOINT_URL"),
                access_key_id: env_opt("S3_ACCESS_KEY_ID"),
                secret_access_key: env_opt("S3_SECRET_ACCESS_KEY"),
            }),
            other => bail!("unknown BLOB_STORE '{other}' (expected fs|memory|s3)"),
        };

        let files_path = format!("/{}", env_var_or("FILES_PATH", defaults.files_path.clone()).trim_matches('/'));

        Ok(Self {
            host: env_var_or("HOST", defaults.host),
            port: env_var_or("PORT", defaults.port),
            cors_origins: env_opt("CORS_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.cors_origins),
            documents,
            blobs,
            max_image_bytes: mib_to_bytes(env_var_or("MAX_IMAGE_MB", 10u64)),
            static_dir: env_opt("STATIC_DIR").map(PathBuf::from),
            files_path,
            replaced_images: env_var_or("CARDS_REPLACED_IMAGES", defaults.replaced_images),
            on_design_delete: env_var_or("DESIGNS_ON_DELETE", defaults.on_design_delete),
            expand_design: env_var_or("CARDS_EXPAND_DESIGN", defaults.expand_design),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_parse_case_insensitively() {
        assert_eq!("KEEP".parse::<ReplacedImages>().unwrap(), ReplacedImages::Keep);
        assert_eq!(" restrict ".parse::<OnDesignDelete>().unwrap(), OnDesignDelete::Restrict);
        assert!("cascade".parse::<OnDesignDelete>().is_err());
    }

    #[test]
    fn defaults_serve_on_port_5000() {
        let config = StudioConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5000");
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.replaced_images, ReplacedImages::Delete);
        assert_eq!(config.on_design_delete, OnDesignDelete::Orphan);
        assert!(config.expand_design);
    }

    #[test]
    fn image_limit_saturates_instead_of_overflowing() {
        assert_eq!(mib_to_bytes(10), 10 * 1024 * 1024);
        assert_eq!(mib_to_bytes(u64::MAX / 2), u64::MAX);
    }

    #[test]
    fn list_splitting_drops_blanks() {
        assert_eq!(split_list(" a, ,b,"), vec!["a".to_string(), "b".to_string()]);
    }
}
