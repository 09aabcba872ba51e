//! Object storage access for uploaded fest and event files.
//!
//! Files are persisted as public Supabase Storage URLs on the fest/event rows.
//! Deletion needs the bucket-relative path, which [`resolve_storage_path`]
//! recovers from the URL. The [`FileStore`] trait is the seam the cleanup job
//! and the route handlers delete through.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::config::{Configuration, StorageBackend};

mod object;
mod supabase;

pub use object::{ObjectStoreFiles, create_object_store_from_dsn, create_s3_builder_from_dsn};
pub use supabase::SupabaseStorage;

/// Path segment that precedes the bucket name in a public object URL
pub const PUBLIC_OBJECT_PREFIX: &str = "/storage/v1/object/public/";

/// The buckets SOCIO uploads into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    FestImages,
    EventImages,
    EventBanners,
    EventPdfs,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::FestImages,
        Bucket::EventImages,
        Bucket::EventBanners,
        Bucket::EventPdfs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::FestImages => "fest-images",
            Bucket::EventImages => "event-images",
            Bucket::EventBanners => "event-banners",
            Bucket::EventPdfs => "event-pdfs",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The public object URL root of one Supabase project,
/// `{project}/storage/v1/object/public/`.
///
/// Only URLs under this root, on the same origin, resolve to deletion targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrlBase {
    root: Url,
}

impl PublicUrlBase {
    pub fn parse(project_url: &str) -> Result<Self, StorageError> {
        let invalid = |reason: String| StorageError::InvalidProjectUrl {
            url: project_url.to_string(),
            reason,
        };

        let mut project = Url::parse(project_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(project.scheme(), "http" | "https") || project.host_str().is_none() {
            return Err(invalid("not an http(s) base URL".to_string()));
        }
        if !project.path().ends_with('/') {
            let path = format!("{}/", project.path());
            project.set_path(&path);
        }
        project.set_query(None);
        project.set_fragment(None);

        let root = project
            .join(PUBLIC_OBJECT_PREFIX.trim_start_matches('/'))
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self { root })
    }

    pub fn as_str(&self) -> &str {
        self.root.as_str()
    }

    /// Public URL of `path` in `bucket`
    pub fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}{bucket}/{path}", self.root)
    }

    /// See [`resolve_storage_path`].
    pub fn resolve(&self, url: Option<&str>, bucket: &str) -> Option<String> {
        let url = url?.trim();
        if url.is_empty() || bucket.is_empty() || bucket.contains('/') {
            return None;
        }

        let candidate = Url::parse(url).ok()?;
        if candidate.origin() != self.root.origin() {
            return None;
        }

        let prefix = format!("{}{bucket}/", self.root.path());
        let raw = candidate.path().strip_prefix(&prefix)?;
        if raw.is_empty() {
            return None;
        }

        urlencoding::decode(raw).ok().map(|path| path.into_owned())
    }
}

/// A deletion target: an object path inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredFile {
    pub bucket: String,
    pub path: String,
}

impl StoredFile {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// Derive the deletion target for a persisted URL; `None` when it doesn't resolve.
    pub fn resolve(base: &PublicUrlBase, bucket: Bucket, url: Option<&str>) -> Option<Self> {
        resolve_storage_path(base, url, bucket.as_str())
            .map(|path| Self::new(bucket.as_str(), path))
    }
}

/// Return the bucket-relative path of a public storage URL.
///
/// The URL must share the origin of `base` and its path must start with the
/// bucket's public root. Absent, empty, foreign-host and foreign-bucket URLs
/// yield `None`. Query strings and fragments are dropped and percent-encoding
/// is decoded.
pub fn resolve_storage_path(
    base: &PublicUrlBase,
    url: Option<&str>,
    bucket: &str,
) -> Option<String> {
    base.resolve(url, bucket)
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage DSN '{dsn}': {reason}")]
    InvalidDsn { dsn: String, reason: String },

    #[error("Invalid Supabase project URL '{url}': {reason}")]
    InvalidProjectUrl { url: String, reason: String },

    #[error("No object store configured for bucket '{0}'")]
    UnknownBucket(String),

    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage API returned {status} for bucket '{bucket}': {message}")]
    Api {
        bucket: String,
        status: u16,
        message: String,
    },

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Invalid storage client configuration: {0}")]
    Client(String),
}

/// Bulk removal of objects, one call per bucket.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Remove `paths` from `bucket` in a single call and return how many
    /// objects the backend reports as removed. Missing objects are not an error.
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<usize, StorageError>;
}

/// Build the file store selected by `storage.backend`.
pub fn create_file_store(config: &Configuration) -> Result<Arc<dyn FileStore>, StorageError> {
    match config.storage.backend {
        StorageBackend::Supabase => {
            let storage = SupabaseStorage::new(
                &config.supabase.url,
                &config.supabase.service_role_key,
                config.storage.request_timeout,
            )?;
            log::info!("Using Supabase Storage at {}", config.supabase.url);
            Ok(Arc::new(storage))
        }
        StorageBackend::ObjectStore => {
            let files = ObjectStoreFiles::from_dsns(&config.storage.buckets)?;
            log::info!(
                "Using object stores for {} bucket(s)",
                config.storage.buckets.len()
            );
            Ok(Arc::new(files))
        }
    }
}
