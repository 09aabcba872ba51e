use async_trait::async_trait;
use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use super::{FileStore, StorageError};

/// One object store per bucket.
#[derive(Clone, Default)]
pub struct ObjectStoreFiles {
    stores: HashMap<String, Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for ObjectStoreFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buckets: Vec<_> = self.stores.keys().collect();
        buckets.sort();
        f.debug_struct("ObjectStoreFiles")
            .field("buckets", &buckets)
            .finish()
    }
}

impl ObjectStoreFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.stores.insert(bucket.into(), store);
        self
    }

    /// Build every bucket's store from its DSN
    pub fn from_dsns(buckets: &HashMap<String, String>) -> Result<Self, StorageError> {
        let mut files = Self::new();
        for (bucket, dsn) in buckets {
            files = files.with_bucket(bucket.clone(), create_object_store_from_dsn(dsn)?);
        }
        Ok(files)
    }

    pub fn store(&self, bucket: &str) -> Option<&Arc<dyn ObjectStore>> {
        self.stores.get(bucket)
    }
}

#[async_trait]
impl FileStore for ObjectStoreFiles {
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<usize, StorageError> {
        let store = self
            .stores
            .get(bucket)
            .ok_or_else(|| StorageError::UnknownBucket(bucket.to_string()))?;

        if paths.is_empty() {
            return Ok(0);
        }

        let locations = futures::stream::iter(
            paths
                .iter()
                .map(|path| Ok(ObjectPath::from(path.as_str())))
                .collect::<Vec<_>>(),
        )
        .boxed();

        let mut results = store.delete_stream(locations);
        let mut removed = 0;
        while let Some(result) = results.next().await {
            match result {
                Ok(_) => removed += 1,
                Err(object_store::Error::NotFound { path, .. }) => {
                    log::debug!("Object {path} already absent from bucket {bucket}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }
}

/// Create an object store from a DSN string
///
/// Supported schemes: `memory://`, `file:///path`, and
/// `s3://[access_key:secret_key@]host[:port][/endpoint/path]/bucket[?region=..]`.
pub fn create_object_store_from_dsn(dsn: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let url = Url::parse(dsn).map_err(|e| invalid_dsn(dsn, e.to_string()))?;

    match url.scheme() {
        "file" => {
            let path = url.path();
            if path.is_empty() || path == "/" {
                return Err(invalid_dsn(
                    dsn,
                    "File DSN must specify a path: file:///path/to/storage",
                ));
            }
            std::fs::create_dir_all(path).map_err(|e| invalid_dsn(dsn, e.to_string()))?;
            Ok(Arc::new(LocalFileSystem::new_with_prefix(path)?))
        }
        "memory" => Ok(Arc::new(InMemory::new())),
        "s3" => {
            let builder = create_s3_builder_from_dsn(&url)?;
            Ok(Arc::new(builder.build()?))
        }
        scheme => Err(invalid_dsn(
            dsn,
            format!("Unsupported storage scheme: {scheme}. Supported: file, memory, s3"),
        )),
    }
}

/// Create an S3 builder from a DSN
///
/// The last path segment names the bucket; anything before it is appended to
/// the endpoint, which is how Supabase exposes its S3-compatible API
/// (`s3://key:secret@<project>.supabase.co/storage/v1/s3/<bucket>`).
pub fn create_s3_builder_from_dsn(dsn: &Url) -> Result<AmazonS3Builder, StorageError> {
    let host = dsn
        .host_str()
        .ok_or_else(|| invalid_dsn(dsn.as_str(), "Missing S3 host in DSN"))?;

    let segments: Vec<&str> = dsn
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    let (bucket, endpoint_path) = match segments.split_last() {
        Some((bucket, rest)) => (*bucket, rest.join("/")),
        None => {
            return Err(invalid_dsn(
                dsn.as_str(),
                "S3 DSN must specify a bucket: s3://host/bucket",
            ));
        }
    };

    let query: HashMap<String, String> = dsn.query_pairs().into_owned().collect();
    let region = query
        .get("region")
        .cloned()
        .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
        .unwrap_or_else(|| "us-east-1".to_string());

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(region);

    let access_key = dsn.username();
    let secret_key = dsn.password().unwrap_or("");
    if !access_key.is_empty() {
        builder = builder
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key);
    } else {
        if let Ok(env_key) = std::env::var("AWS_ACCESS_KEY_ID") {
            builder = builder.with_access_key_id(env_key);
        }
        if let Ok(env_secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            builder = builder.with_secret_access_key(env_secret);
        }
    }

    // Real S3 needs no custom endpoint
    if host.ends_with("amazonaws.com") && endpoint_path.is_empty() {
        return Ok(builder);
    }

    let insecure = matches!(host, "localhost" | "127.0.0.1")
        || query.get("allow_http").map(String::as_str) == Some("true");
    let scheme = if insecure { "http" } else { "https" };
    let mut endpoint = match dsn.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    };
    if !endpoint_path.is_empty() {
        endpoint = format!("{endpoint}/{endpoint_path}");
    }

    Ok(builder
        .with_endpoint(endpoint)
        .with_allow_http(insecure)
        .with_virtual_hosted_style_request(false))
}

fn invalid_dsn(dsn: &str, reason: impl Into<String>) -> StorageError {
    StorageError::InvalidDsn {
        dsn: dsn.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::PutPayload;

    async fn put_text(store: &dyn ObjectStore, path: &str) {
        store
            .put(&ObjectPath::from(path), PutPayload::from_static(b"data"))
            .await
            .expect("Failed to put object");
    }

    #[tokio::test]
    async fn test_remove_from_memory_bucket() {
        let images: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        put_text(images.as_ref(), "a.png").await;
        put_text(images.as_ref(), "b.png").await;
        put_text(images.as_ref(), "keep.png").await;

        let files = ObjectStoreFiles::new().with_bucket("event-images", images.clone());
        let removed = files
            .remove("event-images", &["a.png".to_string(), "b.png".to_string()])
            .await
            .expect("Failed to remove objects");
        assert_eq!(removed, 2);

        assert!(images.head(&ObjectPath::from("a.png")).await.is_err());
        assert!(images.head(&ObjectPath::from("b.png")).await.is_err());
        assert!(images.head(&ObjectPath::from("keep.png")).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_unknown_bucket() {
        let files = ObjectStoreFiles::new();
        let err = files
            .remove("event-pdfs", &["x.pdf".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownBucket(bucket) if bucket == "event-pdfs"));
    }

    #[tokio::test]
    async fn test_remove_missing_files_on_disk() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dsn = format!("file://{}", temp_dir.path().display());
        let store = create_object_store_from_dsn(&dsn).unwrap();
        put_text(store.as_ref(), "present.pdf").await;

        let files = ObjectStoreFiles::new().with_bucket("event-pdfs", store);
        let removed = files
            .remove(
                "event-pdfs",
                &["present.pdf".to_string(), "missing.pdf".to_string()],
            )
            .await
            .expect("Missing files must not fail the removal");
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_invalid_dsn() {
        let result = create_object_store_from_dsn("not-a-url");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid storage DSN")
        );
    }

    #[test]
    fn test_unsupported_scheme() {
        let result = create_object_store_from_dsn("gcs://bucket/prefix");
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Unsupported storage scheme")
        );
    }

    #[test]
    fn test_file_dsn_without_path() {
        let result = create_object_store_from_dsn("file://");
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("File DSN must specify a path")
        );
    }

    #[test]
    fn test_s3_dsn_parsing() {
        let result = create_s3_builder_from_dsn(
            &Url::parse("s3://fest-images.s3.amazonaws.com/fest-images").unwrap(),
        );
        assert!(result.is_ok());

        let result = create_s3_builder_from_dsn(
            &Url::parse("s3://access:secret@localhost:9000/event-images").unwrap(),
        );
        assert!(result.is_ok());

        let result = create_s3_builder_from_dsn(
            &Url::parse(
                "s3://access:secret@demo.supabase.co/storage/v1/s3/event-pdfs?region=ap-south-1",
            )
            .unwrap(),
        );
        assert!(result.is_ok());

        let result = create_s3_builder_from_dsn(&Url::parse("s3://localhost:9000/").unwrap());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must specify a bucket")
        );
    }
}
