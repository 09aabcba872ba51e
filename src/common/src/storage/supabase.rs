use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use std::time::Duration;

use super::{FileStore, StorageError};

/// Client for the Supabase Storage REST API, authenticated with the service role key.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

impl std::fmt::Debug for SupabaseStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStorage")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SupabaseStorage {
    pub fn new(url: &str, service_role_key: &str, timeout: Duration) -> Result<Self, StorageError> {
        let base_url = url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StorageError::Client("Supabase URL is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {service_role_key}"))
            .map_err(|e| StorageError::Client(format!("invalid service role key: {e}")))?;
        let apikey = HeaderValue::from_str(service_role_key)
            .map_err(|e| StorageError::Client(format!("invalid service role key: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("apikey", apikey);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/object/{}",
            self.base_url,
            urlencoding::encode(bucket)
        )
    }
}

#[async_trait]
impl FileStore for SupabaseStorage {
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<usize, StorageError> {
        if paths.is_empty() {
            return Ok(0);
        }

        log::debug!("Removing {} object(s) from bucket {bucket}", paths.len());
        let response = self
            .client
            .delete(self.bucket_url(bucket))
            .json(&RemoveRequest { prefixes: paths })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                bucket: bucket.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        // The API answers with the metadata of every object it removed
        let removed: Vec<serde_json::Value> = response.json().await?;
        Ok(removed.len())
    }
}
