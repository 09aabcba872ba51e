//! A stand-in for the Supabase Storage bulk-remove endpoint.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::delete,
};
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// One bulk-remove request as the server saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveCall {
    pub bucket: String,
    pub prefixes: Vec<String>,
    pub authorization: Option<String>,
    pub apikey: Option<String>,
}

#[derive(Default)]
struct StorageState {
    service_role_key: String,
    objects: Mutex<HashMap<String, BTreeSet<String>>>,
    calls: Mutex<Vec<RemoveCall>>,
    failing: Mutex<HashSet<String>>,
}

pub struct FakeSupabase {
    pub url: String,
    state: Arc<StorageState>,
    handle: JoinHandle<()>,
}

impl FakeSupabase {
    pub async fn start(service_role_key: &str) -> anyhow::Result<Self> {
        let state = Arc::new(StorageState {
            service_role_key: service_role_key.to_string(),
            ..Default::default()
        });

        let app = Router::new()
            .route("/storage/v1/object/:bucket", delete(remove_objects))
            .with_state(state.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("Fake storage server error: {e}");
            }
        });

        log::info!("Fake Supabase storage listening on {addr}");
        Ok(Self {
            url: format!("http://{addr}"),
            state,
            handle,
        })
    }

    pub fn put(&self, bucket: &str, path: &str) {
        self.state
            .objects
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(path.to_string());
    }

    pub fn exists(&self, bucket: &str, path: &str) -> bool {
        self.state
            .objects
            .lock()
            .unwrap()
            .get(bucket)
            .is_some_and(|objects| objects.contains(path))
    }

    pub fn object_count(&self) -> usize {
        self.state
            .objects
            .lock()
            .unwrap()
            .values()
            .map(BTreeSet::len)
            .sum()
    }

    /// Answer every request for `bucket` with a 500
    pub fn fail_bucket(&self, bucket: &str) {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert(bucket.to_string());
    }

    pub fn calls(&self) -> Vec<RemoveCall> {
        self.state.calls.lock().unwrap().clone()
    }
}

impl Drop for FakeSupabase {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn remove_objects(
    State(state): State<Arc<StorageState>>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let prefixes: Vec<String> = body["prefixes"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let call = RemoveCall {
        bucket: bucket.clone(),
        prefixes: prefixes.clone(),
        authorization: header("authorization"),
        apikey: header("apikey"),
    };
    state.calls.lock().unwrap().push(call.clone());

    let expected = format!("Bearer {}", state.service_role_key);
    if call.authorization.as_deref() != Some(expected.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "statusCode": "401", "error": "Unauthorized", "message": "invalid key" })),
        )
            .into_response();
    }

    if state.failing.lock().unwrap().contains(&bucket) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "statusCode": "500", "error": "internal", "message": "storage unavailable" })),
        )
            .into_response();
    }

    let mut objects = state.objects.lock().unwrap();
    let stored = objects.entry(bucket.clone()).or_default();
    let removed: Vec<Value> = prefixes
        .iter()
        .filter(|path| stored.remove(path.as_str()))
        .map(|path| json!({ "bucket_id": bucket, "name": path }))
        .collect();

    (StatusCode::OK, Json(Value::Array(removed))).into_response()
}
