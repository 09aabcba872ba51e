use axum::{Json, Router, http::StatusCode, middleware, response::IntoResponse, routing::get};
use chrono::Utc;
use common::Database;
use common::auth::EmailDomainPolicy;
use common::config::{Configuration, HttpConfig};
use janitor::{CleanupJob, DailySchedule};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod endpoints;
pub mod error;

pub use error::ApiError;

pub trait RouterState: std::fmt::Debug + Clone + Send + Sync + 'static {
    fn database(&self) -> &Database;
    fn cleanup_job(&self) -> &Arc<CleanupJob>;
    fn schedule(&self) -> &DailySchedule;
    fn policy(&self) -> &EmailDomainPolicy;
    fn http(&self) -> &HttpConfig;
    /// Bearer token guarding `/api/admin`; the admin routes are off without it
    fn admin_key(&self) -> Option<&str>;
}

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    database: Database,
    job: Arc<CleanupJob>,
    schedule: DailySchedule,
    policy: EmailDomainPolicy,
    http: HttpConfig,
    admin_key: Option<Arc<str>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("database", &self.database)
            .field("job", &"CleanupJob")
            .field("schedule", &self.schedule)
            .field("policy", &self.policy)
            .field("http", &self.http)
            .field("admin_key", &self.admin_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AppState {
    pub fn new(
        database: Database,
        job: Arc<CleanupJob>,
        schedule: DailySchedule,
        config: &Configuration,
    ) -> Self {
        Self {
            database,
            job,
            schedule,
            policy: EmailDomainPolicy::new(config.auth.allowed_domain.clone()),
            http: config.http.clone(),
            admin_key: config
                .auth
                .admin_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .map(Arc::from),
        }
    }
}

impl RouterState for AppState {
    fn database(&self) -> &Database {
        &self.database
    }

    fn cleanup_job(&self) -> &Arc<CleanupJob> {
        &self.job
    }

    fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }

    fn policy(&self) -> &EmailDomainPolicy {
        &self.policy
    }

    fn http(&self) -> &HttpConfig {
        &self.http
    }

    fn admin_key(&self) -> Option<&str> {
        self.admin_key.as_deref()
    }
}

/// Create a new router instance with all routes configured
pub fn create_router<S: RouterState>(state: S) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check::<S>))
        .route("/api/access", get(endpoints::users::page_access::<S>))
        .nest("/api/users", endpoints::users::router())
        .nest("/api/events", endpoints::events::router())
        .nest("/api/fests", endpoints::fests::router())
        .nest("/api", endpoints::registrations::router());

    if state.admin_key().is_some() {
        let admin_layer =
            middleware::from_fn_with_state(state.clone(), endpoints::admin::require_admin_key::<S>);
        router = router.nest(
            "/api/admin",
            endpoints::admin::router().layer(admin_layer),
        );
    } else {
        log::info!("No admin key configured, /api/admin routes are disabled");
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Root health check
async fn root() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "message": "SOCIO Backend Server is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /api/health
///
/// Answers 503 when the database does not respond.
async fn health_check<S: RouterState>(
    axum::extract::State(state): axum::extract::State<S>,
) -> impl IntoResponse {
    let (code, status, database) = match state.database().ping().await {
        Ok(()) => (StatusCode::OK, "OK", "connected"),
        Err(e) => {
            log::warn!("Database health check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "DEGRADED", "unavailable")
        }
    };

    (
        code,
        Json(json!({
            "status": status,
            "message": "Server is running",
            "timestamp": Utc::now().to_rfc3339(),
            "port": state.http().port,
            "environment": state.http().environment,
            "database": database,
        })),
    )
}
