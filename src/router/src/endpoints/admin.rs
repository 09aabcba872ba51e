//! Operator endpoints for the cleanup job.
//!
//! Mounted only when `auth.admin_key` is set; every request must carry
//! `Authorization: Bearer <admin_key>`.

use crate::{ApiError, RouterState};
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{NaiveDate, Utc};
use common::auth::{AuthError, bearer_token, secret_matches};
use janitor::run_supervised;
use serde::Deserialize;
use serde_json::json;

/// Create admin routes
pub fn router<S: RouterState>() -> Router<S> {
    Router::new()
        .route("/cleanup", post(run_cleanup::<S>))
        .route("/cleanup/status", get(cleanup_status::<S>))
        .route("/users/:email/organiser", put(set_organiser::<S>))
}

/// Reject requests without the configured admin key
pub async fn require_admin_key<S: RouterState>(
    State(state): State<S>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_key() else {
        return ApiError::from(AuthError::forbidden("Admin API is disabled")).into_response();
    };

    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());
    let authorized = match bearer_token(header) {
        Ok(token) => secret_matches(token, expected),
        Err(err) => return ApiError::from(err).into_response(),
    };

    if authorized {
        next.run(request).await
    } else {
        log::warn!(
            "Rejected admin request to {}: invalid key",
            request.uri().path()
        );
        ApiError::from(AuthError::unauthorized("Invalid admin key")).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    /// Day to clean up; yesterday in the schedule's offset when omitted
    pub date: Option<NaiveDate>,
}

/// POST /api/admin/cleanup[?date=YYYY-MM-DD]
///
/// Run the cleanup job now and return its report.
#[tracing::instrument(skip(state))]
pub async fn run_cleanup<S: RouterState>(
    State(state): State<S>,
    Query(params): Query<CleanupParams>,
) -> Result<impl IntoResponse, ApiError> {
    let reference_date = params
        .date
        .unwrap_or_else(|| state.schedule().reference_date(Utc::now()));
    log::info!("Manual cleanup requested for {reference_date}");

    let report = run_supervised(state.cleanup_job().clone(), reference_date).await?;
    Ok(Json(report))
}

/// GET /api/admin/cleanup/status
#[tracing::instrument(skip(state))]
pub async fn cleanup_status<S: RouterState>(
    State(state): State<S>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.cleanup_job();
    let schedule = state.schedule();
    let options = job.options();

    Ok(Json(json!({
        "schedule": {
            "time": schedule.time().format("%H:%M").to_string(),
            "utc_offset": schedule.offset().to_string(),
            "next_run": schedule.next_after(Utc::now()).to_rfc3339(),
        },
        "match_mode": options.match_mode,
        "dry_run": options.dry_run,
        "metrics": job.metrics().summary(),
        "last_report": job.last_report().await,
    })))
}

#[derive(Debug, Deserialize)]
pub struct OrganiserRequest {
    pub is_organiser: bool,
}

/// PUT /api/admin/users/:email/organiser
///
/// Grant or revoke access to the organiser-only pages.
#[tracing::instrument(skip(state))]
pub async fn set_organiser<S: RouterState>(
    State(state): State<S>,
    Path(email): Path<String>,
    Json(request): Json<OrganiserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state
        .database()
        .set_organiser(&email, request.is_organiser)
        .await?
    {
        return Err(ApiError::not_found(format!("User '{email}' not found")));
    }

    log::info!("Set is_organiser={} for {email}", request.is_organiser);
    match state.database().get_user(&email).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::not_found(format!("User '{email}' not found"))),
    }
}
