use crate::{ApiError, RouterState};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use common::model::{ExpiredFest, NewFest};
use serde_json::json;

/// Create fest routes
pub fn router<S: RouterState>() -> Router<S> {
    Router::new()
        .route("/", get(list_fests::<S>).post(create_fest::<S>))
        .route("/:fest_id", get(get_fest::<S>).delete(delete_fest::<S>))
}

/// GET /api/fests
#[tracing::instrument(skip(state))]
pub async fn list_fests<S: RouterState>(
    State(state): State<S>,
) -> Result<impl IntoResponse, ApiError> {
    let fests = state.database().list_fests().await?;
    Ok(Json(json!({ "fests": fests })))
}

/// GET /api/fests/:fest_id
#[tracing::instrument(skip(state))]
pub async fn get_fest<S: RouterState>(
    State(state): State<S>,
    Path(fest_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .database()
        .get_fest(&fest_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Fest '{fest_id}' not found")))
}

/// POST /api/fests
#[tracing::instrument(skip(state, request))]
pub async fn create_fest<S: RouterState>(
    State(state): State<S>,
    Json(request): Json<NewFest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.fest_id.trim().is_empty() {
        return Err(ApiError::validation("Fest ID must not be empty"));
    }
    if request.title.trim().is_empty() {
        return Err(ApiError::validation("Fest title must not be empty"));
    }
    if request.closing_date < request.opening_date {
        return Err(ApiError::validation(
            "Closing date must not be before the opening date",
        ));
    }

    let fest_id = request.fest_id.clone();
    let fest = state.database().insert_fest(request).await.map_err(|e| {
        ApiError::from_write(
            e,
            &format!("Fest '{fest_id}' already exists"),
            "Fest references a missing row",
        )
    })?;
    log::info!("Created fest {}", fest.fest_id);
    Ok((StatusCode::CREATED, Json(fest)))
}

/// DELETE /api/fests/:fest_id
///
/// Removes the fest together with its events, their registrations and every
/// uploaded file, in the same order the nightly cleanup uses.
#[tracing::instrument(skip(state))]
pub async fn delete_fest<S: RouterState>(
    State(state): State<S>,
    Path(fest_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let fest = state
        .database()
        .get_fest(&fest_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Fest '{fest_id}' not found")))?;

    let summary = state
        .cleanup_job()
        .purge_fest(ExpiredFest::from(&fest))
        .await?;

    Ok(Json(json!({
        "message": format!("Fest '{fest_id}' deleted"),
        "events_deleted": summary.events_deleted,
        "registrations_deleted": summary.registrations_deleted,
        "files_removed": summary.files.removed(),
    })))
}
