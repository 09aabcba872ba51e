use crate::{ApiError, RouterState};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use common::model::{ExpiredEvent, NewEvent};
use serde::Deserialize;
use serde_json::json;

/// Create event routes
pub fn router<S: RouterState>() -> Router<S> {
    Router::new()
        .route("/", get(list_events::<S>).post(create_event::<S>))
        .route("/:event_id", get(get_event::<S>).delete(delete_event::<S>))
}

#[derive(Debug, Deserialize)]
pub struct EventFilter {
    /// Only the events of this fest
    pub fest: Option<String>,
}

/// GET /api/events
#[tracing::instrument(skip(state))]
pub async fn list_events<S: RouterState>(
    State(state): State<S>,
    Query(filter): Query<EventFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state.database().list_events(filter.fest.as_deref()).await?;
    Ok(Json(json!({ "events": events })))
}

/// GET /api/events/:event_id
#[tracing::instrument(skip(state))]
pub async fn get_event<S: RouterState>(
    State(state): State<S>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .database()
        .get_event(&event_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Event '{event_id}' not found")))
}

/// POST /api/events
#[tracing::instrument(skip(state, request))]
pub async fn create_event<S: RouterState>(
    State(state): State<S>,
    Json(request): Json<NewEvent>,
) -> Result<impl IntoResponse, ApiError> {
    if request.event_id.trim().is_empty() {
        return Err(ApiError::validation("Event ID must not be empty"));
    }
    if request.title.trim().is_empty() {
        return Err(ApiError::validation("Event title must not be empty"));
    }
    if request.end_date < request.event_date {
        return Err(ApiError::validation(
            "End date must not be before the event date",
        ));
    }

    let event_id = request.event_id.clone();
    let fest = request.fest.clone().unwrap_or_default();
    let event = state.database().insert_event(request).await.map_err(|e| {
        ApiError::from_write(
            e,
            &format!("Event '{event_id}' already exists"),
            &format!("Fest '{fest}' does not exist"),
        )
    })?;
    log::info!("Created event {}", event.event_id);
    Ok((StatusCode::CREATED, Json(event)))
}

/// DELETE /api/events/:event_id
///
/// Removes the event with its registrations and uploaded files.
#[tracing::instrument(skip(state))]
pub async fn delete_event<S: RouterState>(
    State(state): State<S>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .database()
        .get_event(&event_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Event '{event_id}' not found")))?;

    let summary = state
        .cleanup_job()
        .purge_event(ExpiredEvent::from(&event))
        .await?;

    Ok(Json(json!({
        "message": format!("Event '{event_id}' deleted"),
        "registrations_deleted": summary.registrations_deleted,
        "files_removed": summary.files.removed(),
    })))
}
