use crate::{ApiError, RouterState};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use common::model::NewRegistration;
use serde::Deserialize;
use serde_json::json;

/// Create registration routes, mounted under `/api`
pub fn router<S: RouterState>() -> Router<S> {
    Router::new()
        .route("/register", post(register::<S>))
        .route("/registrations", get(list_registrations::<S>))
        .route(
            "/registrations/:registration_id",
            delete(delete_registration::<S>),
        )
}

#[derive(Debug, Deserialize)]
pub struct RegistrationFilter {
    pub event_id: Option<String>,
}

/// POST /api/register
#[tracing::instrument(skip(state))]
pub async fn register<S: RouterState>(
    State(state): State<S>,
    Json(request): Json<NewRegistration>,
) -> Result<impl IntoResponse, ApiError> {
    state.policy().check(&request.user_email)?;

    if state.database().get_event(&request.event_id).await?.is_none() {
        return Err(ApiError::not_found(format!(
            "Event '{}' not found",
            request.event_id
        )));
    }

    let registration = state
        .database()
        .insert_registration(request)
        .await
        .map_err(|e| {
            ApiError::from_write(
                e,
                "Already registered for this event",
                "Event does not exist",
            )
        })?;
    log::info!(
        "Registered {} for event {}",
        registration.user_email,
        registration.event_id
    );
    Ok((StatusCode::CREATED, Json(registration)))
}

/// GET /api/registrations?event_id=...
#[tracing::instrument(skip(state))]
pub async fn list_registrations<S: RouterState>(
    State(state): State<S>,
    Query(filter): Query<RegistrationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = filter
        .event_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::validation("event_id query parameter is required"))?;

    let registrations = state.database().list_registrations(&event_id).await?;
    Ok(Json(json!({
        "event_id": event_id,
        "count": registrations.len(),
        "registrations": registrations,
    })))
}

/// DELETE /api/registrations/:registration_id
#[tracing::instrument(skip(state))]
pub async fn delete_registration<S: RouterState>(
    State(state): State<S>,
    Path(registration_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state
        .database()
        .delete_registration(&registration_id)
        .await?
    {
        Ok(Json(json!({
            "message": format!("Registration '{registration_id}' deleted"),
        })))
    } else {
        Err(ApiError::not_found(format!(
            "Registration '{registration_id}' not found"
        )))
    }
}
