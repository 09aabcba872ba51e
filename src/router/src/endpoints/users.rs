use crate::{ApiError, RouterState};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use common::auth::{PageAccess, classify_path};
use common::model::NewUser;
use serde::Deserialize;
use serde_json::json;

/// Create user routes
pub fn router<S: RouterState>() -> Router<S> {
    Router::new()
        .route("/", post(upsert_user::<S>))
        .route("/:email", get(get_user::<S>))
}

/// POST /api/users
///
/// Record a signed-in user. Only addresses of the university domain are accepted.
#[tracing::instrument(skip(state))]
pub async fn upsert_user<S: RouterState>(
    State(state): State<S>,
    Json(request): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.policy().check(&request.email)?;

    let user = state.database().upsert_user(request).await?;
    log::debug!("Upserted user {}", user.email);
    Ok((StatusCode::OK, Json(user)))
}

/// GET /api/users/:email
#[tracing::instrument(skip(state))]
pub async fn get_user<S: RouterState>(
    State(state): State<S>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.database().get_user(&email).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::not_found(format!("User '{email}' not found"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessParams {
    /// Frontend path being opened
    pub path: String,
    /// Signed-in address; absent for visitors without a session
    pub email: Option<String>,
}

/// GET /api/access?path=...[&email=...]
///
/// Page gate for the frontend. Organiser-only pages look up `users.is_organiser`.
#[tracing::instrument(skip(state))]
pub async fn page_access<S: RouterState>(
    State(state): State<S>,
    Query(params): Query<AccessParams>,
) -> Result<impl IntoResponse, ApiError> {
    let access = classify_path(&params.path);
    let email = params
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty());

    let needs_lookup = access == PageAccess::OrganiserOnly;
    let is_organiser = match email {
        Some(email) if needs_lookup && state.policy().is_allowed(email) => {
            state
                .database()
                .get_user(email)
                .await?
                .is_some_and(|user| user.is_organiser)
        }
        _ => false,
    };

    let decision = state.policy().page_access(access, email, is_organiser);
    Ok(Json(json!({
        "path": params.path,
        "access": access,
        "decision": decision,
        "redirect": decision.redirect(),
    })))
}
