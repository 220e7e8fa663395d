//! User endpoints: create, read, and two-phase update.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::EntityId;
use coordinator::{ExternalClient, RetryPolicy, UpdateCoordinator};
use domain::{UpdatePayload, User, UserService};
use serde::{Deserialize, Serialize};
use store::{Repository, Versioned};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<R: Repository, X: ExternalClient> {
    pub users: UserService<R>,
    pub coordinator: UpdateCoordinator<R, X>,
    pub retry_policy: RetryPolicy,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub id: i64,
    pub display_name: String,
    pub email: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    pub sync_status: String,
    pub external_ref: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_failure: Option<String>,
    pub revision: u64,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<Versioned<User>> for UserResponse {
    fn from(record: Versioned<User>) -> Self {
        let user = &record.entity;
        Self {
            id: record.id().as_i64(),
            display_name: user.display_name().to_string(),
            email: user.email().to_string(),
            sync_status: user.sync_status().to_string(),
            external_ref: user.external_ref().map(String::from),
            last_synced_at: user.last_synced_at(),
            sync_failure: user.sync_failure().map(String::from),
            revision: user.revision(),
            version: record.version.as_i64(),
            updated_at: record.updated_at,
        }
    }
}

// -- Handlers --

/// POST /users: create a new user.
#[tracing::instrument(skip(state, req), fields(user_id = req.id))]
pub async fn create<R, X>(
    State(state): State<Arc<AppState<R, X>>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError>
where
    R: Repository + 'static,
    X: ExternalClient + 'static,
{
    let id = EntityId::new(req.id);
    state
        .users
        .create_user(id, &req.display_name, &req.email)
        .await?;

    let record = load(&state.users, id).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /users/{id}: load a user.
#[tracing::instrument(skip(state))]
pub async fn get<R, X>(
    State(state): State<Arc<AppState<R, X>>>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError>
where
    R: Repository + 'static,
    X: ExternalClient + 'static,
{
    let record = load(&state.users, EntityId::new(id)).await?;
    Ok(Json(record.into()))
}

/// PUT /users/{id}: apply `payload`, sync it externally, record the result.
#[tracing::instrument(skip(state, payload))]
pub async fn update<R, X>(
    State(state): State<Arc<AppState<R, X>>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePayload>,
) -> Result<Json<UserResponse>, ApiError>
where
    R: Repository + 'static,
    X: ExternalClient + 'static,
{
    let id = EntityId::new(id);
    state
        .coordinator
        .update_with_retry(id, &payload, &state.retry_policy)
        .await?;

    let record = load(&state.users, id).await?;
    Ok(Json(record.into()))
}

async fn load<R: Repository>(
    users: &UserService<R>,
    id: EntityId,
) -> Result<Versioned<User>, ApiError> {
    users
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))
}
