//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use coordinator::ExternalClient;
use serde::Serialize;
use store::{Repository, Transaction};

use super::users::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// GET /health: reports whether a storage transaction can be opened.
pub async fn check<R, X>(
    State(state): State<Arc<AppState<R, X>>>,
) -> (StatusCode, Json<HealthResponse>)
where
    R: Repository + 'static,
    X: ExternalClient + 'static,
{
    let storage = match state.users.repository().begin().await {
        Ok(tx) => tx.rollback().await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not open a transaction");
            false
        }
    };

    if storage {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                storage: "ok",
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                storage: "unavailable",
            }),
        )
    }
}
