//! HTTP API server with observability for two-phase user updates.
//!
//! Provides REST endpoints to create, read and update users, where an update
//! is synced to an external system between two short transactions, with
//! structured logging (tracing) and Prometheus metrics.

pub mod compensation;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use coordinator::{ExternalClient, RetryPolicy, UpdateCoordinator};
use domain::UserService;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Repository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use compensation::FlagSyncFailure;
use routes::users::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R, X>(state: Arc<AppState<R, X>>, metrics_handle: PrometheusHandle) -> Router
where
    R: Repository + 'static,
    X: ExternalClient + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<R, X>))
        .route("/users", post(routes::users::create::<R, X>))
        .route(
            "/users/{id}",
            get(routes::users::get::<R, X>).put(routes::users::update::<R, X>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: user service, and a coordinator that
/// flags the user's sync as failed when step 2 of an update fails.
pub fn create_default_state<R, X>(
    repository: R,
    external: X,
    retry_policy: RetryPolicy,
) -> Arc<AppState<R, X>>
where
    R: Repository + Clone + 'static,
    X: ExternalClient + 'static,
{
    let compensation = Arc::new(FlagSyncFailure::new(repository.clone()));
    let coordinator =
        UpdateCoordinator::new(repository.clone(), external).with_compensation(compensation);

    Arc::new(AppState {
        users: UserService::new(repository),
        coordinator,
        retry_policy,
    })
}
