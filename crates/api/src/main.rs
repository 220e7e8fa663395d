//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use coordinator::{ExternalClient, HttpExternalClient, InMemoryExternalClient, RetryPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryRepository, PostgresRepository, Repository};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn external_client(config: &Config) -> Arc<dyn ExternalClient> {
    match config.http_client_config() {
        Some(http) => {
            tracing::info!(endpoint = %http.endpoint, timeout = ?http.timeout, "using HTTP external client");
            Arc::new(HttpExternalClient::new(http).expect("failed to build HTTP client"))
        }
        None => {
            tracing::warn!("EXTERNAL_API_URL not set, using in-memory external client");
            Arc::new(InMemoryExternalClient::new())
        }
    }
}

async fn serve<R>(
    config: &Config,
    repository: R,
    external: Arc<dyn ExternalClient>,
    retry_policy: RetryPolicy,
    metrics_handle: PrometheusHandle,
) where
    R: Repository + Clone + 'static,
{
    let state = api::create_default_state(repository, external, retry_policy);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env().expect("invalid configuration");
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Build the external client and retry policy
    let external = external_client(&config);
    let retry_policy = config.retry_policy();

    // 4. Choose the repository and start the server
    match config.database_url {
        Some(ref url) => {
            let repository = PostgresRepository::connect(url, config.database_max_connections)
                .await
                .expect("failed to connect to PostgreSQL");
            repository
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL repository");
            serve(&config, repository, external, retry_policy, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory repository");
            serve(
                &config,
                InMemoryRepository::new(),
                external,
                retry_policy,
                metrics_handle,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}
